//! Data access contract
//!
//! Argument transformers read sessions, transcripts and templates through
//! [`DataAccess`]. The engine never owns this data; the embedding
//! application supplies an implementation. [`InMemoryStore`] is a complete
//! implementation over plain tables, loadable from a JSON fixture.

use crate::error::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// A recording session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session id
    pub id: String,
    /// User-entered title
    #[serde(default)]
    pub title: String,
    /// Raw notes typed during the session (markdown)
    #[serde(default)]
    pub raw_md: String,
    /// Linked calendar event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

/// A calendar event linked to a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Event id
    pub id: String,
    /// Event title
    #[serde(default)]
    pub title: String,
    /// Start time (RFC 3339)
    #[serde(default)]
    pub started_at: String,
    /// End time (RFC 3339)
    #[serde(default)]
    pub ended_at: String,
    /// Location
    #[serde(default)]
    pub location: String,
    /// Description
    #[serde(default)]
    pub description: String,
}

/// A person
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Human {
    /// Person id
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Job title
    #[serde(default)]
    pub job_title: String,
}

/// Links a person to a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionParticipant {
    /// Session id
    pub session_id: String,
    /// Person id
    pub human_id: String,
}

/// A note template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Template id
    pub id: String,
    /// Template title
    #[serde(default)]
    pub title: String,
    /// Template description
    #[serde(default)]
    pub description: String,
    /// Sections as stored: an array of strings or `{title, description}`
    /// objects, possibly JSON-encoded as a string
    #[serde(default)]
    pub sections: Value,
}

/// One transcription run within a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    /// Transcript id
    pub id: String,
    /// Session id
    pub session_id: String,
    /// Wall-clock start, milliseconds since the epoch
    #[serde(default)]
    pub started_at: i64,
}

/// One transcribed word
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Word {
    /// Word id
    pub id: String,
    /// Transcript the word belongs to
    pub transcript_id: String,
    /// Word text
    pub text: String,
    /// Start offset from the transcript start, in milliseconds
    pub start_ms: i64,
    /// End offset from the transcript start, in milliseconds
    pub end_ms: i64,
    /// Audio channel (0 is the local microphone)
    #[serde(default)]
    pub channel: i64,
    /// Speaker assigned to the word, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
}

/// A generated note
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnhancedNote {
    /// Note id
    pub id: String,
    /// Session id
    pub session_id: String,
    /// Note content (markdown)
    #[serde(default)]
    pub content: String,
}

/// A file attached to a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// Attachment id
    pub id: String,
    /// Session id
    pub session_id: String,
    /// Original file name
    pub file_name: String,
    /// MIME type
    #[serde(default)]
    pub mime_type: String,
    /// Size in bytes
    #[serde(default)]
    pub size: u64,
    /// Location of the file
    #[serde(default)]
    pub file_url: String,
}

/// Read access to the records tasks are built from
#[async_trait]
pub trait DataAccess: Send + Sync {
    /// Look up a session
    async fn session(&self, session_id: &str) -> Result<Option<Session>>;

    /// Look up a calendar event
    async fn event(&self, event_id: &str) -> Result<Option<CalendarEvent>>;

    /// People linked to a session, in link order
    async fn participants(&self, session_id: &str) -> Result<Vec<Human>>;

    /// Look up a template
    async fn template(&self, template_id: &str) -> Result<Option<Template>>;

    /// Transcripts recorded for a session
    async fn transcripts(&self, session_id: &str) -> Result<Vec<Transcript>>;

    /// Words belonging to any of the given transcripts
    async fn words(&self, transcript_ids: &[String]) -> Result<Vec<Word>>;

    /// Generated notes of a session
    async fn enhanced_notes(&self, session_id: &str) -> Result<Vec<EnhancedNote>>;

    /// Files attached to a session
    async fn attachments(&self, session_id: &str) -> Result<Vec<Attachment>>;
}

/// Tables backing an [`InMemoryStore`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreData {
    /// Sessions
    #[serde(default)]
    pub sessions: Vec<Session>,
    /// Calendar events
    #[serde(default)]
    pub events: Vec<CalendarEvent>,
    /// People
    #[serde(default)]
    pub humans: Vec<Human>,
    /// Session/person links
    #[serde(default)]
    pub session_participants: Vec<SessionParticipant>,
    /// Templates
    #[serde(default)]
    pub templates: Vec<Template>,
    /// Transcripts
    #[serde(default)]
    pub transcripts: Vec<Transcript>,
    /// Words
    #[serde(default)]
    pub words: Vec<Word>,
    /// Generated notes
    #[serde(default)]
    pub enhanced_notes: Vec<EnhancedNote>,
    /// Attachments
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// [`DataAccess`] over in-memory tables
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    data: StoreData,
}

impl InMemoryStore {
    /// Wrap existing tables
    pub fn new(data: StoreData) -> Self {
        Self { data }
    }

    /// Parse tables from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let data: StoreData = serde_json::from_str(json)?;
        Ok(Self::new(data))
    }

    /// Load tables from a JSON file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::store(format!("failed to read data file {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    /// The underlying tables
    pub fn data(&self) -> &StoreData {
        &self.data
    }
}

#[async_trait]
impl DataAccess for InMemoryStore {
    async fn session(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self.data.sessions.iter().find(|s| s.id == session_id).cloned())
    }

    async fn event(&self, event_id: &str) -> Result<Option<CalendarEvent>> {
        Ok(self.data.events.iter().find(|e| e.id == event_id).cloned())
    }

    async fn participants(&self, session_id: &str) -> Result<Vec<Human>> {
        Ok(self
            .data
            .session_participants
            .iter()
            .filter(|link| link.session_id == session_id)
            .filter_map(|link| self.data.humans.iter().find(|h| h.id == link.human_id))
            .cloned()
            .collect())
    }

    async fn template(&self, template_id: &str) -> Result<Option<Template>> {
        Ok(self.data.templates.iter().find(|t| t.id == template_id).cloned())
    }

    async fn transcripts(&self, session_id: &str) -> Result<Vec<Transcript>> {
        Ok(self
            .data
            .transcripts
            .iter()
            .filter(|t| t.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn words(&self, transcript_ids: &[String]) -> Result<Vec<Word>> {
        Ok(self
            .data
            .words
            .iter()
            .filter(|w| transcript_ids.contains(&w.transcript_id))
            .cloned()
            .collect())
    }

    async fn enhanced_notes(&self, session_id: &str) -> Result<Vec<EnhancedNote>> {
        Ok(self
            .data
            .enhanced_notes
            .iter()
            .filter(|n| n.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn attachments(&self, session_id: &str) -> Result<Vec<Attachment>> {
        Ok(self
            .data
            .attachments
            .iter()
            .filter(|a| a.session_id == session_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "sessions": [{ "id": "s1", "title": "Sync", "raw_md": "- ship" }],
        "humans": [
            { "id": "h1", "name": "Ada", "job_title": "Engineer" },
            { "id": "h2", "name": "Lin" }
        ],
        "session_participants": [
            { "session_id": "s1", "human_id": "h2" },
            { "session_id": "s1", "human_id": "h1" },
            { "session_id": "s2", "human_id": "h1" }
        ]
    }"#;

    #[tokio::test]
    async fn test_lookup_from_json_fixture() {
        let store = InMemoryStore::from_json(FIXTURE).unwrap();

        let session = store.session("s1").await.unwrap().unwrap();
        assert_eq!(session.title, "Sync");
        assert!(store.session("missing").await.unwrap().is_none());

        let names: Vec<String> = store
            .participants("s1")
            .await
            .unwrap()
            .into_iter()
            .map(|h| h.name)
            .collect();
        assert_eq!(names, vec!["Lin", "Ada"]);
    }

    #[test]
    fn test_invalid_fixture_is_an_error() {
        assert!(matches!(
            InMemoryStore::from_json("{ not json"),
            Err(AppError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("fixture.json");
        tokio::fs::write(&path, FIXTURE).await.unwrap();

        let store = InMemoryStore::load(&path).await.unwrap();
        assert!(store.session("s1").await.unwrap().is_some());

        let missing = InMemoryStore::load(temp_dir.path().join("missing.json")).await;
        assert!(matches!(missing, Err(AppError::Store(_))));
    }
}
