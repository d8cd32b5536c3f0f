//! Enhance argument transformer

use crate::store::{DataAccess, Transcript, Word};
use aitask_core::{Result, TaskError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Raw enhance arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhanceArgs {
    /// Session to enhance
    pub session_id: String,
    /// Note the output is written to
    pub enhanced_note_id: String,
    /// Template to structure the note with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
}

impl EnhanceArgs {
    /// Enhance `session_id` into `enhanced_note_id`
    pub fn new(session_id: impl Into<String>, enhanced_note_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            enhanced_note_id: enhanced_note_id.into(),
            template_id: None,
        }
    }

    /// Structure the note with a template
    pub fn with_template(mut self, template_id: impl Into<String>) -> Self {
        self.template_id = Some(template_id.into());
        self
    }
}

/// Session metadata, taken from the linked calendar event when there is one
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionInfo {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_event: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Participant {
    pub name: String,
    pub job_title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateSection {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateInfo {
    pub title: String,
    pub description: String,
    pub sections: Vec<TemplateSection>,
}

/// A run of consecutive words from one speaker.
///
/// Times are milliseconds from the earliest transcript start of the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptSegment {
    pub speaker_label: String,
    pub start_ms: i64,
    pub end_ms: i64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttachmentInfo {
    pub id: String,
    pub file_name: String,
    pub mime_type: String,
    pub size: u64,
    pub file_url: String,
}

/// Enriched enhance arguments
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnhanceContext {
    pub session_id: String,
    pub enhanced_note_id: String,
    pub session: SessionInfo,
    pub raw_md: String,
    pub participants: Vec<Participant>,
    pub segments: Vec<TranscriptSegment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<TemplateInfo>,
    pub attachments: Vec<AttachmentInfo>,
}

/// Resolve `args` against `data`
pub async fn build_context(args: EnhanceArgs, data: &dyn DataAccess) -> Result<EnhanceContext> {
    let session = data.session(&args.session_id).await?.ok_or_else(|| {
        TaskError::arg_transform(format!("session '{}' not found", args.session_id))
    })?;

    let info = match non_empty(session.event_id.as_deref()) {
        Some(event_id) => {
            let event = data.event(event_id).await?.unwrap_or_default();
            SessionInfo {
                title: if event.title.is_empty() {
                    session.title.clone()
                } else {
                    event.title
                },
                started_at: Some(event.started_at),
                ended_at: Some(event.ended_at),
                location: Some(event.location),
                description: Some(event.description),
                is_event: true,
            }
        }
        None => SessionInfo {
            title: session.title.clone(),
            ..Default::default()
        },
    };

    let participants = data
        .participants(&session.id)
        .await?
        .into_iter()
        .filter(|human| !human.name.is_empty())
        .map(|human| Participant {
            name: human.name,
            job_title: human.job_title,
        })
        .collect();

    let template = match non_empty(args.template_id.as_deref()) {
        Some(template_id) => data.template(template_id).await?.map(|template| TemplateInfo {
            title: template.title,
            description: template.description,
            sections: parse_template_sections(&template.sections),
        }),
        None => None,
    };

    let transcripts = data.transcripts(&session.id).await?;
    let segments = if transcripts.is_empty() {
        Vec::new()
    } else {
        let ids: Vec<String> = transcripts.iter().map(|t| t.id.clone()).collect();
        let words = data.words(&ids).await?;
        build_segments(&transcripts, words)
    };

    let attachments = match data.attachments(&session.id).await {
        Ok(attachments) => attachments
            .into_iter()
            .map(|a| AttachmentInfo {
                id: a.id,
                file_name: a.file_name,
                mime_type: a.mime_type,
                size: a.size,
                file_url: a.file_url,
            })
            .collect(),
        Err(e) => {
            warn!(session_id = %session.id, error = %e, "Failed to load attachments");
            Vec::new()
        }
    };

    let context = EnhanceContext {
        session_id: args.session_id,
        enhanced_note_id: args.enhanced_note_id,
        session: info,
        raw_md: session.raw_md,
        participants,
        segments,
        template,
        attachments,
    };
    debug!(
        session_id = %context.session_id,
        participants = context.participants.len(),
        segments = context.segments.len(),
        has_template = context.template.is_some(),
        "Built enhance context"
    );
    Ok(context)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Parse stored template sections.
///
/// Accepts an array (or a JSON string holding one) of plain strings or
/// `{title, description}` objects. Entries without a title are dropped;
/// anything unparseable yields no sections.
pub fn parse_template_sections(raw: &Value) -> Vec<TemplateSection> {
    let parsed;
    let value = match raw {
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(v) => {
                parsed = v;
                &parsed
            }
            Err(_) => return Vec::new(),
        },
        other => other,
    };

    let Some(items) = value.as_array() else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::String(title) => Some(TemplateSection {
                title: title.clone(),
                description: String::new(),
            }),
            Value::Object(record) => {
                let title = record.get("title").and_then(Value::as_str).unwrap_or("").trim();
                if title.is_empty() {
                    return None;
                }
                Some(TemplateSection {
                    title: title.to_string(),
                    description: record
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or("")
                        .to_string(),
                })
            }
            _ => None,
        })
        .collect()
}

fn speaker_label(word: &Word) -> String {
    match non_empty(word.speaker.as_deref()) {
        Some(name) => name.to_string(),
        None if word.channel == 0 => "You".to_string(),
        None => format!("Speaker {}", word.channel),
    }
}

/// Group words into speaker segments.
///
/// Words are ordered by absolute start time across all transcripts; a new
/// segment starts whenever the speaker label changes. Words of unknown
/// transcripts are ignored.
pub fn build_segments(transcripts: &[Transcript], words: Vec<Word>) -> Vec<TranscriptSegment> {
    let starts: HashMap<&str, i64> = transcripts
        .iter()
        .map(|t| (t.id.as_str(), t.started_at))
        .collect();
    let session_start = transcripts.iter().map(|t| t.started_at).min().unwrap_or(0);

    let mut timed: Vec<(i64, i64, Word)> = words
        .into_iter()
        .filter_map(|word| {
            let offset = *starts.get(word.transcript_id.as_str())?;
            Some((offset + word.start_ms, offset + word.end_ms, word))
        })
        .collect();
    timed.sort_by_key(|(start, _, _)| *start);

    let mut segments: Vec<TranscriptSegment> = Vec::new();
    let mut texts: Vec<Vec<String>> = Vec::new();
    for (start, end, word) in timed {
        let label = speaker_label(&word);
        match segments.last_mut() {
            Some(current) if current.speaker_label == label => {
                current.end_ms = end - session_start;
                if let Some(words) = texts.last_mut() {
                    words.push(word.text);
                }
            }
            _ => {
                segments.push(TranscriptSegment {
                    speaker_label: label,
                    start_ms: start - session_start,
                    end_ms: end - session_start,
                    text: String::new(),
                });
                texts.push(vec![word.text]);
            }
        }
    }

    for (segment, words) in segments.iter_mut().zip(texts) {
        segment.text = words.join(" ");
    }
    segments.sort_by_key(|s| s.start_ms);
    segments
}
