//! Integration tests for enhance argument resolution

use aitask::store::{Attachment, DataAccess, InMemoryStore, StoreData};
use aitask::tasks::enhance::{build_context, EnhanceArgs, TemplateSection, TranscriptSegment};
use aitask::{AppError, Result};
use aitask_core::TaskError;
use async_trait::async_trait;

const FIXTURE: &str = r#"{
    "sessions": [
        { "id": "s1", "title": "Weekly", "raw_md": "- budget", "event_id": "e1" },
        { "id": "s2", "title": "Ad hoc", "raw_md": "" }
    ],
    "events": [{
        "id": "e1",
        "title": "",
        "started_at": "2026-03-02T09:00:00Z",
        "ended_at": "2026-03-02T09:30:00Z",
        "location": "Room 4",
        "description": "Budget review"
    }],
    "humans": [
        { "id": "h1", "name": "Ada", "job_title": "CFO" },
        { "id": "h2", "name": "" }
    ],
    "session_participants": [
        { "session_id": "s1", "human_id": "h1" },
        { "session_id": "s1", "human_id": "h2" }
    ],
    "templates": [{
        "id": "t1",
        "title": "Review",
        "description": "Quarterly review",
        "sections": "[\"Numbers\", {\"title\": \" Risks \", \"description\": \"What could slip\"}, {\"title\": \"\"}]"
    }],
    "transcripts": [
        { "id": "tr1", "session_id": "s1", "started_at": 60000 },
        { "id": "tr2", "session_id": "s1", "started_at": 0 }
    ],
    "words": [
        { "id": "w1", "transcript_id": "tr1", "text": "approved", "start_ms": 0, "end_ms": 400, "channel": 1, "speaker": "Ada" },
        { "id": "w2", "transcript_id": "tr2", "text": "budget", "start_ms": 1000, "end_ms": 1400, "channel": 0 },
        { "id": "w3", "transcript_id": "tr2", "text": "looks", "start_ms": 1500, "end_ms": 1800, "channel": 0 },
        { "id": "w4", "transcript_id": "tr2", "text": "fine", "start_ms": 1900, "end_ms": 2100, "channel": 0 }
    ],
    "attachments": [{
        "id": "a1", "session_id": "s1", "file_name": "q1.pdf",
        "mime_type": "application/pdf", "size": 2048, "file_url": "file:///tmp/q1.pdf"
    }]
}"#;

#[tokio::test]
async fn test_context_from_linked_event() {
    let store = InMemoryStore::from_json(FIXTURE).unwrap();
    let ctx = build_context(EnhanceArgs::new("s1", "n1").with_template("t1"), &store)
        .await
        .unwrap();

    // Empty event title falls back to the session title.
    assert_eq!(ctx.session.title, "Weekly");
    assert!(ctx.session.is_event);
    assert_eq!(ctx.session.location.as_deref(), Some("Room 4"));
    assert_eq!(ctx.raw_md, "- budget");

    assert_eq!(ctx.participants.len(), 1);
    assert_eq!(ctx.participants[0].name, "Ada");

    let template = ctx.template.unwrap();
    assert_eq!(template.title, "Review");
    assert_eq!(
        template.sections,
        vec![
            TemplateSection {
                title: "Numbers".into(),
                description: String::new(),
            },
            TemplateSection {
                title: "Risks".into(),
                description: "What could slip".into(),
            },
        ]
    );

    assert_eq!(
        ctx.segments,
        vec![
            TranscriptSegment {
                speaker_label: "You".into(),
                start_ms: 1000,
                end_ms: 2100,
                text: "budget looks fine".into(),
            },
            TranscriptSegment {
                speaker_label: "Ada".into(),
                start_ms: 60000,
                end_ms: 60400,
                text: "approved".into(),
            },
        ]
    );

    assert_eq!(ctx.attachments.len(), 1);
    assert_eq!(ctx.attachments[0].file_name, "q1.pdf");
}

#[tokio::test]
async fn test_plain_session_without_template() {
    let store = InMemoryStore::from_json(FIXTURE).unwrap();
    let ctx = build_context(EnhanceArgs::new("s2", "n2").with_template("missing"), &store)
        .await
        .unwrap();

    assert_eq!(ctx.session.title, "Ad hoc");
    assert!(!ctx.session.is_event);
    assert!(ctx.session.started_at.is_none());
    assert!(ctx.participants.is_empty());
    assert!(ctx.segments.is_empty());
    assert!(ctx.template.is_none());
}

#[tokio::test]
async fn test_missing_session_is_arg_error() {
    let store = InMemoryStore::from_json(FIXTURE).unwrap();
    let err = build_context(EnhanceArgs::new("nope", "n1"), &store)
        .await
        .unwrap_err();
    assert!(matches!(err, TaskError::ArgTransform(ref m) if m.contains("nope")));
}

/// Store whose attachment lookup always fails
struct NoAttachments(InMemoryStore);

#[async_trait]
impl DataAccess for NoAttachments {
    async fn session(&self, id: &str) -> Result<Option<aitask::store::Session>> {
        self.0.session(id).await
    }
    async fn event(&self, id: &str) -> Result<Option<aitask::store::CalendarEvent>> {
        self.0.event(id).await
    }
    async fn participants(&self, id: &str) -> Result<Vec<aitask::store::Human>> {
        self.0.participants(id).await
    }
    async fn template(&self, id: &str) -> Result<Option<aitask::store::Template>> {
        self.0.template(id).await
    }
    async fn transcripts(&self, id: &str) -> Result<Vec<aitask::store::Transcript>> {
        self.0.transcripts(id).await
    }
    async fn words(&self, ids: &[String]) -> Result<Vec<aitask::store::Word>> {
        self.0.words(ids).await
    }
    async fn enhanced_notes(&self, id: &str) -> Result<Vec<aitask::store::EnhancedNote>> {
        self.0.enhanced_notes(id).await
    }
    async fn attachments(&self, _id: &str) -> Result<Vec<Attachment>> {
        Err(AppError::store("attachment directory unreadable"))
    }
}

#[tokio::test]
async fn test_attachment_failure_yields_empty_list() {
    let store = NoAttachments(InMemoryStore::from_json(FIXTURE).unwrap());
    let ctx = build_context(EnhanceArgs::new("s1", "n1"), &store).await.unwrap();

    assert!(ctx.attachments.is_empty());
    assert_eq!(ctx.participants.len(), 1);
}

#[tokio::test]
async fn test_empty_store_data() {
    let store = InMemoryStore::new(StoreData::default());
    assert!(build_context(EnhanceArgs::new("s1", "n1"), &store).await.is_err());
}
