//! Title task: a short session title from notes

use super::{failed_stream, mismatched_args, EnrichedArgs, TaskArgs, TaskDefinition, WorkflowContext};
use crate::config::TitleConfig;
use crate::store::DataAccess;
use crate::task::TaskType;
use aitask_core::transform::{smooth_stream, SmoothConfig};
use aitask_core::{EventStream, GenerateRequest, TaskError, TransformFactory};
use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use tracing::debug;

const SYSTEM_PROMPT: &str = "\
You write titles for meeting notes. Reply with a single title of at most \
eight words, without quotes, markdown or trailing punctuation.";

/// Raw title arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleArgs {
    /// Session to title
    pub session_id: String,
}

impl TitleArgs {
    /// Title `session_id`
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
        }
    }
}

/// Enriched title arguments
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TitleContext {
    pub session_id: String,
    /// Current title, possibly empty
    pub title: String,
    pub raw_md: String,
    /// First non-empty generated note of the session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enhanced_md: Option<String>,
}

impl TitleContext {
    fn prompt(&self) -> String {
        let mut out = String::new();
        if !self.title.is_empty() {
            let _ = writeln!(out, "Current title: {}\n", self.title);
        }
        match &self.enhanced_md {
            Some(enhanced) => {
                let _ = writeln!(out, "Notes:\n{}", enhanced.trim_end());
            }
            None => {
                let _ = writeln!(out, "Notes:\n{}", self.raw_md.trim_end());
            }
        }
        let _ = write!(out, "\nTitle:");
        out
    }
}

/// The title task definition
#[derive(Debug, Clone)]
pub struct TitleTask {
    smoothing: SmoothConfig,
    temperature: Option<f32>,
}

impl Default for TitleTask {
    fn default() -> Self {
        Self {
            smoothing: SmoothConfig::default(),
            temperature: None,
        }
    }
}

impl TitleTask {
    /// Create a task with the given pacing
    pub fn new(smoothing: SmoothConfig) -> Self {
        Self {
            smoothing,
            temperature: None,
        }
    }

    /// Resolve settings from configuration
    pub fn from_config(config: &TitleConfig) -> crate::error::Result<Self> {
        Ok(Self {
            smoothing: config.smoothing.to_smooth_config()?,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl TaskDefinition for TitleTask {
    fn task_type(&self) -> TaskType {
        TaskType::Title
    }

    async fn transform_args(
        &self,
        args: TaskArgs,
        data: &dyn DataAccess,
    ) -> aitask_core::Result<EnrichedArgs> {
        let args = match args {
            TaskArgs::Title(args) => args,
            other => return Err(mismatched_args(TaskType::Title, other.task_type())),
        };

        let session = data.session(&args.session_id).await?.ok_or_else(|| {
            TaskError::arg_transform(format!("session '{}' not found", args.session_id))
        })?;
        let enhanced_md = data
            .enhanced_notes(&session.id)
            .await?
            .into_iter()
            .map(|note| note.content)
            .find(|content| !content.trim().is_empty());

        Ok(EnrichedArgs::Title(TitleContext {
            session_id: args.session_id,
            title: session.title,
            raw_md: session.raw_md,
            enhanced_md,
        }))
    }

    fn execute_workflow(&self, ctx: WorkflowContext) -> EventStream {
        let WorkflowContext {
            model, args, cancel, ..
        } = ctx;
        let args = match args {
            EnrichedArgs::Title(args) => args,
            other => return failed_stream(mismatched_args(TaskType::Title, other.task_type())),
        };

        let mut request = GenerateRequest::prompt(args.prompt()).with_system(SYSTEM_PROMPT);
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }

        Box::pin(try_stream! {
            debug!(session_id = %args.session_id, model = model.model_id(), "Generating title");
            let mut events = cancel.run_fallible(model.stream(request, cancel.clone())).await?;
            while let Some(event) = cancel.run(events.next()).await? {
                yield event?;
            }
        })
    }

    fn transforms(&self) -> Vec<TransformFactory> {
        vec![smooth_stream(self.smoothing.clone())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use crate::tasks::EnhanceArgs;

    const FIXTURE: &str = r##"{
        "sessions": [{ "id": "s1", "title": "", "raw_md": "- budget review" }],
        "enhanced_notes": [
            { "id": "n0", "session_id": "s1", "content": "  " },
            { "id": "n1", "session_id": "s1", "content": "# Budget\n- approved" }
        ]
    }"##;

    #[tokio::test]
    async fn test_transform_args_prefers_enhanced_note() {
        let store = InMemoryStore::from_json(FIXTURE).unwrap();
        let task = TitleTask::default();

        let EnrichedArgs::Title(ctx) = task
            .transform_args(TitleArgs::new("s1").into(), &store)
            .await
            .unwrap()
        else {
            panic!("expected title context");
        };
        assert_eq!(ctx.enhanced_md.as_deref(), Some("# Budget\n- approved"));
        assert!(ctx.prompt().contains("# Budget"));
        assert!(!ctx.prompt().contains("Current title"));
    }

    #[tokio::test]
    async fn test_missing_session_and_wrong_args_are_arg_errors() {
        let store = InMemoryStore::from_json(FIXTURE).unwrap();
        let task = TitleTask::default();

        let err = task
            .transform_args(TitleArgs::new("nope").into(), &store)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::ArgTransform(_)));

        let err = task
            .transform_args(EnhanceArgs::new("s1", "n1").into(), &store)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::ArgTransform(_)));
    }
}
