//! Enhance task: raw notes plus transcript into a structured note

mod args;
mod prompt;
mod workflow;

pub use args::{
    build_context, build_segments, parse_template_sections, AttachmentInfo, EnhanceArgs,
    EnhanceContext, Participant, SessionInfo, TemplateInfo, TemplateSection, TranscriptSegment,
};
pub use prompt::{format_timestamp, parse_outline};
pub use workflow::validate_first_line;

use super::{failed_stream, mismatched_args, EnrichedArgs, TaskArgs, TaskDefinition, WorkflowContext};
use crate::config::EnhanceConfig;
use crate::store::DataAccess;
use crate::task::TaskType;
use aitask_core::transform::{section_separators, smooth_stream, trim_before_marker, SmoothConfig};
use aitask_core::{EventStream, TransformFactory, ValidationConfig, DEFAULT_MAX_STEPS};
use async_trait::async_trait;
use std::time::Duration;

/// Resolved enhance settings
#[derive(Debug, Clone)]
pub struct EnhanceSettings {
    /// Text before the first occurrence of this marker is dropped
    pub marker: String,
    /// Ask the model for a section outline when no template is set
    pub analyze_structure: bool,
    /// Tool loop step limit
    pub max_steps: usize,
    /// Sampling temperature; provider default when unset
    pub temperature: Option<f32>,
    /// Early validation of the opening heading
    pub validation: ValidationConfig,
    /// Output pacing
    pub smoothing: SmoothConfig,
}

impl Default for EnhanceSettings {
    fn default() -> Self {
        Self {
            marker: "#".to_string(),
            analyze_structure: true,
            max_steps: DEFAULT_MAX_STEPS,
            temperature: None,
            validation: ValidationConfig::default(),
            smoothing: SmoothConfig::words(Duration::from_millis(30)),
        }
    }
}

/// The enhance task definition
#[derive(Debug, Clone, Default)]
pub struct EnhanceTask {
    settings: EnhanceSettings,
}

impl EnhanceTask {
    /// Create a task with explicit settings
    pub fn new(settings: EnhanceSettings) -> Self {
        Self { settings }
    }

    /// Resolve settings from configuration
    pub fn from_config(config: &EnhanceConfig) -> crate::error::Result<Self> {
        Ok(Self::new(EnhanceSettings {
            marker: config.marker.clone(),
            analyze_structure: config.analyze_structure,
            max_steps: config.max_steps,
            temperature: config.temperature,
            validation: config.validation.into(),
            smoothing: config.smoothing.to_smooth_config()?,
        }))
    }

    /// Settings in effect
    pub fn settings(&self) -> &EnhanceSettings {
        &self.settings
    }
}

#[async_trait]
impl TaskDefinition for EnhanceTask {
    fn task_type(&self) -> TaskType {
        TaskType::Enhance
    }

    async fn transform_args(
        &self,
        args: TaskArgs,
        data: &dyn DataAccess,
    ) -> aitask_core::Result<EnrichedArgs> {
        match args {
            TaskArgs::Enhance(args) => Ok(EnrichedArgs::Enhance(build_context(args, data).await?)),
            other => Err(mismatched_args(TaskType::Enhance, other.task_type())),
        }
    }

    fn execute_workflow(&self, ctx: WorkflowContext) -> EventStream {
        let WorkflowContext {
            model,
            args,
            tools,
            progress,
            cancel,
        } = ctx;
        match args {
            EnrichedArgs::Enhance(args) => {
                workflow::run(self.settings.clone(), args, model, tools, progress, cancel)
            }
            other => failed_stream(mismatched_args(TaskType::Enhance, other.task_type())),
        }
    }

    fn transforms(&self) -> Vec<TransformFactory> {
        vec![
            trim_before_marker(self.settings.marker.clone()),
            section_separators(),
            smooth_stream(self.settings.smoothing.clone()),
        ]
    }
}
