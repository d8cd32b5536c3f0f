//! Task definitions
//!
//! A task type is three pieces: an argument transformer that resolves raw
//! caller arguments against the data store, a workflow that turns the
//! enriched arguments into an event stream, and the ordered transform
//! stages applied to that stream. [`TaskConfigs`] maps each [`TaskType`] to
//! its [`TaskDefinition`].

pub mod enhance;
pub mod title;

pub use enhance::{EnhanceArgs, EnhanceContext, EnhanceTask};
pub use title::{TitleArgs, TitleContext, TitleTask};

use crate::config::AppConfig;
use crate::error::Result;
use crate::state::CurrentStep;
use crate::store::DataAccess;
use crate::task::TaskType;
use aitask_core::{
    CancelSignal, EventStream, LanguageModel, TaskError, ToolSet, TransformFactory,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Raw arguments supplied by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "lowercase")]
pub enum TaskArgs {
    /// Arguments for [`TaskType::Enhance`]
    Enhance(EnhanceArgs),
    /// Arguments for [`TaskType::Title`]
    Title(TitleArgs),
}

impl TaskArgs {
    /// Task type these arguments belong to
    pub fn task_type(&self) -> TaskType {
        match self {
            Self::Enhance(_) => TaskType::Enhance,
            Self::Title(_) => TaskType::Title,
        }
    }
}

impl From<EnhanceArgs> for TaskArgs {
    fn from(args: EnhanceArgs) -> Self {
        Self::Enhance(args)
    }
}

impl From<TitleArgs> for TaskArgs {
    fn from(args: TitleArgs) -> Self {
        Self::Title(args)
    }
}

/// Prompt context produced by an argument transformer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "task", rename_all = "lowercase")]
pub enum EnrichedArgs {
    /// Context for [`TaskType::Enhance`]
    Enhance(EnhanceContext),
    /// Context for [`TaskType::Title`]
    Title(TitleContext),
}

impl EnrichedArgs {
    /// Task type this context belongs to
    pub fn task_type(&self) -> TaskType {
        match self {
            Self::Enhance(_) => TaskType::Enhance,
            Self::Title(_) => TaskType::Title,
        }
    }
}

/// Sink for workflow progress notices
#[derive(Clone)]
pub struct Progress(Arc<dyn Fn(CurrentStep) + Send + Sync>);

impl Progress {
    /// Forward notices to `report`
    pub fn new<F>(report: F) -> Self
    where
        F: Fn(CurrentStep) + Send + Sync + 'static,
    {
        Self(Arc::new(report))
    }

    /// Discard all notices
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    /// Report a notice
    pub fn report(&self, step: CurrentStep) {
        (self.0)(step)
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Progress")
    }
}

/// Everything a workflow runs with
#[derive(Clone)]
pub struct WorkflowContext {
    /// Model handle
    pub model: Arc<dyn LanguageModel>,
    /// Enriched arguments
    pub args: EnrichedArgs,
    /// Tools the workflow may offer the model
    pub tools: ToolSet,
    /// Progress sink
    pub progress: Progress,
    /// Cancellation for this run
    pub cancel: CancelSignal,
}

impl std::fmt::Debug for WorkflowContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowContext")
            .field("model", &self.model.model_id())
            .field("task_type", &self.args.task_type())
            .field("tools", &self.tools)
            .finish()
    }
}

/// One registered task type
#[async_trait]
pub trait TaskDefinition: Send + Sync {
    /// Task type served by this definition
    fn task_type(&self) -> TaskType;

    /// Resolve raw arguments into a prompt context
    async fn transform_args(
        &self,
        args: TaskArgs,
        data: &dyn DataAccess,
    ) -> aitask_core::Result<EnrichedArgs>;

    /// Start the workflow
    fn execute_workflow(&self, ctx: WorkflowContext) -> EventStream;

    /// Transform stages, in application order
    fn transforms(&self) -> Vec<TransformFactory>;
}

pub(crate) fn mismatched_args(expected: TaskType, received: TaskType) -> TaskError {
    TaskError::arg_transform(format!(
        "{expected} task received {received} arguments"
    ))
}

pub(crate) fn failed_stream(error: TaskError) -> EventStream {
    Box::pin(futures::stream::once(async move { Err(error) }))
}

/// Registered task types
#[derive(Clone, Default)]
pub struct TaskConfigs {
    tasks: HashMap<TaskType, Arc<dyn TaskDefinition>>,
}

impl TaskConfigs {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in task types configured from `config`
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new()
            .with(Arc::new(EnhanceTask::from_config(&config.enhance)?))
            .with(Arc::new(TitleTask::from_config(&config.title)?)))
    }

    /// Register `task`, replacing any definition for the same type
    pub fn with(mut self, task: Arc<dyn TaskDefinition>) -> Self {
        self.tasks.insert(task.task_type(), task);
        self
    }

    /// Definition for `task_type`
    pub fn get(&self, task_type: TaskType) -> Option<Arc<dyn TaskDefinition>> {
        self.tasks.get(&task_type).cloned()
    }

    /// Registered task types, sorted
    pub fn task_types(&self) -> Vec<TaskType> {
        let mut types: Vec<TaskType> = self.tasks.keys().copied().collect();
        types.sort();
        types
    }
}

impl std::fmt::Debug for TaskConfigs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskConfigs")
            .field("tasks", &self.task_types())
            .finish()
    }
}
