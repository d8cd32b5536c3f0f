//! Task registry
//!
//! The registry owns one [`TaskState`] per [`TaskId`]. `generate` runs the
//! task's argument transformer, workflow and transform stages, and replaces
//! the entry after every visible change. Entries are swapped whole, so a
//! reader always sees a consistent snapshot.
//!
//! Each run carries a generation number. `cancel`, `reset` and a new
//! `generate` detach the running generation; a detached run never writes to
//! its entry again and never calls its completion callback.

use crate::state::{CurrentStep, StepRecorder, TaskState, TaskStatus, TaskUpdate};
use crate::store::DataAccess;
use crate::task::TaskId;
use crate::tasks::{Progress, TaskArgs, TaskConfigs, WorkflowContext};
use aitask_core::{
    apply_transforms, CancelSignal, Event, LanguageModel, TaskError, ToolSet, TransformContext,
};
use chrono::Utc;
use futures::{Stream, StreamExt};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// Called once with the final text of a successful run
pub type OnComplete = Box<dyn FnOnce(String) + Send>;

/// Inputs of one `generate` call
pub struct GenerateOptions {
    /// Model handle
    pub model: Arc<dyn LanguageModel>,
    /// Raw task arguments
    pub args: TaskArgs,
    /// Completion callback
    pub on_complete: Option<OnComplete>,
}

impl GenerateOptions {
    /// Options for running `args` on `model`, with no completion callback
    pub fn new(model: Arc<dyn LanguageModel>, args: impl Into<TaskArgs>) -> Self {
        Self {
            model,
            args: args.into(),
            on_complete: None,
        }
    }

    /// Set the completion callback
    pub fn on_complete<F>(mut self, on_complete: F) -> Self
    where
        F: FnOnce(String) + Send + 'static,
    {
        self.on_complete = Some(Box::new(on_complete));
        self
    }
}

impl std::fmt::Debug for GenerateOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerateOptions")
            .field("model", &self.model.model_id())
            .field("args", &self.args)
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

struct Entry {
    state: Arc<TaskState>,
    cancel: Option<CancelSignal>,
    generation: u64,
}

struct Inner {
    tasks: RwLock<HashMap<TaskId, Entry>>,
    next_generation: AtomicU64,
    updates: broadcast::Sender<TaskUpdate>,
    configs: TaskConfigs,
    data: Arc<dyn DataAccess>,
    tools: ToolSet,
}

/// Owner of all task states
#[derive(Clone)]
pub struct TaskRegistry {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("configs", &self.inner.configs)
            .field("tasks", &self.inner.tasks.read().len())
            .finish()
    }
}

impl TaskRegistry {
    /// Create a registry
    pub fn new(configs: TaskConfigs, data: Arc<dyn DataAccess>, tools: ToolSet) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                tasks: RwLock::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
                updates,
                configs,
                data,
                tools,
            }),
        }
    }

    /// Run a task to completion and return its final state.
    ///
    /// A run still generating under the same id is cancelled first. A run
    /// detached by `cancel`, `reset` or a newer `generate` returns the
    /// entry's current state instead.
    pub async fn generate(&self, task_id: TaskId, options: GenerateOptions) -> Arc<TaskState> {
        let GenerateOptions {
            model,
            args,
            on_complete,
        } = options;
        let task_type = task_id.task_type;
        let cancel = CancelSignal::new();
        let generation = self.install(&task_id, cancel.clone());
        let run_id = Uuid::new_v4();

        info!(
            task_id = %task_id,
            %run_id,
            generation,
            model = model.model_id(),
            "Task started"
        );

        let mut text = String::new();
        let mut recorder = StepRecorder::new();
        let result = self
            .drive(&task_id, generation, model, args, &cancel, &mut text, &mut recorder)
            .await;

        match result {
            Ok(()) => {
                let steps = recorder.finish();
                let step_count = steps.len();
                let state = self.finish(
                    &task_id,
                    generation,
                    TaskState::success(task_type, text.clone(), steps),
                );
                if state.is_some() {
                    info!(task_id = %task_id, %run_id, chars = text.len(), steps = step_count, "Task completed");
                    if let Some(on_complete) = on_complete {
                        on_complete(text);
                    }
                }
                state.unwrap_or_else(|| self.get_state(&task_id))
            }
            // Classified by this run's own signal.
            Err(_) if cancel.is_cancelled() => {
                info!(task_id = %task_id, %run_id, "Task cancelled");
                self.finish(&task_id, generation, TaskState::idle(task_type))
                    .unwrap_or_else(|| self.get_state(&task_id))
            }
            Err(e) => {
                let e = e.into_underlying();
                error!(task_id = %task_id, %run_id, error = %e, "Task failed");
                debug!(task_id = %task_id, discarded_steps = recorder.len(), "Discarding steps of failed run");
                self.finish(&task_id, generation, TaskState::failed(task_type, e))
                    .unwrap_or_else(|| self.get_state(&task_id))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn drive(
        &self,
        task_id: &TaskId,
        generation: u64,
        model: Arc<dyn LanguageModel>,
        args: TaskArgs,
        cancel: &CancelSignal,
        text: &mut String,
        recorder: &mut StepRecorder,
    ) -> aitask_core::Result<()> {
        let definition = self.inner.configs.get(task_id.task_type).ok_or_else(|| {
            TaskError::Configuration(format!(
                "no task registered for type '{}'",
                task_id.task_type
            ))
        })?;

        let enriched = cancel
            .run_fallible(definition.transform_args(args, self.inner.data.as_ref()))
            .await?;
        debug!(task_id = %task_id, "Arguments resolved");

        let progress = {
            let registry = self.clone();
            let task_id = task_id.clone();
            Progress::new(move |step| registry.set_current_step(&task_id, generation, step))
        };
        let workflow = definition.execute_workflow(WorkflowContext {
            model,
            args: enriched,
            tools: self.inner.tools.clone(),
            progress,
            cancel: cancel.clone(),
        });

        let transform_ctx = TransformContext::new(self.inner.tools.clone(), cancel.clone());
        let mut events = apply_transforms(workflow, &definition.transforms(), &transform_ctx);

        while let Some(item) = cancel.run(events.next()).await? {
            let event = item?;
            recorder.observe(&event);

            let step = match &event {
                Event::TextDelta(delta) => {
                    text.push_str(&delta.text);
                    CurrentStep::Generating
                }
                Event::ToolCall(call) => {
                    debug!(task_id = %task_id, tool = %call.tool_name, "Tool call");
                    CurrentStep::ToolCall {
                        tool_name: call.tool_name.clone(),
                    }
                }
                Event::ToolResult(result) => CurrentStep::ToolResult {
                    tool_name: result.tool_name.clone(),
                },
                Event::ToolError(failure) => {
                    warn!(task_id = %task_id, tool = %failure.tool_name, error = %failure.error, "Tool failed");
                    CurrentStep::ToolResult {
                        tool_name: failure.tool_name.clone(),
                    }
                }
                Event::TextStart { .. }
                | Event::TextEnd { .. }
                | Event::ToolInputStart { .. }
                | Event::ToolInputDelta { .. }
                | Event::ToolInputEnd { .. }
                | Event::StartStep
                | Event::FinishStep => continue,
            };

            let streamed_text = text.clone();
            self.modify(task_id, generation, move |state| TaskState {
                streamed_text,
                current_step: Some(step),
                updated_at: Utc::now(),
                ..state.clone()
            });
        }
        Ok(())
    }

    /// Cancel the run in flight for `task_id`, leaving it `Idle`.
    ///
    /// Does nothing when no run is active.
    pub fn cancel(&self, task_id: &TaskId) {
        let detached = {
            let mut tasks = self.inner.tasks.write();
            tasks.get_mut(task_id).and_then(|entry| {
                let signal = entry.cancel.take()?;
                entry.generation = self.next_generation();
                entry.state = Arc::new(TaskState::idle(task_id.task_type));
                Some((signal, entry.state.clone()))
            })
        };

        match detached {
            Some((signal, state)) => {
                info!(task_id = %task_id, "Cancelling task");
                signal.cancel();
                self.publish(task_id, state);
            }
            None => debug!(task_id = %task_id, "Nothing to cancel"),
        }
    }

    /// Cancel anything in flight and force the entry to `Idle`
    pub fn reset(&self, task_id: &TaskId) {
        let reset = {
            let mut tasks = self.inner.tasks.write();
            tasks.get_mut(task_id).map(|entry| {
                let signal = entry.cancel.take();
                entry.generation = self.next_generation();
                entry.state = Arc::new(TaskState::idle(task_id.task_type));
                (signal, entry.state.clone())
            })
        };

        if let Some((signal, state)) = reset {
            debug!(task_id = %task_id, "Resetting task");
            if let Some(signal) = signal {
                signal.cancel();
            }
            self.publish(task_id, state);
        }
    }

    /// Current state; absent entries read as a default `Idle` state
    pub fn get_state(&self, task_id: &TaskId) -> Arc<TaskState> {
        self.inner
            .tasks
            .read()
            .get(task_id)
            .map(|entry| entry.state.clone())
            .unwrap_or_default()
    }

    /// Current status
    pub fn get_status(&self, task_id: &TaskId) -> TaskStatus {
        self.inner
            .tasks
            .read()
            .get(task_id)
            .map(|entry| entry.state.status)
            .unwrap_or_default()
    }

    /// Ids of all known tasks
    pub fn task_ids(&self) -> Vec<TaskId> {
        self.inner.tasks.read().keys().cloned().collect()
    }

    /// Receive every state replacement
    pub fn subscribe(&self) -> broadcast::Receiver<TaskUpdate> {
        self.inner.updates.subscribe()
    }

    /// State replacements as a stream; updates missed by a slow consumer are skipped
    pub fn updates(&self) -> impl Stream<Item = TaskUpdate> + Send + 'static {
        BroadcastStream::new(self.subscribe()).filter_map(|update| async move { update.ok() })
    }

    fn next_generation(&self) -> u64 {
        self.inner.next_generation.fetch_add(1, Ordering::Relaxed)
    }

    fn install(&self, task_id: &TaskId, cancel: CancelSignal) -> u64 {
        let generation = self.next_generation();
        let state = Arc::new(TaskState::generating(task_id.task_type));
        let previous = self.inner.tasks.write().insert(
            task_id.clone(),
            Entry {
                state: state.clone(),
                cancel: Some(cancel),
                generation,
            },
        );

        if let Some(signal) = previous.and_then(|entry| entry.cancel) {
            debug!(task_id = %task_id, "Cancelling previous run");
            signal.cancel();
        }
        self.publish(task_id, state);
        generation
    }

    /// Replace the entry with `f(current)` if `generation` still owns it
    fn modify<F>(&self, task_id: &TaskId, generation: u64, f: F) -> Option<Arc<TaskState>>
    where
        F: FnOnce(&TaskState) -> TaskState,
    {
        let state = {
            let mut tasks = self.inner.tasks.write();
            let entry = tasks.get_mut(task_id).filter(|e| e.generation == generation)?;
            entry.state = Arc::new(f(&entry.state));
            entry.state.clone()
        };
        self.publish(task_id, state.clone());
        Some(state)
    }

    /// Write a terminal state and release the cancellation handle
    fn finish(&self, task_id: &TaskId, generation: u64, state: TaskState) -> Option<Arc<TaskState>> {
        let state = {
            let mut tasks = self.inner.tasks.write();
            let entry = tasks.get_mut(task_id).filter(|e| e.generation == generation)?;
            entry.cancel = None;
            entry.state = Arc::new(state);
            entry.state.clone()
        };
        self.publish(task_id, state.clone());
        Some(state)
    }

    fn set_current_step(&self, task_id: &TaskId, generation: u64, step: CurrentStep) {
        debug!(task_id = %task_id, step = ?step, "Workflow progress");
        self.modify(task_id, generation, |state| TaskState {
            current_step: Some(step),
            updated_at: Utc::now(),
            ..state.clone()
        });
    }

    fn publish(&self, task_id: &TaskId, state: Arc<TaskState>) {
        // No receivers is fine.
        let _ = self.inner.updates.send(TaskUpdate {
            task_id: task_id.clone(),
            state,
        });
    }
}
