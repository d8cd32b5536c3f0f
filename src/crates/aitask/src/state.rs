//! Per-task state snapshots
//!
//! A [`TaskState`] is never mutated in place once published. The registry
//! builds a new value for every change and swaps the `Arc`, so a snapshot
//! handed to a reader stays internally consistent.

use crate::task::{TaskId, TaskType};
use aitask_core::{Event, TaskError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Lifecycle status of a task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Never run, cancelled, or reset
    #[default]
    Idle,
    /// A run is in flight
    Generating,
    /// The last run completed
    Success,
    /// The last run failed
    Error,
}

/// What the running task is doing right now
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CurrentStep {
    /// Text is streaming
    Generating,
    /// The model asked for a tool
    ToolCall {
        /// Tool being called
        tool_name: String,
    },
    /// A tool returned
    ToolResult {
        /// Tool that returned
        tool_name: String,
    },
    /// A structure outline is being prepared before generation
    AnalyzingStructure,
    /// The previous attempt was rejected and a new one started
    Retrying {
        /// 1-based attempt number now running
        attempt: usize,
    },
}

/// One completed generation step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StepInfo {
    /// A tool call and its outcome
    ToolCall {
        /// Step the call happened in
        step_number: usize,
        /// Tool that was called
        tool_name: String,
        /// Arguments the model passed
        tool_args: Value,
        /// Tool output, or `{"error": ...}`
        tool_result: Value,
    },
    /// Text produced in a step
    Text {
        /// Step the text belongs to
        step_number: usize,
        /// Text of that step
        text: String,
    },
}

/// Snapshot of one task slot
#[derive(Debug, Clone)]
pub struct TaskState {
    /// Kind of task, once one has run
    pub task_type: Option<TaskType>,
    /// Lifecycle status
    pub status: TaskStatus,
    /// Text after all transforms, as it would be shown to a user
    pub streamed_text: String,
    /// Completed steps; filled only on success
    pub steps: Vec<StepInfo>,
    /// Failure, set only when `status` is `Error`
    pub error: Option<Arc<TaskError>>,
    /// Live activity while generating
    pub current_step: Option<CurrentStep>,
    /// When this snapshot was created
    pub updated_at: DateTime<Utc>,
}

impl Default for TaskState {
    fn default() -> Self {
        Self {
            task_type: None,
            status: TaskStatus::Idle,
            streamed_text: String::new(),
            steps: Vec::new(),
            error: None,
            current_step: None,
            updated_at: Utc::now(),
        }
    }
}

impl TaskState {
    /// A cleared, idle state
    pub fn idle(task_type: TaskType) -> Self {
        Self {
            task_type: Some(task_type),
            ..Default::default()
        }
    }

    /// A fresh run that has produced nothing yet
    pub fn generating(task_type: TaskType) -> Self {
        Self {
            task_type: Some(task_type),
            status: TaskStatus::Generating,
            ..Default::default()
        }
    }

    /// A completed run
    pub fn success(task_type: TaskType, streamed_text: String, steps: Vec<StepInfo>) -> Self {
        Self {
            task_type: Some(task_type),
            status: TaskStatus::Success,
            streamed_text,
            steps,
            ..Default::default()
        }
    }

    /// A failed run
    pub fn failed(task_type: TaskType, error: TaskError) -> Self {
        Self {
            task_type: Some(task_type),
            status: TaskStatus::Error,
            error: Some(Arc::new(error)),
            ..Default::default()
        }
    }

    /// Whether a run is in flight
    pub fn is_generating(&self) -> bool {
        self.status == TaskStatus::Generating
    }
}

/// Published after every replacement of a task's state
#[derive(Debug, Clone)]
pub struct TaskUpdate {
    /// Task that changed
    pub task_id: TaskId,
    /// Its new state
    pub state: Arc<TaskState>,
}

/// Builds [`StepInfo`] records from a finished event stream
#[derive(Debug, Default)]
pub struct StepRecorder {
    step: usize,
    text: String,
    pending: HashMap<String, (String, Value)>,
    steps: Vec<StepInfo>,
}

impl StepRecorder {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    fn step_number(&self) -> usize {
        self.step.max(1)
    }

    fn close_text(&mut self) {
        if !self.text.is_empty() {
            let text = std::mem::take(&mut self.text);
            self.steps.push(StepInfo::Text {
                step_number: self.step_number(),
                text,
            });
        }
    }

    fn close_call(&mut self, tool_call_id: &str, tool_name: &str, input: &Value, result: Value) {
        let (tool_name, tool_args) = self
            .pending
            .remove(tool_call_id)
            .unwrap_or_else(|| (tool_name.to_string(), input.clone()));
        self.steps.push(StepInfo::ToolCall {
            step_number: self.step_number(),
            tool_name,
            tool_args,
            tool_result: result,
        });
    }

    /// Record one event
    pub fn observe(&mut self, event: &Event) {
        match event {
            Event::StartStep => {
                self.close_text();
                self.step += 1;
            }
            Event::FinishStep => self.close_text(),
            Event::TextDelta(delta) => self.text.push_str(&delta.text),
            Event::ToolCall(call) => {
                self.pending.insert(
                    call.tool_call_id.clone(),
                    (call.tool_name.clone(), call.input.clone()),
                );
            }
            Event::ToolResult(result) => self.close_call(
                &result.tool_call_id,
                &result.tool_name,
                &result.input,
                result.output.clone(),
            ),
            Event::ToolError(failure) => self.close_call(
                &failure.tool_call_id,
                &failure.tool_name,
                &failure.input,
                json!({ "error": failure.error }),
            ),
            Event::TextStart { .. }
            | Event::TextEnd { .. }
            | Event::ToolInputStart { .. }
            | Event::ToolInputDelta { .. }
            | Event::ToolInputEnd { .. } => {}
        }
    }

    /// Steps recorded so far
    pub fn len(&self) -> usize {
        self.steps.len() + usize::from(!self.text.is_empty())
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close any open text step and return all steps in order
    pub fn finish(mut self) -> Vec<StepInfo> {
        self.close_text();
        self.steps
    }
}
