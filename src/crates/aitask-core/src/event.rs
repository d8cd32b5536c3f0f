//! Generation events
//!
//! [`Event`] is the unit that flows from a model, through a workflow and the
//! transform pipeline, into the task registry. The set of kinds is closed:
//! adding a kind is a compile error in every `match` that consumes events.
//!
//! Failures are not events. A stream yields `Result<Event>` and a provider
//! failure arrives as the `Err` side of an item.

use crate::error::Result;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;

/// Boxed stream of generation events
pub type EventStream = Pin<Box<dyn Stream<Item = Result<Event>> + Send>>;

/// Incremental text produced by the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextDelta {
    /// Identifier of the text block this delta belongs to
    pub id: String,
    /// The text payload
    pub text: String,
}

impl TextDelta {
    /// Create a new text delta
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// A request from the model to run a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier correlating the call with its result
    pub tool_call_id: String,
    /// Name of the tool to run
    pub tool_name: String,
    /// Arguments for the tool
    #[serde(default)]
    pub input: Value,
}

impl ToolCall {
    /// Create a new tool call
    pub fn new(tool_call_id: impl Into<String>, tool_name: impl Into<String>, input: Value) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            input,
        }
    }
}

/// Successful tool output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Identifier of the originating call
    pub tool_call_id: String,
    /// Name of the tool that ran
    pub tool_name: String,
    /// Arguments the tool ran with
    #[serde(default)]
    pub input: Value,
    /// Output returned by the tool
    #[serde(default)]
    pub output: Value,
}

/// Failed tool execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFailure {
    /// Identifier of the originating call
    pub tool_call_id: String,
    /// Name of the tool that failed
    pub tool_name: String,
    /// Arguments the tool was called with
    #[serde(default)]
    pub input: Value,
    /// Error message
    pub error: String,
}

/// One unit of a generation stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Event {
    /// A text block opens
    TextStart {
        /// Text block identifier
        id: String,
    },
    /// Text payload
    TextDelta(TextDelta),
    /// A text block closes
    TextEnd {
        /// Text block identifier
        id: String,
    },
    /// The model requested a tool call
    ToolCall(ToolCall),
    /// A tool call completed
    ToolResult(ToolResult),
    /// A tool call failed
    ToolError(ToolFailure),
    /// The model started streaming tool input
    ToolInputStart {
        /// Tool call identifier
        id: String,
        /// Tool being called
        tool_name: String,
    },
    /// Partial tool input
    ToolInputDelta {
        /// Tool call identifier
        id: String,
        /// Raw input fragment
        delta: String,
    },
    /// Tool input is complete
    ToolInputEnd {
        /// Tool call identifier
        id: String,
    },
    /// A generation step begins
    StartStep,
    /// A generation step ends
    FinishStep,
}

impl Event {
    /// Create a text delta event
    pub fn text_delta(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::TextDelta(TextDelta::new(id, text))
    }

    /// Create a text start event
    pub fn text_start(id: impl Into<String>) -> Self {
        Self::TextStart { id: id.into() }
    }

    /// Create a text end event
    pub fn text_end(id: impl Into<String>) -> Self {
        Self::TextEnd { id: id.into() }
    }

    /// Text payload, when this is a `text-delta`
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::TextDelta(delta) => Some(&delta.text),
            _ => None,
        }
    }

    /// Wire name of the event kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TextStart { .. } => "text-start",
            Self::TextDelta(_) => "text-delta",
            Self::TextEnd { .. } => "text-end",
            Self::ToolCall(_) => "tool-call",
            Self::ToolResult(_) => "tool-result",
            Self::ToolError(_) => "tool-error",
            Self::ToolInputStart { .. } => "tool-input-start",
            Self::ToolInputDelta { .. } => "tool-input-delta",
            Self::ToolInputEnd { .. } => "tool-input-end",
            Self::StartStep => "start-step",
            Self::FinishStep => "finish-step",
        }
    }
}

/// Build an [`EventStream`] from already-known events
pub fn from_events(events: impl IntoIterator<Item = Event>) -> EventStream {
    let items: Vec<Result<Event>> = events.into_iter().map(Ok).collect();
    Box::pin(futures::stream::iter(items))
}

/// Concatenate the text of every `text-delta` in `events`
pub fn collect_text<'a>(events: impl IntoIterator<Item = &'a Event>) -> String {
    events.into_iter().filter_map(Event::as_text).collect()
}
