//! Scripted language model
//!
//! [`ScriptedModel`] replays pre-recorded event scripts, one per `stream`
//! call, and records every request it receives. It backs the unit and
//! integration tests and the CLI's offline mode.
//!
//! Scripts can be written in JSON:
//!
//! ```json
//! {
//!   "model_id": "scripted",
//!   "delay_ms": 20,
//!   "scripts": [
//!     { "chunks": ["Intro ", "text"] },
//!     { "chunks": ["# Real Title\n\n", "Body"] },
//!     { "events": [{ "type": "tool-call", "tool_call_id": "c1", "tool_name": "search", "input": {} }] },
//!     { "error": "rate limited" }
//!   ]
//! }
//! ```

use crate::cancel::CancelSignal;
use crate::error::{Result, TaskError};
use crate::event::{Event, EventStream};
use crate::model::{GenerateRequest, LanguageModel};
use async_stream::try_stream;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Response to one `stream` call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Script {
    /// Text chunks, emitted as one text block before `events`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chunks: Vec<String>,

    /// Events emitted after the text block
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<Event>,

    /// Provider error raised after all events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Script {
    /// A single text block
    pub fn text(text: impl Into<String>) -> Self {
        Self::chunks([text.into()])
    }

    /// A text block delivered in several deltas
    pub fn chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Raw events
    pub fn events(events: Vec<Event>) -> Self {
        Self {
            events,
            ..Default::default()
        }
    }

    /// A provider failure with no output
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    /// Raise a provider error after the scripted output
    pub fn then_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    fn to_events(&self, block_id: &str) -> Vec<Event> {
        let mut events = Vec::with_capacity(self.chunks.len() + self.events.len() + 2);
        if !self.chunks.is_empty() {
            events.push(Event::text_start(block_id));
            events.extend(self.chunks.iter().map(|c| Event::text_delta(block_id, c.as_str())));
            events.push(Event::text_end(block_id));
        }
        events.extend(self.events.iter().cloned());
        events
    }
}

/// On-disk form of a [`ScriptedModel`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptFile {
    /// Reported model identifier
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Pause before each event, in milliseconds
    #[serde(default)]
    pub delay_ms: u64,

    /// Replay the final script for every call once the list is exhausted
    #[serde(default)]
    pub repeat_last: bool,

    /// Responses, in call order
    #[serde(default)]
    pub scripts: Vec<Script>,
}

fn default_model_id() -> String {
    "scripted".to_string()
}

/// Language model that replays scripts
#[derive(Debug)]
pub struct ScriptedModel {
    model_id: String,
    delay: Duration,
    repeat_last: bool,
    scripts: Mutex<VecDeque<Script>>,
    last: Mutex<Option<Script>>,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedModel {
    /// Create a model answering calls with `scripts` in order
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            model_id: default_model_id(),
            delay: Duration::ZERO,
            repeat_last: false,
            scripts: Mutex::new(scripts.into()),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every call with the same script
    pub fn repeating(script: Script) -> Self {
        Self::new(vec![script]).with_repeat_last(true)
    }

    /// Pause before every event
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Keep replaying the final script once the list is exhausted
    pub fn with_repeat_last(mut self, repeat_last: bool) -> Self {
        self.repeat_last = repeat_last;
        self
    }

    /// Set the reported model identifier
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Build a model from its on-disk form
    pub fn from_file(file: ScriptFile) -> Self {
        Self::new(file.scripts)
            .with_model_id(file.model_id)
            .with_delay(Duration::from_millis(file.delay_ms))
            .with_repeat_last(file.repeat_last)
    }

    /// Parse a JSON script file
    pub fn from_json(json: &str) -> Result<Self> {
        let file: ScriptFile = serde_json::from_str(json)?;
        Ok(Self::from_file(file))
    }

    /// Load a JSON script file from disk
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_json(&json)
    }

    /// Number of `stream` calls so far
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().clone()
    }

    fn next_script(&self) -> Option<Script> {
        let next = self.scripts.lock().pop_front();
        match next {
            Some(script) => {
                *self.last.lock() = Some(script.clone());
                Some(script)
            }
            None if self.repeat_last => self.last.lock().clone(),
            None => None,
        }
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn stream(&self, request: GenerateRequest, cancel: CancelSignal) -> Result<EventStream> {
        let call = {
            let mut requests = self.requests.lock();
            requests.push(request);
            requests.len()
        };
        let script = self
            .next_script()
            .ok_or_else(|| TaskError::provider(format!("no scripted response for call {call}")))?;
        debug!(call, model = %self.model_id, "Replaying script");

        let events = script.to_events(&format!("text-{call}"));
        let error = script.error;
        let delay = self.delay;

        Ok(Box::pin(try_stream! {
            for event in events {
                if delay.is_zero() {
                    cancel.check()?;
                } else {
                    cancel.sleep(delay).await?;
                }
                yield event;
            }
            if let Some(message) = error {
                Err::<(), _>(TaskError::provider(message))?;
            }
        }))
    }
}
