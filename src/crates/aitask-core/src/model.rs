//! Language model abstraction
//!
//! The engine does not talk to model providers itself. It consumes an opaque
//! streaming generation capability, expressed as the [`LanguageModel`] trait.
//! Provider integrations implement the trait; tasks only ever see
//! `Arc<dyn LanguageModel>`.
//!
//! # Implementing a provider
//!
//! ```rust,ignore
//! use aitask_core::{CancelSignal, EventStream, GenerateRequest, LanguageModel, Result};
//! use async_trait::async_trait;
//!
//! struct MyProvider { model: String }
//!
//! #[async_trait]
//! impl LanguageModel for MyProvider {
//!     fn model_id(&self) -> &str {
//!         &self.model
//!     }
//!
//!     async fn stream(&self, request: GenerateRequest, cancel: CancelSignal) -> Result<EventStream> {
//!         // Open the provider stream and map its chunks to `Event`s.
//!         // Dropping the returned stream must close the connection.
//!         todo!()
//!     }
//! }
//! ```

use crate::cancel::CancelSignal;
use crate::error::Result;
use crate::event::{Event, EventStream, ToolCall};
use crate::tool::ToolDefinition;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One conversation turn sent to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    /// User input
    User {
        /// Prompt text
        content: String,
    },
    /// Earlier model output, including the tool calls it made
    Assistant {
        /// Text generated in that turn
        content: String,
        /// Tool calls requested in that turn
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    /// Output of a tool call
    Tool {
        /// Identifier of the call this answers
        tool_call_id: String,
        /// Tool that produced the output
        tool_name: String,
        /// Tool output (or `{"error": ...}`)
        content: Value,
    },
}

impl Message {
    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }
}

/// Everything a provider needs for one generation call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// System prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Conversation so far
    #[serde(default)]
    pub messages: Vec<Message>,

    /// Tools the model may call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl GenerateRequest {
    /// Create a request with a single user prompt
    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(prompt)],
            ..Default::default()
        }
    }

    /// Set the system prompt
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Offer tools to the model
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature.clamp(0.0, 2.0));
        self
    }

    /// Text of the last user message, if any
    pub fn last_user_prompt(&self) -> Option<&str> {
        self.messages.iter().rev().find_map(|m| match m {
            Message::User { content } => Some(content.as_str()),
            _ => None,
        })
    }
}

/// Opaque streaming text/tool generation capability
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Identifier of the underlying model, used for logging
    fn model_id(&self) -> &str;

    /// Start a streamed generation.
    ///
    /// Implementations must stop producing events once `cancel` fires and
    /// must release the underlying connection when the stream is dropped.
    async fn stream(&self, request: GenerateRequest, cancel: CancelSignal) -> Result<EventStream>;

    /// Run a generation to completion and return its text.
    ///
    /// Used for short sub-calls whose output is not streamed to callers.
    async fn generate_text(&self, request: GenerateRequest, cancel: CancelSignal) -> Result<String> {
        let mut stream = cancel.run_fallible(self.stream(request, cancel.clone())).await?;
        let mut text = String::new();
        while let Some(item) = cancel.run(stream.next()).await? {
            if let Event::TextDelta(delta) = item? {
                text.push_str(&delta.text);
            }
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_builder() {
        let request = GenerateRequest::prompt("Summarize")
            .with_system("You are terse")
            .with_temperature(3.5);

        assert_eq!(request.system.as_deref(), Some("You are terse"));
        assert_eq!(request.temperature, Some(2.0));
        assert_eq!(request.last_user_prompt(), Some("Summarize"));
    }

    #[test]
    fn test_message_wire_format() {
        let message = Message::Tool {
            tool_call_id: "call_1".into(),
            tool_name: "search".into(),
            content: json!({"hits": 2}),
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["role"], "tool");
        assert_eq!(value["content"]["hits"], 2);
    }
}
