//! Tools the model may call during a generation
//!
//! A [`Tool`] is an async function over JSON. Tools are grouped in a
//! [`ToolSet`] which a workflow hands to the model (as [`ToolDefinition`]s)
//! and uses to execute the calls the model makes.

use crate::cancel::CancelSignal;
use crate::error::{Result, TaskError};
use crate::event::ToolCall;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Description of a tool as presented to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name
    pub name: String,

    /// What the tool does and when to use it
    pub description: String,

    /// JSON Schema of the tool's input
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

impl ToolDefinition {
    /// Create a new tool definition with name and description.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: None,
        }
    }

    /// Add a JSON Schema for the tool's parameters.
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = Some(parameters);
        self
    }
}

/// A callable tool
#[async_trait]
pub trait Tool: Send + Sync {
    /// Definition sent to the model
    fn definition(&self) -> ToolDefinition;

    /// Run the tool. Long-running tools should race their work against `cancel`.
    async fn execute(&self, input: Value, cancel: CancelSignal) -> Result<Value>;
}

/// Named collection of tools
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSet")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolSet {
    /// Create an empty tool set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool, replacing any tool with the same name
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.insert(tool);
        self
    }

    /// Add a tool, replacing any tool with the same name
    pub fn insert(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name;
        self.tools.insert(name, tool);
    }

    /// Whether the set has no tools
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Names of all tools, sorted
    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Definitions of all tools, sorted by name
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Execute one tool call.
    ///
    /// Unknown tools and tool failures are reported as [`TaskError::Tool`];
    /// cancellation is passed through untouched.
    pub async fn execute(&self, call: &ToolCall, cancel: CancelSignal) -> Result<Value> {
        let tool = self
            .tools
            .get(&call.tool_name)
            .ok_or_else(|| TaskError::tool(&call.tool_name, "unknown tool"))?;

        debug!(tool = %call.tool_name, call_id = %call.tool_call_id, "Executing tool");

        match cancel
            .run_fallible(tool.execute(call.input.clone(), cancel.clone()))
            .await
        {
            Ok(output) => Ok(output),
            Err(TaskError::Cancelled) => Err(TaskError::Cancelled),
            Err(err @ TaskError::Tool { .. }) => Err(err),
            Err(err) => {
                warn!(tool = %call.tool_name, error = %err, "Tool execution failed");
                Err(TaskError::tool(&call.tool_name, err.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new("echo", "Return the input unchanged")
        }

        async fn execute(&self, input: Value, _cancel: CancelSignal) -> Result<Value> {
            Ok(input)
        }
    }

    #[tokio::test]
    async fn test_execute_known_tool() {
        let tools = ToolSet::new().with_tool(Arc::new(Echo));
        let call = ToolCall::new("c1", "echo", json!({"x": 1}));

        let output = tools.execute(&call, CancelSignal::new()).await.unwrap();
        assert_eq!(output, json!({"x": 1}));
        assert_eq!(tools.names(), vec!["echo".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_a_tool_error() {
        let tools = ToolSet::new();
        let call = ToolCall::new("c1", "missing", Value::Null);

        let err = tools.execute(&call, CancelSignal::new()).await.unwrap_err();
        assert!(matches!(err, TaskError::Tool { ref tool_name, .. } if tool_name == "missing"));
    }
}
