//! Bounded multi-step tool loop
//!
//! Streams a generation in steps. Each step relays the model's events, runs
//! the tools the model asked for, and feeds their results back into the
//! conversation for the next step. The loop ends after a step without tool
//! calls or when `max_steps` is reached.
//!
//! ```text
//! start-step ─► model events ─► tool calls? ──no──► finish-step, done
//!                                   │yes
//!                     tool-result / tool-error events
//!                                   │
//!               finish-step ─► next step (until max_steps)
//! ```
//!
//! The loop owns step boundaries: `start-step` / `finish-step` events coming
//! from the model itself are dropped.

use crate::cancel::CancelSignal;
use crate::error::{Result, TaskError};
use crate::event::{Event, EventStream, ToolCall, ToolFailure, ToolResult};
use crate::model::{GenerateRequest, LanguageModel, Message};
use crate::tool::ToolSet;
use async_stream::try_stream;
use futures::{Stream, StreamExt};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

/// Default number of model steps
pub const DEFAULT_MAX_STEPS: usize = 5;

/// Multi-step generation with tool execution
#[derive(Clone)]
pub struct ToolLoop {
    model: Arc<dyn LanguageModel>,
    tools: ToolSet,
    max_steps: usize,
}

impl std::fmt::Debug for ToolLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolLoop")
            .field("model", &self.model.model_id())
            .field("tools", &self.tools)
            .field("max_steps", &self.max_steps)
            .finish()
    }
}

impl ToolLoop {
    /// Create a loop over `model` with `tools`
    pub fn new(model: Arc<dyn LanguageModel>, tools: ToolSet) -> Self {
        Self {
            model,
            tools,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// Set the maximum number of model steps
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// Stream the generation. Tool definitions from the loop's tool set are
    /// added to `request`.
    pub fn stream(&self, request: GenerateRequest, cancel: CancelSignal) -> EventStream {
        Box::pin(run_steps(self.clone(), request, cancel))
    }
}

fn run_steps(
    agent: ToolLoop,
    request: GenerateRequest,
    cancel: CancelSignal,
) -> impl Stream<Item = Result<Event>> + Send {
    try_stream! {
        let mut request = request.with_tools(agent.tools.definitions());

        for step in 1..=agent.max_steps {
            cancel.check()?;
            debug!(step, model = agent.model.model_id(), "Starting step");
            yield Event::StartStep;

            let mut events = cancel
                .run_fallible(agent.model.stream(request.clone(), cancel.clone()))
                .await?;
            let mut text = String::new();
            let mut calls: Vec<ToolCall> = Vec::new();

            while let Some(item) = cancel.run(events.next()).await? {
                match item? {
                    Event::StartStep | Event::FinishStep => {}
                    Event::TextDelta(delta) => {
                        text.push_str(&delta.text);
                        yield Event::TextDelta(delta);
                    }
                    Event::ToolCall(call) => {
                        calls.push(call.clone());
                        yield Event::ToolCall(call);
                    }
                    other => {
                        yield other;
                    }
                }
            }
            drop(events);

            if calls.is_empty() {
                yield Event::FinishStep;
                break;
            }

            request.messages.push(Message::Assistant {
                content: text,
                tool_calls: calls.clone(),
            });

            for call in calls {
                let content = match agent.tools.execute(&call, cancel.clone()).await {
                    Ok(output) => {
                        yield Event::ToolResult(ToolResult {
                            tool_call_id: call.tool_call_id.clone(),
                            tool_name: call.tool_name.clone(),
                            input: call.input.clone(),
                            output: output.clone(),
                        });
                        output
                    }
                    Err(TaskError::Tool { message, .. }) => {
                        yield Event::ToolError(ToolFailure {
                            tool_call_id: call.tool_call_id.clone(),
                            tool_name: call.tool_name.clone(),
                            input: call.input.clone(),
                            error: message.clone(),
                        });
                        json!({ "error": message })
                    }
                    Err(other) => Err::<serde_json::Value, _>(other)?,
                };
                request.messages.push(Message::Tool {
                    tool_call_id: call.tool_call_id,
                    tool_name: call.tool_name,
                    content,
                });
            }

            yield Event::FinishStep;
            if step == agent.max_steps {
                info!(max_steps = agent.max_steps, "Step limit reached, ending generation");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Script, ScriptedModel};
    use crate::tool::{Tool, ToolDefinition};
    use async_trait::async_trait;
    use serde_json::Value;

    struct Lookup;

    #[async_trait]
    impl Tool for Lookup {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new("lookup", "Look up a fact")
        }

        async fn execute(&self, input: Value, _cancel: CancelSignal) -> Result<Value> {
            match input["key"].as_str() {
                Some("owner") => Ok(json!("Dana")),
                _ => Err(TaskError::tool("lookup", "no such key")),
            }
        }
    }

    fn lookup_call(id: &str, key: &str) -> Event {
        Event::ToolCall(ToolCall::new(id, "lookup", json!({ "key": key })))
    }

    async fn collect(stream: EventStream) -> Vec<Event> {
        stream.map(|item| item.unwrap()).collect().await
    }

    #[tokio::test]
    async fn test_single_step_without_tools() {
        let model = Arc::new(ScriptedModel::new(vec![Script::text("Hello")]));
        let agent = ToolLoop::new(model.clone(), ToolSet::new());

        let events = collect(agent.stream(GenerateRequest::prompt("hi"), CancelSignal::new())).await;

        assert_eq!(events.first(), Some(&Event::StartStep));
        assert_eq!(events.last(), Some(&Event::FinishStep));
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_tool_results_are_fed_into_the_next_step() {
        let model = Arc::new(ScriptedModel::new(vec![
            Script::events(vec![lookup_call("c1", "owner"), lookup_call("c2", "missing")]),
            Script::text("Dana owns it"),
        ]));
        let tools = ToolSet::new().with_tool(Arc::new(Lookup));
        let agent = ToolLoop::new(model.clone(), tools);

        let events = collect(agent.stream(GenerateRequest::prompt("who?"), CancelSignal::new())).await;

        let kinds: Vec<&str> = events.iter().map(Event::kind).collect();
        assert_eq!(
            kinds,
            vec![
                "start-step",
                "tool-call",
                "tool-call",
                "tool-result",
                "tool-error",
                "finish-step",
                "start-step",
                "text-start",
                "text-delta",
                "text-end",
                "finish-step",
            ]
        );

        let requests = model.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].tools.len(), 1);
        let last = requests[1].messages.last().unwrap();
        assert_eq!(
            last,
            &Message::Tool {
                tool_call_id: "c2".into(),
                tool_name: "lookup".into(),
                content: json!({ "error": "no such key" }),
            }
        );
    }

    #[tokio::test]
    async fn test_loop_stops_at_max_steps() {
        let model = Arc::new(ScriptedModel::new(vec![
            Script::events(vec![lookup_call("c1", "owner")]),
            Script::events(vec![lookup_call("c2", "owner")]),
            Script::events(vec![lookup_call("c3", "owner")]),
        ]));
        let tools = ToolSet::new().with_tool(Arc::new(Lookup));
        let agent = ToolLoop::new(model.clone(), tools).with_max_steps(2);

        let events = collect(agent.stream(GenerateRequest::prompt("loop"), CancelSignal::new())).await;

        assert_eq!(model.call_count(), 2);
        let steps = events.iter().filter(|e| **e == Event::StartStep).count();
        assert_eq!(steps, 2);
    }

    #[tokio::test]
    async fn test_provider_error_ends_the_loop() {
        let model = Arc::new(ScriptedModel::new(vec![Script::error("overloaded")]));
        let agent = ToolLoop::new(model, ToolSet::new());

        let results: Vec<Result<Event>> = agent
            .stream(GenerateRequest::prompt("hi"), CancelSignal::new())
            .collect()
            .await;

        assert!(matches!(results.last(), Some(Err(TaskError::Provider { .. }))));
    }
}
