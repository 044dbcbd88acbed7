//! Tool execution.

use chronicle_core::diff::StateDiff;
use chronicle_core::generator::{ChatMessage, ChatRole, ToolCallRequest};
use chronicle_core::rng::DeterministicRng;
use serde_json::{Value, json};
use thiserror::Error;

use crate::registry::ToolRegistry;

/// Errors a tool invocation can produce.
///
/// These are non-fatal to the turn: the executor converts them into an
/// error-shaped [`ToolResult`] that is surfaced back to the generator as a
/// tool-result message.
#[derive(Debug, Error)]
pub enum ToolError {
    /// No handler is registered under the requested name.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// The arguments did not match the tool's schema.
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    /// The handler itself failed.
    #[error("tool failed: {0}")]
    Handler(String),
}

/// Read-only execution context handed to handlers.
pub struct ToolContext<'a> {
    /// The current state tree. Handlers read it, never mutate it.
    pub state: &'a Value,
    /// The actor whose turn requested the tool.
    pub actor_id: &'a str,
    /// RNG for explicitly randomized handlers.
    pub rng: &'a mut dyn DeterministicRng,
}

/// Successful output of a tool invocation.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Result payload surfaced back to the generator.
    pub result: Value,
    /// Proposed state diffs, forwarded to the engine by the pipeline.
    pub diffs: Vec<StateDiff>,
}

/// Outcome of one dispatched tool call.
#[derive(Debug)]
pub struct ToolResult {
    /// Provider-assigned call id, echoed back when present.
    pub call_id: Option<String>,
    /// The requested tool name.
    pub name: String,
    /// The handler's output, or the error surfaced to the generator.
    pub outcome: Result<ToolOutput, ToolError>,
}

impl ToolResult {
    /// Formats the result as a tool-role chat message for the generator.
    #[must_use]
    pub fn to_chat_message(&self) -> ChatMessage {
        let body = match &self.outcome {
            Ok(output) => json!({
                "tool": self.name,
                "result": output.result,
                "state_diffs": output.diffs,
            }),
            Err(err) => json!({
                "tool": self.name,
                "error": err.to_string(),
            }),
        };
        ChatMessage::new(ChatRole::Tool, body.to_string())
    }
}

/// Dispatches tool calls against a registry.
pub struct ToolExecutor {
    registry: ToolRegistry,
}

impl ToolExecutor {
    /// Creates an executor over the given registry.
    #[must_use]
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    /// The underlying registry.
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Executes one requested tool call.
    ///
    /// Never fails the caller: an unknown tool or a handler error is
    /// returned as an error-shaped [`ToolResult`].
    pub async fn execute(
        &self,
        call: &ToolCallRequest,
        ctx: &mut ToolContext<'_>,
    ) -> ToolResult {
        let outcome = match self.registry.get(&call.name) {
            Some(handler) => handler.call(&call.args, ctx).await,
            None => Err(ToolError::UnknownTool(call.name.clone())),
        };

        if let Err(err) = &outcome {
            tracing::warn!(tool = %call.name, actor_id = %ctx.actor_id, %err, "tool call failed");
        } else {
            tracing::debug!(tool = %call.name, actor_id = %ctx.actor_id, "tool call succeeded");
        }

        ToolResult {
            call_id: call.id.clone(),
            name: call.name.clone(),
            outcome,
        }
    }
}
