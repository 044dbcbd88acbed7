//! Generator backend contract.
//!
//! The component that turns a rendered prompt into text and/or structured
//! tool-call requests is an external collaborator. This module specifies
//! only its input/output contract; the generation pipeline consumes it and
//! treats any transport or provider failure as fatal to the current turn.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Role of a chat message in a generator request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    /// System / instruction message.
    System,
    /// Message authored by another party, presented as input.
    User,
    /// Message previously produced by this generator.
    Assistant,
    /// Result of a tool invocation requested by the generator.
    Tool,
}

/// One message in the conversation presented to the generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The message role.
    pub role: ChatRole,
    /// The message content.
    pub content: String,
}

impl ChatMessage {
    /// Creates a message with the given role.
    #[must_use]
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Declaration of a tool the generator may request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Tool name, matching a registry entry.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON schema of the tool's arguments.
    pub parameters: Value,
}

/// A tool invocation requested by the generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Provider-assigned call id, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Name of the requested tool.
    pub name: String,
    /// Arguments for the tool.
    pub args: Value,
}

/// A fully rendered generator request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorRequest {
    /// Rendered system prompt for the acting actor.
    pub system_prompt: String,
    /// Conversation context, oldest first.
    pub messages: Vec<ChatMessage>,
    /// Tools available for this turn.
    pub tools: Vec<ToolSpec>,
}

/// The generator's answer to one request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneratorReply {
    /// Free-form content, if the generator produced any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool calls the generator requests, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
}

/// Identity of the generator that produced a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorIdentity {
    /// Provider name (e.g. a vendor or a local runtime).
    pub provider: String,
    /// Model identifier.
    pub model: String,
}

impl std::fmt::Display for GeneratorIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

/// Errors raised by a generator backend. Fatal to the turn that issued
/// the request.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// The backend could not be reached or timed out.
    #[error("generator transport error: {0}")]
    Transport(String),
    /// The backend was reached but refused or failed the request.
    #[error("generator provider error: {0}")]
    Provider(String),
}

/// Contract implemented by generator backends.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Identity reported on turns produced by this generator.
    fn identity(&self) -> GeneratorIdentity;

    /// Produces content and/or tool-call requests for a rendered request.
    async fn generate(&self, request: GeneratorRequest) -> Result<GeneratorReply, GeneratorError>;
}
