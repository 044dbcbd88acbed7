//! End-of-turn hook contract.
//!
//! Hooks observe a committed turn and may propose follow-up diffs. The
//! orchestration driver commits those diffs as a separate event, so hook
//! effects are attributable and replay exactly like any other mutation.
//! Hooks never mutate state directly.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::diff::StateDiff;
use crate::event::Event;

/// A hook invocation failure. Non-fatal: the driver logs it and moves on.
#[derive(Debug, Error)]
#[error("hook '{name}' failed: {message}")]
pub struct HookError {
    /// The failing hook's name.
    pub name: String,
    /// What went wrong.
    pub message: String,
}

/// Observes completed turns and proposes follow-up diffs.
#[async_trait]
pub trait TurnHook: Send + Sync {
    /// Stable hook name, recorded on committed hook events.
    fn name(&self) -> &str;

    /// Called after each committed turn with the post-commit state tree
    /// and the committed event. Returned diffs are committed by the driver
    /// as one separate event; an empty list commits nothing.
    async fn after_turn(&self, state: &Value, event: &Event) -> Result<Vec<StateDiff>, HookError>;
}
