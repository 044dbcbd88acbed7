//! Session event record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::diff::StateDiff;

/// The kind of a session event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The session was created and its initial state established.
    SessionStarted,
    /// A new turn began for an actor.
    TurnStarted,
    /// The current turn ended.
    TurnEnded,
    /// A declared game action.
    Action,
    /// A dice roll with its recorded outcome.
    DiceRoll,
    /// A direct state mutation.
    StateUpdate,
    /// A chat message from an actor (human-authored or generated).
    Message,
    /// Diffs proposed by the end-of-turn hook.
    HookApplied,
}

/// An immutable record of one committed state mutation.
///
/// Events are created only by the event log when committing a mutation.
/// After creation an event is never mutated, except through the log's
/// explicit edit operation which replaces `data`/`diffs` and triggers a
/// full replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier.
    pub id: Uuid,
    /// Timestamp of event creation.
    pub timestamp: DateTime<Utc>,
    /// Event kind.
    pub kind: EventKind,
    /// The actor that triggered the event, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    /// Event-specific payload, opaque to the engine.
    pub data: Value,
    /// State changes committed by this event, in application order.
    pub diffs: Vec<StateDiff>,
    /// Additional metadata.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, Value>,
}
