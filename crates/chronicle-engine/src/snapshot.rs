//! Derived session state.

use chrono::{DateTime, Utc};
use chronicle_core::diff::apply_diff;
use chronicle_core::error::EngineError;
use chronicle_core::event::{Event, EventKind};
use serde::Serialize;
use serde_json::Value;

/// The derived, recomputable session state.
///
/// Never the source of truth: equal to the initial state folded with the
/// diffs of every committed event, in log order. Message events additionally
/// append their payload to `messages`; turn-start events advance the turn
/// bookkeeping and turn-end events clear the active actor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// The nested state tree addressed by dot-paths.
    pub tree: Value,
    /// Message payloads in commit order.
    pub messages: Vec<Value>,
    /// Current turn number.
    pub current_turn: u64,
    /// The actor whose turn is active, if any.
    pub current_actor: Option<String>,
    /// Timestamp of the last applied event.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    /// Creates a snapshot of the initial state, before any events.
    #[must_use]
    pub fn initial(initial_state: Value) -> Self {
        Self {
            tree: initial_state,
            messages: Vec::new(),
            current_turn: 0,
            current_actor: None,
            updated_at: None,
        }
    }

    /// Folds one event into the snapshot, capturing each diff's previous
    /// value on the event as it applies.
    ///
    /// Diffs apply in list order. On failure the snapshot may be partially
    /// updated; callers that need atomicity fold into a working copy and
    /// swap on success.
    ///
    /// # Errors
    ///
    /// Propagates diff-application errors from the applier.
    pub fn fold_event(&mut self, event: &mut Event) -> Result<(), EngineError> {
        for diff in &mut event.diffs {
            diff.previous_value = apply_diff(&mut self.tree, diff)?;
        }

        match event.kind {
            EventKind::Message => self.messages.push(event.data.clone()),
            EventKind::TurnStarted => {
                if let Some(turn) = event.data.get("turn_number").and_then(Value::as_u64) {
                    self.current_turn = turn;
                }
                self.current_actor.clone_from(&event.actor_id);
            }
            EventKind::TurnEnded => self.current_actor = None,
            _ => {}
        }

        self.updated_at = Some(event.timestamp);
        Ok(())
    }
}
