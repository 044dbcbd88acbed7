//! Test hook — a recording `TurnHook` implementation for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chronicle_core::diff::StateDiff;
use chronicle_core::event::Event;
use chronicle_core::hook::{HookError, TurnHook};
use serde_json::Value;
use uuid::Uuid;

/// A hook that records every event it observes and returns a fixed set of
/// diffs on each call.
#[derive(Debug, Default)]
pub struct RecordingHook {
    diffs: Vec<StateDiff>,
    observed: Mutex<Vec<Uuid>>,
}

impl RecordingHook {
    /// Create a hook that proposes no diffs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a hook that proposes the given diffs after every turn.
    #[must_use]
    pub fn with_diffs(diffs: Vec<StateDiff>) -> Self {
        Self {
            diffs,
            observed: Mutex::new(Vec::new()),
        }
    }

    /// Ids of the events observed so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn observed(&self) -> Vec<Uuid> {
        self.observed.lock().unwrap().clone()
    }
}

#[async_trait]
impl TurnHook for RecordingHook {
    fn name(&self) -> &str {
        "recording"
    }

    async fn after_turn(
        &self,
        _state: &Value,
        event: &Event,
    ) -> Result<Vec<StateDiff>, HookError> {
        self.observed.lock().unwrap().push(event.id);
        Ok(self.diffs.clone())
    }
}

/// A hook that always fails. Used to verify hook failures never fail the
/// turn that triggered them.
#[derive(Debug)]
pub struct FailingHook;

#[async_trait]
impl TurnHook for FailingHook {
    fn name(&self) -> &str {
        "failing"
    }

    async fn after_turn(
        &self,
        _state: &Value,
        _event: &Event,
    ) -> Result<Vec<StateDiff>, HookError> {
        Err(HookError {
            name: "failing".to_owned(),
            message: "scripted failure".to_owned(),
        })
    }
}
