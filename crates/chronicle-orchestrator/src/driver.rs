//! The async cycle driver.
//!
//! Runs queued turns strictly sequentially: consult the controller, run one
//! pipeline turn, fire hooks, repeat. Pause, errors, and human boundaries
//! all take effect here, between turns; an in-flight turn always finishes.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chronicle_core::event::Event;
use chronicle_core::hook::TurnHook;
use chronicle_pipeline::TurnError;
use serde_json::Value;
use uuid::Uuid;

use crate::controller::{ControllerStatus, TurnController};

/// A committed turn, as the driver sees it: the event plus the post-commit
/// state tree handed to hooks.
#[derive(Debug)]
pub struct CompletedTurn {
    /// The committed message event.
    pub event: Event,
    /// The state tree after the commit.
    pub state: Value,
}

/// Executes turns on behalf of the driver.
///
/// Implemented by the session facade, which owns the event log, pipeline,
/// and per-actor generators. Keeps the driver free of engine locking.
#[async_trait]
pub trait TurnRunner: Send + Sync {
    /// Runs one complete pipeline turn for the actor.
    async fn run_turn(&self, actor_id: &str) -> Result<CompletedTurn, TurnError>;

    /// Commits diffs proposed by a hook as one separate event, attributed
    /// to the hook and linked to the turn that triggered it.
    async fn commit_hook(
        &self,
        hook_name: &str,
        source_event: Uuid,
        diffs: Vec<chronicle_core::diff::StateDiff>,
    ) -> Result<(), TurnError>;
}

/// Runs queued turns until the controller stops progression.
///
/// Terminates when the queue is exhausted (idle), a human boundary is hit
/// (waiting), a pause is observed, or a turn fails (error). Hook failures
/// are logged and never fail the turn that triggered them; a failed hook
/// commit is treated as a turn failure. Returns the final status.
pub async fn run_cycle(
    controller: &Mutex<TurnController>,
    hooks: &[Arc<dyn TurnHook>],
    runner: &dyn TurnRunner,
) -> ControllerStatus {
    loop {
        let Some(actor_id) = lock(controller).next_actor() else {
            break;
        };

        match runner.run_turn(&actor_id).await {
            Ok(turn) => {
                if let Err(err) = fire_hooks(hooks, runner, &turn).await {
                    lock(controller).mark_error(&actor_id, err.to_string());
                    break;
                }
                lock(controller).mark_completed(&actor_id);
            }
            Err(err) => {
                lock(controller).mark_error(&actor_id, err.to_string());
                break;
            }
        }
    }

    lock(controller).status()
}

/// Fires every hook for one completed turn. Hook execution failures are
/// non-fatal; commit failures propagate.
async fn fire_hooks(
    hooks: &[Arc<dyn TurnHook>],
    runner: &dyn TurnRunner,
    turn: &CompletedTurn,
) -> Result<(), TurnError> {
    for hook in hooks {
        match hook.after_turn(&turn.state, &turn.event).await {
            Ok(diffs) if diffs.is_empty() => {}
            Ok(diffs) => {
                runner.commit_hook(hook.name(), turn.event.id, diffs).await?;
            }
            Err(err) => {
                tracing::warn!(hook = hook.name(), %err, "hook failed, turn stands");
            }
        }
    }
    Ok(())
}

fn lock(controller: &Mutex<TurnController>) -> std::sync::MutexGuard<'_, TurnController> {
    controller.lock().expect("controller lock poisoned")
}
