//! The turn-orchestration state machine.
//!
//! Pure and synchronous: the controller decides who acts next and tracks
//! progression state; it never touches the event log. The async driver in
//! [`crate::driver`] consults it between turns, so every transition happens
//! at a turn boundary.

use std::collections::{HashSet, VecDeque};

use chronicle_core::actor::Actor;
use serde::Serialize;
use thiserror::Error;

/// Controller progression state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    /// No cycle in progress.
    Idle,
    /// A cycle is running; generated actors take turns in queue order.
    Progressing,
    /// Progression halted at a human actor's turn.
    WaitingForActor,
    /// Progression suspended by an explicit pause.
    Paused,
    /// The last turn failed; awaiting retry or skip.
    Error,
}

/// The recorded failure when the controller is in the error state.
#[derive(Debug, Clone, Serialize)]
pub struct ControllerFault {
    /// The actor whose turn failed.
    pub actor_id: String,
    /// Failure description, taken from the pipeline error.
    pub message: String,
}

/// Point-in-time view of the controller, for the status surface.
#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatus {
    /// Current progression state.
    pub state: ControllerState,
    /// Actors still queued in this cycle, front first.
    pub queue: Vec<String>,
    /// Actors that completed a turn in this cycle, in order.
    pub completed: Vec<String>,
    /// The recorded failure, when in the error state.
    pub error: Option<ControllerFault>,
    /// The actor that most recently completed a turn.
    pub last_actor: Option<String>,
}

/// Errors from controller construction and invalid transitions.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// The turn order names an actor that is not in the roster.
    #[error("turn order references unknown actor: {0}")]
    UnknownActor(String),

    /// The turn order is empty.
    #[error("turn order must not be empty")]
    EmptyTurnOrder,

    /// The requested operation is not valid in the current state.
    #[error("cannot {action} while {state:?}")]
    InvalidTransition {
        /// The attempted operation.
        action: &'static str,
        /// The state it was attempted in.
        state: ControllerState,
    },
}

/// Decides which actor acts next and tracks cycle progression.
///
/// The failing or pending actor always stays at the queue front: the driver
/// peeks via [`next_actor`](TurnController::next_actor) and the front is
/// only consumed by [`mark_completed`](TurnController::mark_completed),
/// [`skip`](TurnController::skip), or
/// [`handle_human_message`](TurnController::handle_human_message).
#[derive(Debug)]
pub struct TurnController {
    turn_order: Vec<String>,
    humans: HashSet<String>,
    stop_before_human: bool,
    continue_after_human: bool,
    state: ControllerState,
    queue: VecDeque<String>,
    completed: Vec<String>,
    error: Option<ControllerFault>,
    last_actor: Option<String>,
}

impl TurnController {
    /// Creates a controller over the given roster and turn order.
    ///
    /// # Errors
    ///
    /// [`ControllerError::EmptyTurnOrder`] for an empty order, and
    /// [`ControllerError::UnknownActor`] if the order names an actor
    /// missing from the roster.
    pub fn new(
        actors: &[Actor],
        turn_order: Vec<String>,
        stop_before_human: bool,
        continue_after_human: bool,
    ) -> Result<Self, ControllerError> {
        if turn_order.is_empty() {
            return Err(ControllerError::EmptyTurnOrder);
        }
        let roster: HashSet<&str> = actors.iter().map(|a| a.id.as_str()).collect();
        for id in &turn_order {
            if !roster.contains(id.as_str()) {
                return Err(ControllerError::UnknownActor(id.clone()));
            }
        }
        let humans = actors
            .iter()
            .filter(|a| a.is_human())
            .map(|a| a.id.clone())
            .collect();

        Ok(Self {
            turn_order,
            humans,
            stop_before_human,
            continue_after_human,
            state: ControllerState::Idle,
            queue: VecDeque::new(),
            completed: Vec::new(),
            error: None,
            last_actor: None,
        })
    }

    /// Current progression state.
    #[must_use]
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Snapshot of the controller for the status surface.
    #[must_use]
    pub fn status(&self) -> ControllerStatus {
        ControllerStatus {
            state: self.state,
            queue: self.queue.iter().cloned().collect(),
            completed: self.completed.clone(),
            error: self.error.clone(),
            last_actor: self.last_actor.clone(),
        }
    }

    /// Starts a new cycle: one full pass over the turn order, beginning
    /// after `from_actor` and wrapping around to end with it. With no
    /// starting actor the queue is the turn order as written.
    pub fn begin_cycle(&mut self, from_actor: Option<&str>) {
        let start = from_actor
            .and_then(|id| self.turn_order.iter().position(|o| o == id))
            .map_or(0, |i| (i + 1) % self.turn_order.len());

        self.queue = self
            .turn_order
            .iter()
            .cycle()
            .skip(start)
            .take(self.turn_order.len())
            .cloned()
            .collect();
        self.completed.clear();
        self.error = None;
        self.state = ControllerState::Progressing;

        tracing::debug!(queue = ?self.queue, "cycle started");
    }

    /// The actor whose turn the driver should run next.
    ///
    /// Returns `None` and transitions when the cycle cannot continue: queue
    /// exhausted (to idle) or a human at the front with stop-before-human
    /// set (to waiting). The returned actor stays at the queue front until
    /// its turn resolves.
    pub fn next_actor(&mut self) -> Option<String> {
        if self.state != ControllerState::Progressing {
            return None;
        }
        match self.queue.front() {
            None => {
                self.state = ControllerState::Idle;
                None
            }
            Some(id) if self.stop_before_human && self.humans.contains(id) => {
                tracing::debug!(actor_id = %id, "halting before human actor");
                self.state = ControllerState::WaitingForActor;
                None
            }
            Some(id) => Some(id.clone()),
        }
    }

    /// Records a completed turn for the actor at the queue front.
    pub fn mark_completed(&mut self, actor_id: &str) {
        if self.queue.front().is_some_and(|front| front == actor_id) {
            self.queue.pop_front();
        }
        self.completed.push(actor_id.to_owned());
        self.last_actor = Some(actor_id.to_owned());
        if self.state == ControllerState::Progressing && self.queue.is_empty() {
            self.state = ControllerState::Idle;
            tracing::debug!(completed = self.completed.len(), "cycle complete");
        }
    }

    /// Records a failed turn. The failing actor stays at the queue front
    /// so retry re-runs it.
    pub fn mark_error(&mut self, actor_id: &str, message: impl Into<String>) {
        let fault = ControllerFault {
            actor_id: actor_id.to_owned(),
            message: message.into(),
        };
        tracing::warn!(actor_id = %fault.actor_id, message = %fault.message, "turn failed");
        self.error = Some(fault);
        self.state = ControllerState::Error;
    }

    /// Re-runs the failed turn: clears the fault and resumes progression
    /// with the same actor at the queue front.
    ///
    /// # Errors
    ///
    /// [`ControllerError::InvalidTransition`] unless in the error state.
    pub fn retry(&mut self) -> Result<(), ControllerError> {
        if self.state != ControllerState::Error {
            return Err(ControllerError::InvalidTransition {
                action: "retry",
                state: self.state,
            });
        }
        self.error = None;
        self.state = ControllerState::Progressing;
        Ok(())
    }

    /// Abandons the failed turn: drops the failing actor from the queue
    /// without committing any event and resumes progression.
    ///
    /// # Errors
    ///
    /// [`ControllerError::InvalidTransition`] unless in the error state.
    pub fn skip(&mut self) -> Result<(), ControllerError> {
        if self.state != ControllerState::Error {
            return Err(ControllerError::InvalidTransition {
                action: "skip",
                state: self.state,
            });
        }
        if let Some(skipped) = self.queue.pop_front() {
            tracing::info!(actor_id = %skipped, "turn skipped");
        }
        self.error = None;
        self.state = if self.queue.is_empty() {
            ControllerState::Idle
        } else {
            ControllerState::Progressing
        };
        Ok(())
    }

    /// Suspends progression. Observed by the driver at the next turn
    /// boundary; an in-flight turn finishes first.
    ///
    /// # Errors
    ///
    /// [`ControllerError::InvalidTransition`] when already paused or in
    /// the error state.
    pub fn pause(&mut self) -> Result<(), ControllerError> {
        match self.state {
            ControllerState::Paused | ControllerState::Error => {
                Err(ControllerError::InvalidTransition {
                    action: "pause",
                    state: self.state,
                })
            }
            _ => {
                self.state = ControllerState::Paused;
                Ok(())
            }
        }
    }

    /// Resumes a paused controller: progressing when actors remain queued,
    /// idle otherwise.
    ///
    /// # Errors
    ///
    /// [`ControllerError::InvalidTransition`] unless paused.
    pub fn resume(&mut self) -> Result<(), ControllerError> {
        if self.state != ControllerState::Paused {
            return Err(ControllerError::InvalidTransition {
                action: "resume",
                state: self.state,
            });
        }
        self.state = if self.queue.is_empty() {
            ControllerState::Idle
        } else {
            ControllerState::Progressing
        };
        Ok(())
    }

    /// Records a human actor's out-of-band message as their turn.
    ///
    /// Waiting for this actor: consumes their queue slot and, with
    /// continue-after-human set, resumes progression over the rest of the
    /// queue. Idle with continue-after-human set: starts a fresh cycle
    /// from the actor. Returns whether the driver should run a cycle now.
    pub fn handle_human_message(&mut self, actor_id: &str) -> bool {
        match self.state {
            ControllerState::WaitingForActor
                if self.queue.front().is_some_and(|front| front == actor_id) =>
            {
                self.queue.pop_front();
                self.completed.push(actor_id.to_owned());
                self.last_actor = Some(actor_id.to_owned());
                if self.continue_after_human && !self.queue.is_empty() {
                    self.state = ControllerState::Progressing;
                    true
                } else {
                    self.state = ControllerState::Idle;
                    false
                }
            }
            ControllerState::Idle if self.continue_after_human => {
                self.begin_cycle(Some(actor_id));
                self.last_actor = Some(actor_id.to_owned());
                true
            }
            _ => {
                self.last_actor = Some(actor_id.to_owned());
                false
            }
        }
    }
}
