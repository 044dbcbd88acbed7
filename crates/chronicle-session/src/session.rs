//! The session facade.
//!
//! Owns the event log, tool executor, pipeline, profile registry, and
//! controller for one session, and exposes the operation surface the
//! transport layer calls. One logical worker per session: the log sits
//! behind a `tokio` mutex held for the duration of each turn, the
//! controller behind a `std` mutex locked only between turns.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chronicle_core::actor::Actor;
use chronicle_core::clock::{Clock, SystemClock};
use chronicle_core::diff::{DiffOp, StateDiff};
use chronicle_core::error::EngineError;
use chronicle_core::event::{Event, EventKind};
use chronicle_core::generator::{ChatMessage, ChatRole, Generator};
use chronicle_core::hook::TurnHook;
use chronicle_core::rng::{DeterministicRng, SystemRng};
use chronicle_engine::{EventLog, Snapshot};
use chronicle_orchestrator::{
    CompletedTurn, ControllerState, ControllerStatus, TurnController, TurnRunner, run_cycle,
};
use chronicle_pipeline::{ProfileRegistry, TurnError, TurnPipeline};
use chronicle_tools::{DICE_LOG_PATH, ToolExecutor, ToolRegistry};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::SessionError;

/// Injected collaborators for one session.
///
/// Generator backends are keyed by profile id; the session resolves an
/// actor to a profile through its bindings and then to a backend here.
pub struct SessionDeps {
    /// Time source for event timestamps.
    pub clock: Arc<dyn Clock>,
    /// RNG handed to randomized tool handlers.
    pub rng: Box<dyn DeterministicRng>,
    /// Tool registry; defaults to the built-in handlers.
    pub registry: ToolRegistry,
    /// Generator backends by profile id.
    pub generators: HashMap<String, Arc<dyn Generator>>,
    /// End-of-turn hooks, fired in order.
    pub hooks: Vec<Arc<dyn TurnHook>>,
}

impl Default for SessionDeps {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            rng: Box::new(SystemRng),
            registry: chronicle_tools::builtin::builtin_registry(),
            generators: HashMap::new(),
            hooks: Vec::new(),
        }
    }
}

/// One running session.
pub struct Session {
    id: Uuid,
    name: String,
    actors: HashMap<String, Actor>,
    log: tokio::sync::Mutex<EventLog>,
    histories: tokio::sync::Mutex<HashMap<String, Vec<ChatMessage>>>,
    rng: tokio::sync::Mutex<Box<dyn DeterministicRng>>,
    executor: ToolExecutor,
    pipeline: TurnPipeline,
    profiles: Mutex<ProfileRegistry>,
    controller: Mutex<TurnController>,
    generators: HashMap<String, Arc<dyn Generator>>,
    hooks: Vec<Arc<dyn TurnHook>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("actors", &self.actors.len())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Creates a session, validating the configuration and committing the
    /// session-started event.
    ///
    /// # Errors
    ///
    /// [`SessionError::Config`] for a malformed turn order, unknown
    /// binding targets, or a template packaging defect;
    /// [`SessionError::Engine`] if the opening event cannot commit.
    pub fn new(config: SessionConfig, deps: SessionDeps) -> Result<Self, SessionError> {
        let controller = TurnController::new(
            &config.actors,
            config.turn_order.clone(),
            config.stop_before_human,
            config.continue_after_human,
        )
        .map_err(|err| SessionError::Config(err.to_string()))?;

        let mut profiles = ProfileRegistry::new();
        for profile in config.profiles {
            profiles.add(profile);
        }
        for (actor_id, profile_id) in &config.bindings {
            profiles
                .bind(actor_id, profile_id)
                .map_err(|err| SessionError::Config(err.to_string()))?;
        }

        let pipeline = TurnPipeline::new()
            .map_err(|err| SessionError::Config(err.to_string()))?
            .with_max_tool_iterations(config.max_tool_iterations);

        let id = Uuid::new_v4();
        let mut log = EventLog::new(id, config.initial_state, deps.clock);
        let actor_ids: Vec<&str> = config.actors.iter().map(|a| a.id.as_str()).collect();
        log.append(
            EventKind::SessionStarted,
            None,
            json!({ "name": config.name, "actors": actor_ids }),
            vec![],
        )?;

        let histories = config
            .actors
            .iter()
            .map(|a| (a.id.clone(), Vec::new()))
            .collect();
        let actors = config.actors.into_iter().map(|a| (a.id.clone(), a)).collect();

        tracing::info!(session_id = %id, name = %config.name, "session created");

        Ok(Self {
            id,
            name: config.name,
            actors,
            log: tokio::sync::Mutex::new(log),
            histories: tokio::sync::Mutex::new(histories),
            rng: tokio::sync::Mutex::new(deps.rng),
            executor: ToolExecutor::new(deps.registry),
            pipeline,
            profiles: Mutex::new(profiles),
            controller: Mutex::new(controller),
            generators: deps.generators,
            hooks: deps.hooks,
        })
    }

    /// Session id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Session display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current controller status.
    #[must_use]
    pub fn status(&self) -> ControllerStatus {
        self.lock_controller().status()
    }

    /// Clone of the current derived state.
    pub async fn current_state(&self) -> Snapshot {
        self.log.lock().await.current_state().clone()
    }

    /// Clone of the committed event history.
    pub async fn history(&self) -> Vec<Event> {
        self.log.lock().await.history().to_vec()
    }

    /// Commits a human actor's message and lets progression react to it.
    ///
    /// Runs a cycle when the controller decides one should follow (the
    /// continue-after-human flag); otherwise just returns the status.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownActor`] for an unknown sender;
    /// [`SessionError::Engine`] if the message event cannot commit.
    pub async fn post_human_message(
        &self,
        actor_id: &str,
        content: &str,
    ) -> Result<ControllerStatus, SessionError> {
        if !self.actors.contains_key(actor_id) {
            return Err(SessionError::UnknownActor(actor_id.to_owned()));
        }

        {
            let mut log = self.log.lock().await;
            log.append(
                EventKind::Message,
                Some(actor_id),
                json!({ "sender_id": actor_id, "content": content }),
                vec![],
            )?;
        }
        self.record_message(actor_id, content).await;

        let should_run = self.lock_controller().handle_human_message(actor_id);
        if should_run {
            Ok(run_cycle(&self.controller, &self.hooks, self).await)
        } else {
            Ok(self.status())
        }
    }

    /// Runs a progression cycle. When idle, a fresh cycle starts after
    /// `from_actor` when given, falling back to the last completed actor;
    /// a cycle already underway just continues.
    pub async fn run(&self, from_actor: Option<&str>) -> ControllerStatus {
        {
            let mut controller = self.lock_controller();
            if controller.state() == ControllerState::Idle {
                let last = controller.status().last_actor;
                controller.begin_cycle(from_actor.or(last.as_deref()));
            }
        }
        run_cycle(&self.controller, &self.hooks, self).await
    }

    /// Re-runs the failed turn.
    ///
    /// # Errors
    ///
    /// [`SessionError::Controller`] unless the session is in the error
    /// state.
    pub async fn retry(&self) -> Result<ControllerStatus, SessionError> {
        self.lock_controller().retry()?;
        Ok(run_cycle(&self.controller, &self.hooks, self).await)
    }

    /// Abandons the failed turn without committing anything for it and
    /// continues the cycle.
    ///
    /// # Errors
    ///
    /// [`SessionError::Controller`] unless the session is in the error
    /// state.
    pub async fn skip(&self) -> Result<ControllerStatus, SessionError> {
        self.lock_controller().skip()?;
        Ok(run_cycle(&self.controller, &self.hooks, self).await)
    }

    /// Suspends progression at the next turn boundary.
    ///
    /// # Errors
    ///
    /// [`SessionError::Controller`] when already paused or errored.
    pub fn pause(&self) -> Result<ControllerStatus, SessionError> {
        self.lock_controller().pause()?;
        Ok(self.status())
    }

    /// Resumes a paused session and continues the cycle.
    ///
    /// # Errors
    ///
    /// [`SessionError::Controller`] unless paused.
    pub async fn resume(&self) -> Result<ControllerStatus, SessionError> {
        self.lock_controller().resume()?;
        Ok(run_cycle(&self.controller, &self.hooks, self).await)
    }

    /// Rolls the log back to (and including) the target event and rebuilds
    /// the conversation histories from the surviving messages.
    ///
    /// # Errors
    ///
    /// [`SessionError::Engine`] for an unknown event id.
    pub async fn rollback_to(&self, event_id: Uuid) -> Result<Snapshot, SessionError> {
        let snapshot = {
            let mut log = self.log.lock().await;
            log.rollback_to(event_id)?.clone()
        };
        self.rebuild_histories(&snapshot).await;
        Ok(snapshot)
    }

    /// Edits a committed event's payload and replays the log.
    ///
    /// # Errors
    ///
    /// [`SessionError::Engine`] for an unknown id or diffs that no longer
    /// apply; the log is unchanged on failure.
    pub async fn edit_event(
        &self,
        event_id: Uuid,
        new_data: Option<Value>,
        new_diffs: Option<Vec<StateDiff>>,
    ) -> Result<Snapshot, SessionError> {
        let snapshot = {
            let mut log = self.log.lock().await;
            log.edit_event(event_id, new_data, new_diffs)?.clone()
        };
        self.rebuild_histories(&snapshot).await;
        Ok(snapshot)
    }

    /// Commits a free-form action event for an actor, applying any proposed
    /// diffs atomically with it. For out-of-band moves that bypass the
    /// generation pipeline.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownActor`] for an unknown actor;
    /// [`SessionError::Engine`] if a diff fails to apply (nothing commits).
    pub async fn perform_action(
        &self,
        actor_id: &str,
        action_type: &str,
        data: Value,
        diffs: Vec<StateDiff>,
    ) -> Result<Snapshot, SessionError> {
        if !self.actors.contains_key(actor_id) {
            return Err(SessionError::UnknownActor(actor_id.to_owned()));
        }
        let mut payload = serde_json::Map::new();
        payload.insert("action_type".to_owned(), json!(action_type));
        if let Value::Object(extra) = data {
            payload.extend(extra);
        }

        let mut log = self.log.lock().await;
        log.append(EventKind::Action, Some(actor_id), Value::Object(payload), diffs)?;
        Ok(log.current_state().clone())
    }

    /// Rolls dice outside a generated turn and commits the outcome as its
    /// own event. The outcome also lands in the state tree's dice log,
    /// exactly like tool-driven rolls, so replay never re-rolls.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownActor`] for an unknown roller;
    /// [`SessionError::InvalidRequest`] for a bad count or die size;
    /// [`SessionError::Engine`] if the event cannot commit.
    pub async fn roll_dice(
        &self,
        actor_id: &str,
        count: u32,
        sides: u32,
        modifier: i64,
        reason: Option<&str>,
    ) -> Result<Event, SessionError> {
        if !self.actors.contains_key(actor_id) {
            return Err(SessionError::UnknownActor(actor_id.to_owned()));
        }
        if sides < 2 {
            return Err(SessionError::InvalidRequest(
                "sides must be at least 2".to_owned(),
            ));
        }
        if count == 0 || count > 100 {
            return Err(SessionError::InvalidRequest(
                "count must be between 1 and 100".to_owned(),
            ));
        }

        let rolls: Vec<u32> = {
            let mut rng = self.rng.lock().await;
            (0..count).map(|_| rng.next_u32_range(1, sides)).collect()
        };
        let total: i64 = rolls.iter().map(|roll| i64::from(*roll)).sum();
        let outcome = json!({
            "roller": actor_id,
            "count": count,
            "sides": sides,
            "rolls": rolls,
            "modifier": modifier,
            "total": total,
            "final": total + modifier,
            "reason": reason,
        });

        let mut log = self.log.lock().await;
        let event = log.append(
            EventKind::DiceRoll,
            Some(actor_id),
            outcome.clone(),
            vec![StateDiff::new(DICE_LOG_PATH, DiffOp::Append, outcome)],
        )?;
        Ok(event.clone())
    }

    /// Commits a single state mutation as its own event.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownActor`] when the acting actor is named but
    /// unknown; [`SessionError::Engine`] if the diff fails to apply.
    pub async fn update_state(
        &self,
        actor_id: Option<&str>,
        path: &str,
        op: DiffOp,
        value: Value,
    ) -> Result<Snapshot, SessionError> {
        if let Some(actor_id) = actor_id
            && !self.actors.contains_key(actor_id)
        {
            return Err(SessionError::UnknownActor(actor_id.to_owned()));
        }
        let diff = StateDiff::new(path, op, value.clone());
        let data = json!({ "path": path, "op": op, "value": value });

        let mut log = self.log.lock().await;
        log.append(EventKind::StateUpdate, actor_id, data, vec![diff])?;
        Ok(log.current_state().clone())
    }

    /// Rolls the log back to the last event stamped at or before the given
    /// instant and rebuilds the conversation histories.
    ///
    /// # Errors
    ///
    /// [`SessionError::Engine`] if the retained prefix fails to replay.
    pub async fn rollback_to_timestamp(
        &self,
        timestamp: DateTime<Utc>,
    ) -> Result<Snapshot, SessionError> {
        let snapshot = {
            let mut log = self.log.lock().await;
            log.rollback_to_timestamp(timestamp)?.clone()
        };
        self.rebuild_histories(&snapshot).await;
        Ok(snapshot)
    }

    /// Binds an actor to a generator profile.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownActor`] or [`SessionError::Profile`] for an
    /// unknown profile.
    pub fn bind_profile(&self, actor_id: &str, profile_id: &str) -> Result<(), SessionError> {
        if !self.actors.contains_key(actor_id) {
            return Err(SessionError::UnknownActor(actor_id.to_owned()));
        }
        self.lock_profiles().bind(actor_id, profile_id)?;
        Ok(())
    }

    /// The profile id an actor resolves to, if any.
    #[must_use]
    pub fn profile_for(&self, actor_id: &str) -> Option<String> {
        self.lock_profiles().resolve(actor_id).map(|p| p.id.clone())
    }

    /// Records one message into every actor's conversation history: the
    /// sender sees it as its own output, everyone else as input.
    async fn record_message(&self, sender_id: &str, content: &str) {
        let mut histories = self.histories.lock().await;
        for (actor_id, history) in histories.iter_mut() {
            if actor_id == sender_id {
                history.push(ChatMessage::new(ChatRole::Assistant, content));
            } else {
                history.push(ChatMessage::new(
                    ChatRole::User,
                    format!("[{sender_id}] {content}"),
                ));
            }
        }
    }

    /// Rebuilds every conversation history from the snapshot's messages,
    /// after a rollback or edit invalidated the incremental ones.
    async fn rebuild_histories(&self, snapshot: &Snapshot) {
        let mut histories = self.histories.lock().await;
        for history in histories.values_mut() {
            history.clear();
        }
        drop(histories);

        for message in &snapshot.messages {
            let sender = message.get("sender_id").and_then(Value::as_str);
            let content = message.get("content").and_then(Value::as_str);
            if let (Some(sender), Some(content)) = (sender, content) {
                self.record_message(sender, content).await;
            }
        }
    }

    fn lock_controller(&self) -> MutexGuard<'_, TurnController> {
        self.controller.lock().expect("controller lock poisoned")
    }

    fn lock_profiles(&self) -> MutexGuard<'_, ProfileRegistry> {
        self.profiles.lock().expect("profile lock poisoned")
    }
}

#[async_trait]
impl TurnRunner for Session {
    async fn run_turn(&self, actor_id: &str) -> Result<CompletedTurn, TurnError> {
        let actor = self
            .actors
            .get(actor_id)
            .ok_or_else(|| TurnError::UnknownActor(actor_id.to_owned()))?;
        let generator = {
            let profiles = self.lock_profiles();
            let profile = profiles
                .resolve(actor_id)
                .ok_or_else(|| TurnError::NoBackend(format!("no profile for {actor_id}")))?;
            self.generators
                .get(&profile.id)
                .cloned()
                .ok_or_else(|| TurnError::NoBackend(profile.id.clone()))?
        };
        let history = self
            .histories
            .lock()
            .await
            .get(actor_id)
            .cloned()
            .unwrap_or_default();

        let outcome = {
            let mut log = self.log.lock().await;
            let mut rng = self.rng.lock().await;

            // Frame the turn so the snapshot's turn bookkeeping is live
            // while the pipeline renders and runs.
            let prior_id = log.history().last().map(|event| event.id);
            let turn_number = log.current_state().current_turn + 1;
            log.append(
                EventKind::TurnStarted,
                Some(actor_id),
                json!({ "turn_number": turn_number }),
                vec![],
            )?;

            let result = self
                .pipeline
                .run_turn(
                    generator.as_ref(),
                    &self.executor,
                    &mut log,
                    actor,
                    &history,
                    rng.as_mut(),
                )
                .await;
            match result {
                Ok(outcome) => {
                    log.append(
                        EventKind::TurnEnded,
                        Some(actor_id),
                        json!({ "turn_number": turn_number }),
                        vec![],
                    )?;
                    outcome
                }
                Err(err) => {
                    // A failed turn leaves no trace: unwind the start marker.
                    if let Some(prior_id) = prior_id
                        && log.rollback_to(prior_id).is_err()
                    {
                        tracing::warn!(
                            session_id = %self.id,
                            actor_id,
                            "could not unwind turn marker after failed turn"
                        );
                    }
                    return Err(err);
                }
            }
        };

        if let Some(content) = &outcome.content {
            self.record_message(actor_id, content).await;
        }

        let log = self.log.lock().await;
        let event = log
            .find(outcome.event_id)
            .cloned()
            .ok_or(EngineError::NotFound(outcome.event_id))?;
        let state = log.current_state().tree.clone();
        Ok(CompletedTurn { event, state })
    }

    async fn commit_hook(
        &self,
        hook_name: &str,
        source_event: Uuid,
        diffs: Vec<StateDiff>,
    ) -> Result<(), TurnError> {
        let mut log = self.log.lock().await;
        log.append(
            EventKind::HookApplied,
            None,
            json!({ "hook": hook_name, "source_event": source_event }),
            diffs,
        )?;
        Ok(())
    }
}
