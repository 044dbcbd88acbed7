//! The per-session event log.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chronicle_core::clock::Clock;
use chronicle_core::diff::StateDiff;
use chronicle_core::error::EngineError;
use chronicle_core::event::{Event, EventKind};
use serde_json::Value;
use uuid::Uuid;

use crate::snapshot::Snapshot;

/// The ordered event log and derived snapshot for one session.
///
/// All mutations go through [`append`](EventLog::append),
/// [`rollback_to`](EventLog::rollback_to), and
/// [`edit_event`](EventLog::edit_event). Callers that share a log across
/// tasks must serialize these calls (one per-session mutex); every method
/// leaves the log and snapshot in a consistent pre- or post-state, never
/// an intermediate one.
pub struct EventLog {
    session_id: Uuid,
    initial_state: Value,
    events: Vec<Event>,
    snapshot: Snapshot,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("session_id", &self.session_id)
            .field("events", &self.events.len())
            .finish_non_exhaustive()
    }
}

impl EventLog {
    /// Creates an empty log over the given initial state.
    #[must_use]
    pub fn new(session_id: Uuid, initial_state: Value, clock: Arc<dyn Clock>) -> Self {
        let snapshot = Snapshot::initial(initial_state.clone());
        Self {
            session_id,
            initial_state,
            events: Vec::new(),
            snapshot,
            clock,
        }
    }

    /// The session this log belongs to.
    #[must_use]
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Appends a new event, applying its diffs to the snapshot atomically.
    ///
    /// Diffs apply in list order against a working copy of the snapshot;
    /// if any diff fails the whole event is rejected and both the log and
    /// the snapshot are left untouched. Captured previous values are
    /// recorded on the committed event's diffs.
    ///
    /// # Errors
    ///
    /// Returns the first diff-application error encountered.
    pub fn append(
        &mut self,
        kind: EventKind,
        actor_id: Option<&str>,
        data: Value,
        diffs: Vec<StateDiff>,
    ) -> Result<&Event, EngineError> {
        let mut event = Event {
            id: Uuid::new_v4(),
            timestamp: self.clock.now(),
            kind,
            actor_id: actor_id.map(str::to_owned),
            data,
            diffs,
            metadata: serde_json::Map::new(),
        };

        let mut working = self.snapshot.clone();
        working.fold_event(&mut event)?;

        tracing::debug!(
            session_id = %self.session_id,
            event_id = %event.id,
            kind = ?event.kind,
            diffs = event.diffs.len(),
            "event committed"
        );

        self.snapshot = working;
        self.events.push(event);
        Ok(self.events.last().expect("event was just pushed"))
    }

    /// Returns the maintained snapshot. O(1); recomputed only by
    /// `rollback_to` and `edit_event`.
    #[must_use]
    pub fn current_state(&self) -> &Snapshot {
        &self.snapshot
    }

    /// The committed events, in commit order.
    #[must_use]
    pub fn history(&self) -> &[Event] {
        &self.events
    }

    /// Looks up an event by id.
    #[must_use]
    pub fn find(&self, event_id: Uuid) -> Option<&Event> {
        self.events.iter().find(|event| event.id == event_id)
    }

    /// Returns the events committed after the given event.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if the id is absent.
    pub fn events_since(&self, event_id: Uuid) -> Result<&[Event], EngineError> {
        let index = self.index_of(event_id)?;
        Ok(&self.events[index + 1..])
    }

    /// Truncates the log to (and including) the target event and rebuilds
    /// the snapshot by replaying from the initial state.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if the id is absent; the log is
    /// unchanged in that case.
    pub fn rollback_to(&mut self, event_id: Uuid) -> Result<&Snapshot, EngineError> {
        let index = self.index_of(event_id)?;
        let discarded = self.events.len() - (index + 1);
        self.events.truncate(index + 1);
        self.snapshot = Self::replay(&self.initial_state, &mut self.events)?;

        tracing::info!(
            session_id = %self.session_id,
            event_id = %event_id,
            discarded,
            "rolled back"
        );
        Ok(&self.snapshot)
    }

    /// Discards every event stamped after the target instant and rebuilds
    /// the snapshot by replaying from the initial state. The opening event
    /// is always retained, so a too-early target rewinds to the start of
    /// the session rather than before it.
    ///
    /// # Errors
    ///
    /// Propagates a replay failure; the retained prefix replayed once
    /// before, so this indicates log corruption.
    pub fn rollback_to_timestamp(
        &mut self,
        timestamp: DateTime<Utc>,
    ) -> Result<&Snapshot, EngineError> {
        if self.events.is_empty() {
            return Ok(&self.snapshot);
        }
        let keep = self
            .events
            .iter()
            .take_while(|event| event.timestamp <= timestamp)
            .count()
            .max(1);
        let discarded = self.events.len() - keep;
        self.events.truncate(keep);
        self.snapshot = Self::replay(&self.initial_state, &mut self.events)?;

        tracing::info!(
            session_id = %self.session_id,
            %timestamp,
            discarded,
            "rolled back to timestamp"
        );
        Ok(&self.snapshot)
    }

    /// Replaces the named event's payload in place and rebuilds the
    /// snapshot by full replay. Event count and ordering are preserved;
    /// this is the only operation that mutates a committed event.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] for an unknown id, or the replay
    /// error if the edited diffs no longer apply — in which case the log
    /// and snapshot are left exactly as they were.
    pub fn edit_event(
        &mut self,
        event_id: Uuid,
        new_data: Option<Value>,
        new_diffs: Option<Vec<StateDiff>>,
    ) -> Result<&Snapshot, EngineError> {
        let index = self.index_of(event_id)?;

        // Rebuild against an edited copy first, so a failing replay
        // leaves the committed log untouched.
        let mut edited = self.events.clone();
        if let Some(data) = new_data {
            edited[index].data = data;
        }
        if let Some(diffs) = new_diffs {
            edited[index].diffs = diffs;
        }
        let snapshot = Self::replay(&self.initial_state, &mut edited)?;

        tracing::info!(
            session_id = %self.session_id,
            event_id = %event_id,
            "event edited, snapshot rebuilt"
        );
        self.events = edited;
        self.snapshot = snapshot;
        Ok(&self.snapshot)
    }

    /// Checks that the maintained snapshot equals the fold of the history
    /// over the initial state.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ReplayInconsistency`] on mismatch. This is a
    /// fatal internal-consistency fault.
    pub fn verify_replay(&self) -> Result<(), EngineError> {
        let mut events = self.events.clone();
        let replayed = Self::replay(&self.initial_state, &mut events)
            .map_err(|err| EngineError::ReplayInconsistency(format!("history no longer replays: {err}")))?;
        if replayed == self.snapshot {
            Ok(())
        } else {
            Err(EngineError::ReplayInconsistency(
                "snapshot does not match fold of history".to_owned(),
            ))
        }
    }

    fn index_of(&self, event_id: Uuid) -> Result<usize, EngineError> {
        self.events
            .iter()
            .position(|event| event.id == event_id)
            .ok_or(EngineError::NotFound(event_id))
    }

    /// Replays all events over the initial state, re-capturing each diff's
    /// previous value.
    fn replay(initial_state: &Value, events: &mut [Event]) -> Result<Snapshot, EngineError> {
        let mut snapshot = Snapshot::initial(initial_state.clone());
        for event in events {
            snapshot.fold_event(event)?;
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_core::diff::DiffOp;
    use chronicle_test_support::{FixedClock, SteppingClock};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn new_log(initial: Value) -> EventLog {
        let clock = Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap(),
        ));
        EventLog::new(Uuid::new_v4(), initial, clock)
    }

    fn subtract_hp(amount: i64) -> StateDiff {
        StateDiff::new("hp", DiffOp::Subtract, json!(amount))
    }

    #[test]
    fn test_append_applies_diffs_and_records_previous_values() {
        let mut log = new_log(json!({ "hp": 20 }));

        let event = log
            .append(EventKind::StateUpdate, Some("gm"), json!({}), vec![subtract_hp(5)])
            .unwrap();

        assert_eq!(event.diffs[0].previous_value, Some(json!(20)));
        assert_eq!(log.current_state().tree, json!({ "hp": 15 }));
        assert_eq!(log.history().len(), 1);
    }

    #[test]
    fn test_append_with_failing_second_diff_leaves_snapshot_untouched() {
        let mut log = new_log(json!({ "hp": 20, "name": "ranger" }));

        let result = log.append(
            EventKind::StateUpdate,
            None,
            json!({}),
            vec![
                subtract_hp(5),
                StateDiff::new("name", DiffOp::Add, json!(1)),
            ],
        );

        assert!(matches!(result.unwrap_err(), EngineError::TypeMismatch { .. }));
        assert_eq!(log.current_state().tree, json!({ "hp": 20, "name": "ranger" }));
        assert!(log.history().is_empty());
        log.verify_replay().unwrap();
    }

    #[test]
    fn test_snapshot_matches_fold_after_every_operation() {
        let mut log = new_log(json!({ "hp": 20, "inventory": [] }));

        log.append(EventKind::StateUpdate, None, json!({}), vec![subtract_hp(3)])
            .unwrap();
        log.append(
            EventKind::StateUpdate,
            None,
            json!({}),
            vec![StateDiff::new("inventory", DiffOp::Append, json!("torch"))],
        )
        .unwrap();
        log.verify_replay().unwrap();

        let first_id = log.history()[0].id;
        log.rollback_to(first_id).unwrap();
        log.verify_replay().unwrap();

        log.edit_event(first_id, None, Some(vec![subtract_hp(7)])).unwrap();
        log.verify_replay().unwrap();
        assert_eq!(log.current_state().tree, json!({ "hp": 13, "inventory": [] }));
    }

    #[test]
    fn test_rollback_discards_subsequent_events() {
        let mut log = new_log(json!({ "hp": 20 }));
        log.append(EventKind::StateUpdate, None, json!({}), vec![subtract_hp(5)])
            .unwrap();
        let keep_id = log.history()[0].id;
        log.append(EventKind::StateUpdate, None, json!({}), vec![subtract_hp(5)])
            .unwrap();

        let snapshot = log.rollback_to(keep_id).unwrap();

        assert_eq!(snapshot.tree, json!({ "hp": 15 }));
        assert_eq!(log.history().len(), 1);
    }

    #[test]
    fn test_rollback_then_reapplying_events_reproduces_snapshot() {
        let mut log = new_log(json!({ "hp": 20 }));
        log.append(EventKind::StateUpdate, None, json!({}), vec![subtract_hp(5)])
            .unwrap();
        let first_id = log.history()[0].id;
        log.append(
            EventKind::Message,
            Some("gm"),
            json!({ "content": "Ouch." }),
            vec![subtract_hp(2)],
        )
        .unwrap();
        let before = log.current_state().clone();
        let replayed_event = log.history()[1].clone();

        log.rollback_to(first_id).unwrap();
        log.append(
            replayed_event.kind,
            replayed_event.actor_id.as_deref(),
            replayed_event.data.clone(),
            replayed_event.diffs.clone(),
        )
        .unwrap();

        assert_eq!(log.current_state().tree, before.tree);
        assert_eq!(log.current_state().messages, before.messages);
    }

    #[test]
    fn test_rollback_to_timestamp_discards_later_events() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap();
        let clock = Arc::new(SteppingClock::new(start, chrono::Duration::minutes(1)));
        let mut log = EventLog::new(Uuid::new_v4(), json!({ "hp": 20 }), clock);
        for _ in 0..3 {
            log.append(EventKind::StateUpdate, None, json!({}), vec![subtract_hp(5)])
                .unwrap();
        }

        // Target falls between the second and third events.
        let snapshot = log
            .rollback_to_timestamp(start + chrono::Duration::seconds(90))
            .unwrap();

        assert_eq!(snapshot.tree, json!({ "hp": 10 }));
        assert_eq!(log.history().len(), 2);
        log.verify_replay().unwrap();
    }

    #[test]
    fn test_rollback_to_timestamp_before_first_event_keeps_opening_event() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap();
        let clock = Arc::new(SteppingClock::new(start, chrono::Duration::minutes(1)));
        let mut log = EventLog::new(Uuid::new_v4(), json!({ "hp": 20 }), clock);
        log.append(EventKind::SessionStarted, None, json!({}), vec![])
            .unwrap();
        log.append(EventKind::StateUpdate, None, json!({}), vec![subtract_hp(5)])
            .unwrap();

        log.rollback_to_timestamp(start - chrono::Duration::hours(1))
            .unwrap();

        assert_eq!(log.history().len(), 1);
        assert_eq!(log.history()[0].kind, EventKind::SessionStarted);
        assert_eq!(log.current_state().tree, json!({ "hp": 20 }));
    }

    #[test]
    fn test_rollback_to_unknown_id_is_not_found() {
        let mut log = new_log(json!({}));
        let missing = Uuid::new_v4();

        let result = log.rollback_to(missing);

        assert!(matches!(result.unwrap_err(), EngineError::NotFound(id) if id == missing));
    }

    #[test]
    fn test_edit_event_preserves_count_and_order() {
        let mut log = new_log(json!({ "hp": 20 }));
        log.append(EventKind::StateUpdate, None, json!({}), vec![subtract_hp(5)])
            .unwrap();
        log.append(EventKind::StateUpdate, None, json!({}), vec![subtract_hp(1)])
            .unwrap();
        let ids: Vec<Uuid> = log.history().iter().map(|e| e.id).collect();

        log.edit_event(ids[0], Some(json!({ "edited": true })), Some(vec![subtract_hp(10)]))
            .unwrap();

        let after: Vec<Uuid> = log.history().iter().map(|e| e.id).collect();
        assert_eq!(ids, after);
        assert_eq!(log.history()[0].data, json!({ "edited": true }));
        assert_eq!(log.current_state().tree, json!({ "hp": 9 }));
        // The untouched second event re-captured its previous value.
        assert_eq!(log.history()[1].diffs[0].previous_value, Some(json!(10)));
    }

    #[test]
    fn test_edit_event_with_inapplicable_diffs_leaves_log_unchanged() {
        let mut log = new_log(json!({ "hp": 20 }));
        log.append(EventKind::StateUpdate, None, json!({}), vec![subtract_hp(5)])
            .unwrap();
        let id = log.history()[0].id;

        let result = log.edit_event(
            id,
            None,
            Some(vec![StateDiff::new("missing", DiffOp::Add, json!(1))]),
        );

        assert!(matches!(result.unwrap_err(), EngineError::PathError { .. }));
        assert_eq!(log.current_state().tree, json!({ "hp": 15 }));
        assert_eq!(log.history()[0].diffs[0].path, "hp");
        log.verify_replay().unwrap();
    }

    #[test]
    fn test_edit_event_unknown_id_is_not_found() {
        let mut log = new_log(json!({}));

        let result = log.edit_event(Uuid::new_v4(), Some(json!({})), None);

        assert!(matches!(result.unwrap_err(), EngineError::NotFound(_)));
    }

    #[test]
    fn test_events_since_returns_suffix() {
        let mut log = new_log(json!({ "hp": 20 }));
        log.append(EventKind::StateUpdate, None, json!({}), vec![subtract_hp(1)])
            .unwrap();
        let first_id = log.history()[0].id;
        log.append(EventKind::StateUpdate, None, json!({}), vec![subtract_hp(1)])
            .unwrap();

        let since = log.events_since(first_id).unwrap();

        assert_eq!(since.len(), 1);
        assert!(matches!(
            log.events_since(Uuid::new_v4()).unwrap_err(),
            EngineError::NotFound(_)
        ));
    }

    #[test]
    fn test_message_event_folds_into_messages() {
        let mut log = new_log(json!({}));

        log.append(
            EventKind::Message,
            Some("player"),
            json!({ "sender_id": "player", "content": "I open the door." }),
            vec![],
        )
        .unwrap();

        assert_eq!(log.current_state().messages.len(), 1);
    }
}
