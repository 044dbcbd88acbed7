//! Chronicle Engine — the event-sourced session state engine.
//!
//! The [`EventLog`] owns the ordered sequence of events for one session and
//! the derived current-state [`Snapshot`]. The log is the single source of
//! truth: the snapshot is always discarded and rebuilt on any log mutation
//! (rollback, edit), and for any prefix of the log, replaying that prefix
//! from the initial state deterministically reproduces the snapshot.

pub mod log;
pub mod snapshot;

pub use log::EventLog;
pub use snapshot::Snapshot;
