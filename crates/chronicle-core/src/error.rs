//! Engine error types.

use thiserror::Error;
use uuid::Uuid;

use crate::diff::DiffOp;

/// Errors produced by the diff applier and the event log.
///
/// Diff-application errors (`PathError`, `TypeMismatch`) are local to one
/// event: the engine rejects the whole event atomically and the snapshot
/// is left untouched.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A path segment was missing or could not be traversed.
    #[error("path error at '{path}': {reason}")]
    PathError {
        /// The dot-addressed path that failed.
        path: String,
        /// Why traversal failed.
        reason: String,
    },

    /// The addressed value's type does not support the requested operation.
    #[error("type mismatch at '{path}': {op} requires {expected}")]
    TypeMismatch {
        /// The dot-addressed path that failed.
        path: String,
        /// The operation that was attempted.
        op: DiffOp,
        /// What the operation required.
        expected: &'static str,
    },

    /// An event id was not found in the log.
    #[error("event not found: {0}")]
    NotFound(Uuid),

    /// The maintained snapshot no longer matches the fold of the history.
    /// This is a fatal internal-consistency fault, not user-recoverable.
    #[error("replay inconsistency: {0}")]
    ReplayInconsistency(String),
}
