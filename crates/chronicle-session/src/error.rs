//! Session-level errors.

use chronicle_core::error::EngineError;
use chronicle_orchestrator::ControllerError;
use chronicle_pipeline::{ProfileError, TurnError};
use thiserror::Error;

/// Errors surfaced by the session facade.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session configuration is malformed (caught at startup).
    #[error("invalid session configuration: {0}")]
    Config(String),

    /// The named actor is not part of the session.
    #[error("unknown actor: {0}")]
    UnknownActor(String),

    /// A direct operation carried arguments that fail validation.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The operation is not valid in the controller's current state.
    #[error(transparent)]
    Controller(#[from] ControllerError),

    /// A turn failed; the controller holds the error state.
    #[error(transparent)]
    Turn(#[from] TurnError),

    /// The engine rejected a log operation.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A profile lookup or binding failed.
    #[error(transparent)]
    Profile(#[from] ProfileError),
}
