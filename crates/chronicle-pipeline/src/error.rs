//! Pipeline error types.

use chronicle_core::error::EngineError;
use chronicle_core::generator::GeneratorError;
use thiserror::Error;

/// Errors that fail one pipeline turn.
///
/// A failed turn commits nothing; events from earlier turns stand.
#[derive(Debug, Error)]
pub enum TurnError {
    /// The generator kept requesting tools past the configured bound.
    #[error("tool loop exceeded {limit} iterations")]
    ToolLoopExceeded {
        /// The configured iteration bound.
        limit: usize,
    },

    /// The generator backend failed.
    #[error(transparent)]
    Generator(#[from] GeneratorError),

    /// The final commit was rejected by the engine.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A prompt template failed to parse or render.
    #[error("template error: {0}")]
    Template(String),

    /// The turn was requested for an actor that is not in the roster.
    #[error("unknown actor: {0}")]
    UnknownActor(String),

    /// No generator backend is wired for the actor's resolved profile.
    #[error("no generator backend for profile: {0}")]
    NoBackend(String),
}
