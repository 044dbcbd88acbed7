//! Chronicle Pipeline — renders context, invokes the generator, runs the
//! bounded tool loop, and commits one message event per completed turn.
//!
//! The pipeline never mutates state directly: tool handlers propose diffs,
//! and the pipeline hands them to the event log in a single atomic commit.
//! A turn that fails anywhere commits nothing.

pub mod error;
pub mod profile;
pub mod render;
pub mod turn;

pub use error::TurnError;
pub use profile::{GeneratorProfile, ProfileError, ProfileRegistry};
pub use render::ContextRenderer;
pub use turn::{DEFAULT_MAX_TOOL_ITERATIONS, TurnOutcome, TurnPipeline};
