//! Chronicle Tools — registry and executor for generator tool calls.
//!
//! Handlers never mutate session state. They read it through the execution
//! context and return proposed diffs, which the generation pipeline forwards
//! to the state engine for atomic commit. Handlers are deterministic given
//! identical arguments and context, except for explicitly randomized ones
//! (dice), which record their random outcome inside the returned diffs so
//! replay of the committed event stays deterministic.

pub mod builtin;
pub mod executor;
pub mod registry;

pub use builtin::DICE_LOG_PATH;
pub use executor::{ToolContext, ToolError, ToolExecutor, ToolOutput, ToolResult};
pub use registry::{ToolHandler, ToolRegistry};
