//! Chronicle Session — the facade that wires one session together.
//!
//! Owns the event log, tool executor, generation pipeline, profile
//! registry, and turn controller, and exposes the operation surface an
//! external transport layer calls: post a human message, run / pause /
//! resume progression, retry or skip a failed turn, inspect and rewrite
//! history.

pub mod config;
pub mod error;
pub mod session;

pub use config::SessionConfig;
pub use error::SessionError;
pub use session::{Session, SessionDeps};
