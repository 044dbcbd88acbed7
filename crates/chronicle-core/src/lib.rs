//! Chronicle Core — shared domain abstractions.
//!
//! This crate defines the fundamental types that every other crate in the
//! session engine depends on: the path-addressed diff applier, the event
//! record, actor descriptors, and the clock/RNG abstractions used for
//! deterministic replay. It contains no infrastructure code.

pub mod actor;
pub mod clock;
pub mod diff;
pub mod error;
pub mod event;
pub mod generator;
pub mod hook;
pub mod rng;
