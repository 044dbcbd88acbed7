//! Shared test mocks and utilities for the Chronicle session engine.

mod clock;
mod generator;
mod hook;
mod rng;

pub use clock::{FixedClock, SteppingClock};
pub use generator::{FailingGenerator, LoopingGenerator, ScriptedGenerator};
pub use hook::{FailingHook, RecordingHook};
pub use rng::{MockRng, SequenceRng};
