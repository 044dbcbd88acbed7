//! Randomness seam for dice handlers.
//!
//! Anything that rolls draws through [`DeterministicRng`] and records the
//! outcome inside the event it commits, so replaying a log never re-rolls.
//! Tests inject scripted implementations in place of [`SystemRng`].

use rand::Rng;

/// Bounded random draws.
pub trait DeterministicRng: Send + Sync {
    /// A uniformly distributed `u32` in `[min, max]`, both ends inclusive.
    fn next_u32_range(&mut self, min: u32, max: u32) -> u32;
}

/// Draws from the thread-local `rand` generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRng;

impl DeterministicRng for SystemRng {
    fn next_u32_range(&mut self, min: u32, max: u32) -> u32 {
        rand::rng().random_range(min..=max)
    }
}
