//! Scripted [`DeterministicRng`] implementations for tests.

use chronicle_core::rng::DeterministicRng;

/// Clamps every draw to the lower bound. For tests where a roll happens but
/// its value does not matter.
#[derive(Debug)]
pub struct MockRng;

impl DeterministicRng for MockRng {
    fn next_u32_range(&mut self, min: u32, _max: u32) -> u32 {
        min
    }
}

/// Plays back a fixed list of draws in order and panics once it runs out.
/// For tests that script exact dice outcomes.
#[derive(Debug)]
pub struct SequenceRng {
    values: Vec<u32>,
    index: usize,
}

impl SequenceRng {
    /// Creates an RNG that will yield `values` front to back.
    #[must_use]
    pub fn new(values: Vec<u32>) -> Self {
        Self { values, index: 0 }
    }
}

impl DeterministicRng for SequenceRng {
    fn next_u32_range(&mut self, _min: u32, _max: u32) -> u32 {
        let val = self.values[self.index];
        self.index += 1;
        val
    }
}
