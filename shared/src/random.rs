//! Seeded random stream for world generation.
//!
//! Clients on any target rebuild the world from the seed, so every draw is
//! derived from `next_u32` of a ChaCha8 stream and never from
//! platform-width integer sampling.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[derive(Debug, Clone)]
pub struct WorldRng {
    inner: ChaCha8Rng,
}

impl WorldRng {
    pub fn new(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.inner.next_u32()
    }

    /// Uniform float in `[0, 1)` from the top 24 bits of one draw.
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 * (1.0 / 16_777_216.0)
    }

    /// Uniform integer in `[min, max]`.
    pub fn range_inclusive(&mut self, min: u32, max: u32) -> u32 {
        let span = u64::from(max.saturating_sub(min)) + 1;
        min + ((u64::from(self.next_u32()) * span) >> 32) as u32
    }

    /// Index in `[0, len)`. `len` must be non-zero.
    pub fn index(&mut self, len: usize) -> usize {
        ((u64::from(self.next_u32()) * len as u64) >> 32) as usize
    }
}
