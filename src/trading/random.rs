use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::TimeBounds;

/// Source of the random choices a cycle makes: leg order, side assignment,
/// hold times and delays.
pub trait RandomSource: Send + Sync {
    fn coin_flip(&mut self) -> bool;

    /// Whole-second duration drawn uniformly from `bounds`, inclusive.
    fn duration_within(&mut self, bounds: TimeBounds) -> Duration;
}

/// Entropy-seeded generator used outside tests.
pub struct ThreadRandom(StdRng);

impl ThreadRandom {
    pub fn new() -> Self {
        Self(StdRng::from_entropy())
    }
}

impl Default for ThreadRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for ThreadRandom {
    fn coin_flip(&mut self) -> bool {
        self.0.gen_bool(0.5)
    }

    fn duration_within(&mut self, bounds: TimeBounds) -> Duration {
        let min = bounds.min.as_secs();
        let max = bounds.max.as_secs().max(min);
        Duration::from_secs(self.0.gen_range(min..=max))
    }
}
