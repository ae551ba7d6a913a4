//! Injectable randomness for the reference analyzer.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

/// Source of uniform draws in `[0, 1)`.
pub trait OutcomeSource: Send + Sync {
    fn draw(&self) -> f64;
}

/// `StdRng`-backed source. Seeded runs are reproducible.
pub struct SeededOutcomes {
    rng: Mutex<StdRng>,
}

impl SeededOutcomes {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Seeded when `seed` is set, otherwise entropy.
    pub fn from_config(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_entropy, Self::new)
    }
}

impl OutcomeSource for SeededOutcomes {
    fn draw(&self) -> f64 {
        match self.rng.lock() {
            Ok(mut rng) => rng.gen::<f64>(),
            Err(poisoned) => poisoned.into_inner().gen::<f64>(),
        }
    }
}

/// Always returns the same value. Used by tests and demos.
#[derive(Debug, Clone, Copy)]
pub struct FixedOutcome(pub f64);

impl OutcomeSource for FixedOutcome {
    fn draw(&self) -> f64 {
        self.0
    }
}
