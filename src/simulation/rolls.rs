use std::collections::VecDeque;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Uniform [0,1) draws consumed by the stochastic steps of a tick.
pub trait RollSource {
    fn roll(&mut self) -> f64;
}

/// Default source for callers that do not pin their draws.
#[derive(Debug, Clone)]
pub struct SeededRolls {
    rng: ChaCha8Rng,
}

impl SeededRolls {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl RollSource for SeededRolls {
    fn roll(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

/// Replays a pinned list of draws. Once exhausted, the last value repeats.
#[derive(Debug, Clone, Default)]
pub struct FixedRolls {
    queue: VecDeque<f64>,
    last: f64,
}

impl FixedRolls {
    pub fn new(values: impl IntoIterator<Item = f64>) -> Self {
        Self {
            queue: values.into_iter().collect(),
            last: 0.0,
        }
    }

    pub fn constant(value: f64) -> Self {
        Self {
            queue: VecDeque::new(),
            last: value,
        }
    }
}

impl RollSource for FixedRolls {
    fn roll(&mut self) -> f64 {
        if let Some(next) = self.queue.pop_front() {
            self.last = next;
        }
        self.last.clamp(0.0, 1.0 - f64::EPSILON)
    }
}
