use std::ops::Range;
use std::sync::Mutex;

use chrono::{DateTime, Local};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::SamplerError;
use crate::model::tick::Tick;

/// Upper bound for the per-tick relative move of the random walk.
pub const MAX_RELATIVE_CHANGE: f64 = 0.01;
pub const DEFAULT_VOLUME_RANGE: Range<u64> = 10_000..100_000;

/// Produces the next tick from the last known close. The random walk below
/// is a placeholder; a live quote feed can implement this instead.
pub trait TickSource: Send + Sync {
    fn next_tick(&self, last_close: f64, now: DateTime<Local>) -> Result<Tick, SamplerError>;
}

/// Uniform relative move in `[-max_change, +max_change]` around the last close.
#[derive(Debug)]
pub struct RandomWalkSource {
    max_change: f64,
    volume_range: Range<u64>,
    rng: Mutex<StdRng>,
}

impl RandomWalkSource {
    pub fn new(max_change: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_os_rng(),
        };
        Self {
            max_change: max_change.abs().min(MAX_RELATIVE_CHANGE),
            volume_range: DEFAULT_VOLUME_RANGE,
            rng: Mutex::new(rng),
        }
    }

    pub fn with_volume_range(mut self, range: Range<u64>) -> Self {
        self.volume_range = range;
        self
    }

    pub fn max_change(&self) -> f64 {
        self.max_change
    }
}

impl TickSource for RandomWalkSource {
    fn next_tick(&self, last_close: f64, now: DateTime<Local>) -> Result<Tick, SamplerError> {
        if !(last_close.is_finite() && last_close > 0.0) {
            return Err(SamplerError::Computation(format!(
                "invalid baseline close {}",
                last_close
            )));
        }
        let (delta, volume) = {
            let mut rng = self
                .rng
                .lock()
                .map_err(|_| SamplerError::Computation("rng lock poisoned".to_string()))?;
            let delta = if self.max_change > 0.0 {
                rng.random_range(-self.max_change..=self.max_change)
            } else {
                0.0
            };
            let volume = if self.volume_range.is_empty() {
                self.volume_range.start
            } else {
                rng.random_range(self.volume_range.clone())
            };
            (delta, volume)
        };
        let delta = delta.clamp(-self.max_change, self.max_change);
        let price = last_close * (1.0 + delta);
        if !(price.is_finite() && price > 0.0) {
            return Err(SamplerError::Computation(format!(
                "derived price {} from close {}",
                price, last_close
            )));
        }
        Ok(Tick::from_baseline(now, last_close, price, volume))
    }
}
