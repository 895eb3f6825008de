//! Seedable source for every random choice the simulator makes.
//!
//! A fixed seed reproduces ids, progress increments, delays, labels and
//! confidences exactly, as long as calls happen in the same order.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng};
use std::sync::Mutex;
use std::time::Duration;

use super::types::Label;
use crate::logging::log_error;

#[derive(Debug)]
pub struct OutcomeSampler {
    rng: Mutex<StdRng>,
}

impl OutcomeSampler {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::from_seed(seed),
            None => Self::from_entropy(),
        }
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        // A panic mid-draw cannot leave the generator in an invalid state
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| {
            log_error("upload-queue", "Sampler lock poisoned, recovering").unwrap_or_default();
            poisoned.into_inner()
        });
        f(&mut rng)
    }

    /// Random (v4 layout) UUID drawn from this sampler.
    pub fn item_id(&self) -> String {
        let mut bytes = [0u8; 16];
        self.with_rng(|rng| rng.fill_bytes(&mut bytes));
        uuid::Builder::from_random_bytes(bytes)
            .into_uuid()
            .to_string()
    }

    /// Increment in (0, max].
    pub fn progress_increment(&self, max: f64) -> f64 {
        max - self.with_rng(|rng| rng.gen_range(0.0..max))
    }

    /// Delay in [min_ms, max_ms).
    pub fn processing_delay(&self, min_ms: u64, max_ms: u64) -> Duration {
        Duration::from_millis(self.with_rng(|rng| rng.gen_range(min_ms..max_ms)))
    }

    pub fn label(&self) -> Label {
        self.with_rng(|rng| Label::ALL[rng.gen_range(0..Label::ALL.len())])
    }

    /// Confidence in [min, max).
    pub fn confidence(&self, min: f64, max: f64) -> f64 {
        self.with_rng(|rng| rng.gen_range(min..max))
    }

    /// Value in [0, max).
    pub fn uniform(&self, max: f64) -> f64 {
        self.with_rng(|rng| rng.gen_range(0.0..max))
    }

    pub fn choose<'a, T>(&self, items: &'a [T]) -> Option<&'a T> {
        self.with_rng(|rng| items.choose(rng))
    }
}

impl Default for OutcomeSampler {
    fn default() -> Self {
        Self::from_entropy()
    }
}
