//! `RngSource` implementations: OS entropy for production, a fixed seed for
//! tests (spec §9, "Strategy selection RNG: must be seedable for tests").

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::ports::RngSource;

/// Draws from OS entropy on every call, the production default.
#[derive(Debug, Default)]
pub struct OsRngSource;

impl RngSource for OsRngSource {
    fn next_weight(&self) -> u8 {
        rand::thread_rng().gen_range(0..100)
    }
}

/// Draws from a fixed seed, reproducible across test runs.
pub struct SeededRngSource {
    inner: Mutex<StdRng>,
}

impl SeededRngSource {
    pub fn new(seed: u64) -> Self {
        Self { inner: Mutex::new(StdRng::seed_from_u64(seed)) }
    }
}

impl RngSource for SeededRngSource {
    fn next_weight(&self) -> u8 {
        self.inner.lock().expect("rng mutex poisoned").gen_range(0..100)
    }
}
