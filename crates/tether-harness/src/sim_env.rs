//! Deterministic environment for simulation.
//!
//! Seeded ChaCha RNG and a virtual clock that only moves when told to. Two
//! `SimEnv`s built from the same seed hand out the same session IDs in the
//! same order, so a failing run replays exactly.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicU64, Ordering},
};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tether_core::Environment;

/// Virtual clock start: 2024-01-01T00:00:00Z in milliseconds.
const EPOCH_MILLIS: u64 = 1_704_067_200_000;

/// Simulation environment.
///
/// Clones share the RNG and the clock.
#[derive(Clone)]
pub struct SimEnv {
    rng: Arc<Mutex<ChaCha8Rng>>,
    clock_millis: Arc<AtomicU64>,
}

impl SimEnv {
    /// Create an environment from `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
            clock_millis: Arc::new(AtomicU64::new(EPOCH_MILLIS)),
        }
    }

    /// Move the virtual clock forward.
    pub fn advance(&self, millis: u64) {
        self.clock_millis.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::with_seed(0)
    }
}

impl std::fmt::Debug for SimEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimEnv")
            .field("clock_millis", &self.clock_millis.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl Environment for SimEnv {
    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(buffer);
    }

    fn wall_clock_millis(&self) -> u64 {
        self.clock_millis.load(Ordering::SeqCst)
    }
}
