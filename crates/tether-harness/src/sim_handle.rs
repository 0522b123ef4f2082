//! In-memory connection handles.
//!
//! [`SimHandle`] records every message the driver sends and can be switched
//! into a failing state to model a connection whose writer has gone away.
//! [`ChaoticHandle`] wraps one and fails sends at a seeded random rate.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tether_core::{ConnectionHandle, SendError};
use tether_proto::ServerMessage;

/// Recording connection handle.
///
/// Clones share the outbox and the failure switch, so a test keeps one clone
/// and hands the other to the driver.
#[derive(Debug, Clone, Default)]
pub struct SimHandle {
    outbox: Arc<Mutex<Vec<ServerMessage>>>,
    failing: Arc<AtomicBool>,
}

impl SimHandle {
    /// Create a healthy handle with an empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following send fail (`true`) or succeed (`false`).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Whether sends currently fail.
    pub fn is_failing(&self) -> bool {
        self.failing.load(Ordering::SeqCst)
    }

    /// Remove and return everything received so far.
    pub fn drain(&self) -> Vec<ServerMessage> {
        std::mem::take(&mut *self.outbox.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Copy of everything received so far.
    pub fn received(&self) -> Vec<ServerMessage> {
        self.outbox.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Most recent message, if any.
    pub fn last(&self) -> Option<ServerMessage> {
        self.outbox.lock().unwrap_or_else(PoisonError::into_inner).last().cloned()
    }
}

impl ConnectionHandle for SimHandle {
    fn send(&self, message: &ServerMessage) -> Result<(), SendError> {
        if self.is_failing() {
            return Err(SendError::Closed);
        }
        self.outbox.lock().unwrap_or_else(PoisonError::into_inner).push(message.clone());
        Ok(())
    }
}

/// Handle that randomly fails sends.
///
/// Delegates to a [`SimHandle`] but fails each send with probability
/// `failure_rate`, drawn from a seeded RNG so runs are reproducible.
#[derive(Debug, Clone)]
pub struct ChaoticHandle {
    inner: SimHandle,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    rng: Arc<Mutex<ChaCha8Rng>>,
    failures: Arc<AtomicUsize>,
}

impl ChaoticHandle {
    /// Wrap `inner`, failing sends at `failure_rate`.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn with_seed(inner: SimHandle, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            failure_rate,
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
            failures: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Underlying recording handle.
    pub fn inner(&self) -> &SimHandle {
        &self.inner
    }

    /// Number of sends that were made to fail.
    pub fn injected_failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    fn should_fail(&self) -> bool {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).gen_bool(self.failure_rate)
    }
}

impl ConnectionHandle for ChaoticHandle {
    fn send(&self, message: &ServerMessage) -> Result<(), SendError> {
        if self.should_fail() {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(SendError::Transport("chaotic failure injection".to_string()));
        }
        self.inner.send(message)
    }
}
