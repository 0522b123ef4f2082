//! Structural checks on relay state.
//!
//! After each event the harness copies the driver's rooms and sessions into a
//! [`SystemSnapshot`] and runs every registered [`Invariant`] over it. A
//! check sees only the snapshot, so the same checks work on hand-built states
//! in unit tests and on live drivers in simulation.
//!
//! ```ignore
//! let checks = InvariantRegistry::standard();
//! checks.assert_all(&SystemSnapshot::from_driver(&driver), "after join");
//! ```

mod checks;
mod snapshot;

use std::fmt;

pub use checks::{ExclusiveMembership, RoomOccupancy, SessionRoomAgreement};
pub use snapshot::{RoomSnapshot, SessionSnapshot, SystemSnapshot};

/// Outcome of one check.
pub type InvariantResult = Result<(), Violation>;

/// A check that failed, and why.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Check that failed
    pub invariant: &'static str,
    /// Offending room or session, in words
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// A property of a [`SystemSnapshot`].
pub trait Invariant: Send + Sync {
    /// Short name used in [`Violation`]s.
    fn name(&self) -> &'static str;

    /// Inspect `state`, returning the first problem found.
    fn check(&self, state: &SystemSnapshot) -> InvariantResult;
}

/// Ordered set of checks run together.
#[derive(Default)]
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl InvariantRegistry {
    /// Registry with no checks.
    pub fn new() -> Self {
        Self::default()
    }

    /// [`RoomOccupancy`], [`ExclusiveMembership`] and
    /// [`SessionRoomAgreement`], in that order.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(RoomOccupancy);
        registry.add(ExclusiveMembership);
        registry.add(SessionRoomAgreement);
        registry
    }

    /// Append a check.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Run every check, collecting one violation per failing check.
    pub fn check_all(&self, state: &SystemSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Run every check and panic listing all failures.
    ///
    /// `context` names the event that produced `state`.
    #[allow(clippy::panic)]
    pub fn assert_all(&self, state: &SystemSnapshot, context: &str) {
        let Err(violations) = self.check_all(state) else {
            return;
        };

        let mut report = format!("{} invariant(s) broken {context}", violations.len());
        for violation in &violations {
            report.push_str("\n  ");
            report.push_str(&violation.to_string());
        }
        panic!("{report}");
    }

    /// Names of the registered checks.
    pub fn names(&self) -> Vec<&'static str> {
        self.invariants.iter().map(|inv| inv.name()).collect()
    }

    /// Number of registered checks.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Whether no checks are registered.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}

impl fmt::Debug for InvariantRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvariantRegistry").field("invariants", &self.names()).finish()
    }
}
