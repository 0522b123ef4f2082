//! Deterministic simulation harness for Tether relay testing.
//!
//! In-memory implementations of the `Environment` and `ConnectionHandle`
//! seams so the real `RelayDriver` runs reproducibly without sockets.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation of the relay rules.
//! Operations are applied to both the model and a [`SimServer`], and the
//! messages each client receives plus the resulting room state are compared.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks structural properties of the registry after
//! every event. Use [`InvariantRegistry::standard()`] for the registry
//! invariants every test should hold.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod model;
pub mod sim_env;
pub mod sim_handle;
pub mod sim_server;

pub use invariants::{
    ExclusiveMembership, Invariant, InvariantRegistry, InvariantResult, RoomOccupancy,
    RoomSnapshot, SessionRoomAgreement, SessionSnapshot, SystemSnapshot, Violation,
};
pub use model::{ClientId, Deliveries, ModelClient, ModelWorld, ObservableState, Operation};
pub use sim_env::SimEnv;
pub use sim_handle::{ChaoticHandle, SimHandle};
pub use sim_server::{SimClient, SimError, SimServer};
