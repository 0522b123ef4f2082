//! Model-based testing support.
//!
//! Operations are applied to both the [`ModelWorld`] and a real driver (see
//! [`SimServer::apply`](crate::SimServer::apply)); the messages each client
//! receives and the resulting room state must match.

mod operation;
mod world;

pub use operation::{ClientId, Operation, relay_payload};
pub use world::{Deliveries, ModelClient, ModelWorld, ObservableState};
