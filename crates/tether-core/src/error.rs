//! Error types for the Tether protocol core.
//!
//! Two layers: session errors (illegal state transitions) and send errors
//! (delivery to one connection failed). Neither is ever fatal to the process;
//! the driver turns session errors into `error` replies and send errors into
//! log records.

use tether_proto::ProtocolError;
use thiserror::Error;

use crate::session::Role;

/// Errors from the per-connection session state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A join was attempted on a session that already has a role.
    ///
    /// Role and room are immutable once set.
    #[error("already joined as {role}")]
    AlreadyJoined {
        /// Role the session holds
        role: Role,
    },
}

/// Errors from sending a message to one connection.
#[derive(Error, Debug)]
pub enum SendError {
    /// The connection's outbound side is gone (peer closed or writer exited).
    #[error("connection closed")]
    Closed,

    /// The message could not be encoded.
    #[error(transparent)]
    Encode(#[from] ProtocolError),

    /// Transport-specific failure.
    #[error("transport error: {0}")]
    Transport(String),
}
