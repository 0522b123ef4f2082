//! Driver error types.
//!
//! Protocol rejections never surface here: they become `error` replies to the
//! offending connection. These errors mean the runtime fed the driver an
//! event that contradicts its connection table.

use std::fmt;

/// Errors returned by [`RelayDriver::process_event`](crate::RelayDriver::process_event).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// Session not found in the connection table.
    ///
    /// A message arrived for a connection that was never accepted or was
    /// already closed. Transient if the close raced the read; the message is
    /// dropped.
    SessionNotFound(u64),

    /// Session already registered.
    ///
    /// The runtime tried to accept a connection under an ID that is in use.
    /// This is a logic bug in session ID allocation.
    SessionAlreadyExists(u64),
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionNotFound(id) => write!(f, "session not found: {id}"),
            Self::SessionAlreadyExists(id) => write!(f, "session already exists: {id}"),
        }
    }
}

impl std::error::Error for DriverError {}
