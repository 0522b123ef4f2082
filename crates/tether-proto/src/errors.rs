//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors from encoding or decoding wire messages.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Inbound text was not a well-formed message.
    ///
    /// Covers invalid JSON, a missing or non-string `type` field, and known
    /// kinds with missing or mistyped fields.
    #[error("malformed message: {0}")]
    Malformed(serde_json::Error),

    /// Outbound message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(serde_json::Error),
}
