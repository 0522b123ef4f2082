//! Outbound connection seam.

use tether_proto::ServerMessage;

use crate::error::SendError;

/// The sending half of one live connection.
///
/// Sends are fire-and-forget: implementations must not block, and a failure
/// affects only this connection. Production handles push encoded text into a
/// per-connection queue drained by a writer task, which also preserves FIFO
/// order per connection.
///
/// Identity is not part of this trait. The driver keys handles by session ID
/// and rooms hold session IDs, so removal is always by identity, never by
/// position.
pub trait ConnectionHandle: Send + 'static {
    /// Queue `message` for delivery to this connection.
    fn send(&self, message: &ServerMessage) -> Result<(), SendError>;
}
