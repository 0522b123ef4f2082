//! Tether wire protocol.
//!
//! Every message is a UTF-8 JSON object carried in one WebSocket text frame.
//! The `type` field names the message kind; the remaining fields depend on
//! the kind.
//!
//! # Inbound (client → server)
//!
//! - `{"type":"controller_join","roomCode":"..."}`
//! - `{"type":"target_join","roomCode":"..."}`
//! - `{"type":"relay_message","payload":<any JSON>}`
//! - `{"type":"ping"}`
//!
//! # Outbound (server → client)
//!
//! `error`, `target_count`, `waiting_for_target`, `target_acquired`,
//! `connected`, `prank_message`, `prank_delivered`, `controller_disconnected`,
//! `target_update`, `target_lost` and `pong`. See [`ServerMessage`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod errors;
pub mod message;
mod room;

pub use errors::{ProtocolError, Result};
pub use message::{ClientMessage, ServerMessage};
pub use room::RoomId;
