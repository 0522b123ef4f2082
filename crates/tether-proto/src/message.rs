//! JSON-encoded relay messages.
//!
//! Both directions use internally tagged enums: the `type` field carries the
//! snake_case kind and the variant fields sit next to it in the same object.
//!
//! # Invariants
//!
//! - Decoding never panics. Text that is not a JSON object with a string
//!   `type` field, or a known kind with missing fields, is
//!   [`ProtocolError::Malformed`].
//! - A well-formed object whose `type` is not a known inbound kind decodes to
//!   [`ClientMessage::Unknown`], so callers can tell "ignore" apart from
//!   "discard".

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ProtocolError, Result};

/// Messages sent by controllers and targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a room as its controller.
    ControllerJoin {
        /// Room code; must equal the server's shared secret.
        #[serde(rename = "roomCode")]
        room_code: String,
    },

    /// Join a room as a target.
    TargetJoin {
        /// Room code; must equal the server's shared secret.
        #[serde(rename = "roomCode")]
        room_code: String,
    },

    /// Forward `payload` to every target in the controller's room.
    RelayMessage {
        /// Opaque JSON value delivered verbatim to targets.
        payload: Value,
    },

    /// Keep-alive probe, answered with [`ServerMessage::Pong`].
    Ping,

    /// Any kind this server does not understand.
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Parse one inbound text frame.
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(ProtocolError::Malformed)
    }

    /// Serialize to JSON text (used by clients and tests).
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// Wire name of this message kind.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ControllerJoin { .. } => "controller_join",
            Self::TargetJoin { .. } => "target_join",
            Self::RelayMessage { .. } => "relay_message",
            Self::Ping => "ping",
            Self::Unknown => "unknown",
        }
    }
}

/// Messages sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A request was rejected. The connection stays open.
    Error {
        /// Human-readable reason.
        message: String,
    },

    /// Current number of targets in the controller's room.
    TargetCount {
        /// Number of connected targets.
        count: usize,
    },

    /// Controller joined a room that has no targets yet.
    WaitingForTarget {
        /// Human-readable status.
        message: String,
    },

    /// Controller's room has at least one target.
    TargetAcquired {
        /// Number of connected targets.
        count: usize,
        /// Human-readable status.
        message: String,
    },

    /// Target joined successfully.
    Connected {
        /// Human-readable status.
        message: String,
    },

    /// Payload relayed from the room's controller.
    #[serde(rename = "prank_message")]
    Relayed {
        /// The controller's payload, unchanged.
        payload: Value,
    },

    /// Outcome of a relay fan-out, sent back to the controller.
    #[serde(rename = "prank_delivered")]
    DeliveryReceipt {
        /// Targets the payload was handed to.
        delivered: usize,
        /// Targets in the room when the fan-out started.
        total: usize,
    },

    /// The room's controller went away.
    ControllerDisconnected {
        /// Human-readable status.
        message: String,
    },

    /// A target left and others remain.
    TargetUpdate {
        /// Number of remaining targets.
        count: usize,
    },

    /// The last target left.
    TargetLost {
        /// Human-readable status.
        message: String,
    },

    /// Reply to [`ClientMessage::Ping`].
    Pong,
}

impl ServerMessage {
    /// Rejection with a human-readable reason.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error { message: message.into() }
    }

    /// Target count notification.
    pub fn target_count(count: usize) -> Self {
        Self::TargetCount { count }
    }

    /// Controller is alone in its room.
    pub fn waiting_for_target() -> Self {
        Self::WaitingForTarget { message: "Waiting for a target to connect".to_string() }
    }

    /// Controller's room has `count` targets.
    pub fn target_acquired(count: usize) -> Self {
        Self::TargetAcquired { count, message: format!("Target acquired ({count} connected)") }
    }

    /// Target join confirmation.
    pub fn connected() -> Self {
        Self::Connected { message: "Connected, waiting for messages".to_string() }
    }

    /// Relayed controller payload.
    pub fn relayed(payload: Value) -> Self {
        Self::Relayed { payload }
    }

    /// Delivery receipt for a fan-out.
    pub fn delivery_receipt(delivered: usize, total: usize) -> Self {
        Self::DeliveryReceipt { delivered, total }
    }

    /// Controller left the room.
    pub fn controller_disconnected() -> Self {
        Self::ControllerDisconnected { message: "Controller disconnected".to_string() }
    }

    /// Remaining target count after a target left.
    pub fn target_update(count: usize) -> Self {
        Self::TargetUpdate { count }
    }

    /// Last target left the room.
    pub fn target_lost() -> Self {
        Self::TargetLost { message: "All targets disconnected".to_string() }
    }

    /// Serialize to one JSON text frame.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// Parse a server message (used by clients and tests).
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(ProtocolError::Malformed)
    }

    /// Wire name of this message kind.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Error { .. } => "error",
            Self::TargetCount { .. } => "target_count",
            Self::WaitingForTarget { .. } => "waiting_for_target",
            Self::TargetAcquired { .. } => "target_acquired",
            Self::Connected { .. } => "connected",
            Self::Relayed { .. } => "prank_message",
            Self::DeliveryReceipt { .. } => "prank_delivered",
            Self::ControllerDisconnected { .. } => "controller_disconnected",
            Self::TargetUpdate { .. } => "target_update",
            Self::TargetLost { .. } => "target_lost",
            Self::Pong => "pong",
        }
    }
}
