//! Operations for model-based testing.
//!
//! Operations represent every client action the relay reacts to. They are
//! generated randomly by proptest (or decoded from fuzz input via
//! `arbitrary`) and applied to both the model and the real driver.

use arbitrary::Arbitrary;
use serde_json::Value;
use tether_proto::ClientMessage;

/// Client identifier (0-indexed, reduced modulo the world size).
pub type ClientId = u8;

/// Operations that can be applied to the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum Operation {
    /// Open a connection for the client. No-op if already connected.
    Connect {
        /// Client connecting.
        client_id: ClientId,
    },

    /// Join as controller.
    ControllerJoin {
        /// Client joining.
        client_id: ClientId,
        /// Whether the room code matches the secret.
        valid_code: bool,
    },

    /// Join as target.
    TargetJoin {
        /// Client joining.
        client_id: ClientId,
        /// Whether the room code matches the secret.
        valid_code: bool,
    },

    /// Relay a payload to the room's targets.
    Relay {
        /// Client relaying.
        client_id: ClientId,
        /// Payload tag, so fan-outs can be told apart.
        tag: u8,
    },

    /// Send a keep-alive ping.
    Ping {
        /// Client pinging.
        client_id: ClientId,
    },

    /// Send text that is not a valid message.
    Garbage {
        /// Client sending.
        client_id: ClientId,
    },

    /// Send a well-formed message of an unknown kind.
    UnknownKind {
        /// Client sending.
        client_id: ClientId,
    },

    /// Close the client's connection. No-op if not connected.
    Disconnect {
        /// Client disconnecting.
        client_id: ClientId,
    },
}

impl Operation {
    /// Client performing the operation.
    pub fn client_id(&self) -> ClientId {
        match self {
            Self::Connect { client_id }
            | Self::ControllerJoin { client_id, .. }
            | Self::TargetJoin { client_id, .. }
            | Self::Relay { client_id, .. }
            | Self::Ping { client_id }
            | Self::Garbage { client_id }
            | Self::UnknownKind { client_id }
            | Self::Disconnect { client_id } => *client_id,
        }
    }

    /// Same operation with the client ID reduced into `0..num_clients`.
    #[must_use]
    pub fn for_world(mut self, num_clients: usize) -> Self {
        let n = num_clients.clamp(1, 256);
        let reduce = |id: &mut ClientId| *id = u8::try_from(usize::from(*id) % n).unwrap_or(0);
        match &mut self {
            Self::Connect { client_id }
            | Self::ControllerJoin { client_id, .. }
            | Self::TargetJoin { client_id, .. }
            | Self::Relay { client_id, .. }
            | Self::Ping { client_id }
            | Self::Garbage { client_id }
            | Self::UnknownKind { client_id }
            | Self::Disconnect { client_id } => reduce(client_id),
        }
        self
    }

    /// Wire text the client sends for this operation, if any.
    ///
    /// `secret` is the configured room secret; invalid joins use a code that
    /// is guaranteed to differ from it.
    pub fn wire_text(&self, secret: &str) -> Option<String> {
        let room_code = |valid: bool| {
            if valid { secret.to_string() } else { format!("{secret}-wrong") }
        };

        let message = match *self {
            Self::ControllerJoin { valid_code, .. } => {
                ClientMessage::ControllerJoin { room_code: room_code(valid_code) }
            },
            Self::TargetJoin { valid_code, .. } => {
                ClientMessage::TargetJoin { room_code: room_code(valid_code) }
            },
            Self::Relay { tag, .. } => ClientMessage::RelayMessage { payload: relay_payload(tag) },
            Self::Ping { .. } => ClientMessage::Ping,
            Self::Garbage { .. } => return Some("{\"type\":".to_string()),
            Self::UnknownKind { .. } => return Some(r#"{"type":"self_destruct"}"#.to_string()),
            Self::Connect { .. } | Self::Disconnect { .. } => return None,
        };
        message.encode().ok()
    }
}

/// Payload relayed by [`Operation::Relay`] with the given tag.
pub fn relay_payload(tag: u8) -> Value {
    serde_json::json!({ "type": "model", "tag": tag })
}
