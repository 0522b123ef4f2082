use std::fmt;

use serde::{Deserialize, Serialize};

/// Room identifier.
///
/// Opaque string taken verbatim from the `roomCode` of a join message. It is
/// the only key into the server's room registry.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Wrap a room code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Room code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RoomId {
    fn from(code: String) -> Self {
        Self(code)
    }
}

impl From<&str> for RoomId {
    fn from(code: &str) -> Self {
        Self(code.to_string())
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
