//! Shared room secret.

use std::fmt;

use subtle::ConstantTimeEq;

/// The static room secret configured at deployment time.
///
/// Every join message's `roomCode` is compared against it by exact equality,
/// in time independent of where the first differing byte is. `Debug` is
/// redacted so the secret never reaches logs.
#[derive(Clone)]
pub struct RoomSecret(String);

impl RoomSecret {
    /// Wrap a configured secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Whether `room_code` is exactly the configured secret.
    pub fn matches(&self, room_code: &str) -> bool {
        self.0.as_bytes().ct_eq(room_code.as_bytes()).into()
    }

    /// Whether no secret was configured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PartialEq for RoomSecret {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.0)
    }
}

impl Eq for RoomSecret {}

impl fmt::Debug for RoomSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RoomSecret(<redacted>)")
    }
}
