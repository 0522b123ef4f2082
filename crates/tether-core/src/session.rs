//! Per-connection session state machine.
//!
//! A session starts unjoined and takes exactly one role, in exactly one room,
//! at most once. There is no re-join and no role switch.
//!
//! # State Machine
//!
//! ```text
//!                controller_join    ┌────────────────────────────┐
//!             ┌────────────────────>│ Joined { Controller, room } │
//! ┌──────────┐│                     └────────────────────────────┘
//! │ Unjoined │┤
//! └──────────┘│  target_join        ┌────────────────────────────┐
//!             └────────────────────>│ Joined { Target, room }     │
//!                                   └────────────────────────────┘
//! ```
//!
//! Closing the connection destroys the session; the driver reconciles rooms
//! using the last state observed here.

use std::fmt;

use tether_proto::RoomId;

use crate::error::SessionError;

/// Role a joined session plays in its room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Originates relay requests; at most one authoritative per room
    Controller,
    /// Receives relayed payloads
    Target,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Controller => f.write_str("controller"),
            Self::Target => f.write_str("target"),
        }
    }
}

/// Session state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, no role yet
    Unjoined,
    /// Role and room assigned (immutable)
    Joined {
        /// Role in the room
        role: Role,
        /// Room the session belongs to
        room_id: RoomId,
    },
}

/// State of one live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    state: SessionState,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Create a new session in [`SessionState::Unjoined`] state.
    pub fn new() -> Self {
        Self { state: SessionState::Unjoined }
    }

    /// Current state
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Role, if joined.
    pub fn role(&self) -> Option<Role> {
        match &self.state {
            SessionState::Unjoined => None,
            SessionState::Joined { role, .. } => Some(*role),
        }
    }

    /// Room, if joined.
    pub fn room_id(&self) -> Option<&RoomId> {
        match &self.state {
            SessionState::Unjoined => None,
            SessionState::Joined { room_id, .. } => Some(room_id),
        }
    }

    /// Whether the session has taken a role.
    pub fn is_joined(&self) -> bool {
        matches!(self.state, SessionState::Joined { .. })
    }

    /// Take `role` in `room_id`.
    ///
    /// # Errors
    ///
    /// [`SessionError::AlreadyJoined`] if the session already has a role. The
    /// existing role and room are left unchanged.
    pub fn join(&mut self, role: Role, room_id: RoomId) -> Result<(), SessionError> {
        match &self.state {
            SessionState::Unjoined => {
                self.state = SessionState::Joined { role, room_id };
                Ok(())
            },
            SessionState::Joined { role: existing, .. } => {
                Err(SessionError::AlreadyJoined { role: *existing })
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn new_session_is_unjoined() {
        let session = Session::new();
        assert_eq!(session.state(), &SessionState::Unjoined);
        assert_eq!(session.role(), None);
        assert_eq!(session.room_id(), None);
        assert!(!session.is_joined());
    }

    #[test]
    fn join_sets_role_and_room_together() {
        let mut session = Session::new();
        session.join(Role::Target, RoomId::new("r")).unwrap();

        assert_eq!(session.role(), Some(Role::Target));
        assert_eq!(session.room_id(), Some(&RoomId::new("r")));
        assert!(session.is_joined());
    }

    #[test]
    fn second_join_is_rejected_and_state_kept() {
        let mut session = Session::new();
        session.join(Role::Controller, RoomId::new("a")).unwrap();

        let result = session.join(Role::Target, RoomId::new("b"));

        assert_eq!(result, Err(SessionError::AlreadyJoined { role: Role::Controller }));
        assert_eq!(session.role(), Some(Role::Controller));
        assert_eq!(session.room_id(), Some(&RoomId::new("a")));
    }

    fn arbitrary_role() -> impl Strategy<Value = Role> {
        prop_oneof![Just(Role::Controller), Just(Role::Target)]
    }

    proptest! {
        /// Property: only the first join of any sequence takes effect
        #[test]
        fn prop_first_join_wins(
            joins in prop::collection::vec((arbitrary_role(), "[a-z]{1,4}"), 1..8)
        ) {
            let mut session = Session::new();
            for (role, room) in &joins {
                let _ = session.join(*role, RoomId::new(room.as_str()));
            }

            let (first_role, first_room) = &joins[0];
            prop_assert_eq!(session.role(), Some(*first_role));
            prop_assert_eq!(session.room_id(), Some(&RoomId::new(first_room.as_str())));
        }
    }
}
