//! Observable state snapshots for invariant checking.
//!
//! Snapshots capture the registry and session table at a point in time.
//! Invariants operate on snapshots rather than live state to ensure
//! consistent, atomic checks.

use std::collections::HashMap;

use tether_core::{ConnectionHandle, Environment, Role};
use tether_proto::RoomId;
use tether_server::RelayDriver;

/// Snapshot of the whole relay.
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshot {
    /// Every room in the registry.
    pub rooms: Vec<RoomSnapshot>,
    /// Every live session, keyed by session ID.
    pub sessions: HashMap<u64, SessionSnapshot>,
}

impl SystemSnapshot {
    /// Create an empty snapshot (no rooms, no sessions).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Capture the current state of `driver`.
    pub fn from_driver<E, H>(driver: &RelayDriver<E, H>) -> Self
    where
        E: Environment,
        H: ConnectionHandle,
    {
        let rooms = driver
            .rooms()
            .iter()
            .map(|(room_id, room)| RoomSnapshot {
                room_id: room_id.clone(),
                controller: room.controller(),
                targets: room.targets().to_vec(),
            })
            .collect();

        let sessions = driver
            .sessions()
            .map(|(id, session)| {
                (id, SessionSnapshot {
                    role: session.role(),
                    room_id: session.room_id().cloned(),
                })
            })
            .collect();

        Self { rooms, sessions }
    }

    /// Add a room snapshot.
    #[must_use]
    pub fn with_room(mut self, room: RoomSnapshot) -> Self {
        self.rooms.push(room);
        self
    }

    /// Add a session snapshot.
    #[must_use]
    pub fn with_session(mut self, session_id: u64, session: SessionSnapshot) -> Self {
        self.sessions.insert(session_id, session);
        self
    }
}

/// Snapshot of one room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSnapshot {
    /// Room identifier.
    pub room_id: RoomId,
    /// Controller session, if any.
    pub controller: Option<u64>,
    /// Target sessions in join order.
    pub targets: Vec<u64>,
}

impl RoomSnapshot {
    /// Create an empty room snapshot.
    pub fn new(room_id: impl Into<RoomId>) -> Self {
        Self { room_id: room_id.into(), controller: None, targets: Vec::new() }
    }

    /// Set the controller.
    #[must_use]
    pub fn with_controller(mut self, session_id: u64) -> Self {
        self.controller = Some(session_id);
        self
    }

    /// Add targets.
    #[must_use]
    pub fn with_targets(mut self, targets: impl IntoIterator<Item = u64>) -> Self {
        self.targets.extend(targets);
        self
    }
}

/// Snapshot of one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Role, if joined.
    pub role: Option<Role>,
    /// Room, if joined.
    pub room_id: Option<RoomId>,
}

impl SessionSnapshot {
    /// Unjoined session.
    pub fn unjoined() -> Self {
        Self::default()
    }

    /// Session joined as `role` in `room_id`.
    pub fn joined(role: Role, room_id: impl Into<RoomId>) -> Self {
        Self { role: Some(role), room_id: Some(room_id.into()) }
    }
}
