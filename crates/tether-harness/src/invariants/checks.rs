//! Standard invariant checks.
//!
//! These invariants capture structural properties of the registry that must
//! hold after every event, whatever the event sequence.

use std::collections::HashMap;

use tether_core::Role;

use super::{Invariant, InvariantResult, SystemSnapshot, Violation};

/// Rooms exist only while occupied.
///
/// Every room in the registry has a controller or at least one target. An
/// empty room means garbage collection was skipped on some path.
pub struct RoomOccupancy;

impl Invariant for RoomOccupancy {
    fn name(&self) -> &'static str {
        "RoomOccupancy"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for room in &state.rooms {
            if room.controller.is_none() && room.targets.is_empty() {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("room {} has no controller and no targets", room.room_id),
                });
            }
        }
        Ok(())
    }
}

/// A session occupies at most one slot in the whole registry.
///
/// No session is both controller and target, a target appears once in its
/// room, and no session is in two rooms.
pub struct ExclusiveMembership;

impl Invariant for ExclusiveMembership {
    fn name(&self) -> &'static str {
        "ExclusiveMembership"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let mut seen: HashMap<u64, String> = HashMap::new();

        for room in &state.rooms {
            let slots = room
                .controller
                .iter()
                .map(|id| (*id, "controller"))
                .chain(room.targets.iter().map(|id| (*id, "target")));

            for (session_id, slot) in slots {
                let here = format!("{slot} of room {}", room.room_id);
                if let Some(previous) = seen.insert(session_id, here.clone()) {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!("session {session_id} is {previous} and {here}"),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Registry slots and session records agree.
///
/// Every controller and target in a room is a live session joined with that
/// role in that room. Every joined target is listed in its room. Controllers
/// are exempt from the converse: a replaced controller keeps its role but has
/// no slot.
pub struct SessionRoomAgreement;

impl Invariant for SessionRoomAgreement {
    fn name(&self) -> &'static str {
        "SessionRoomAgreement"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for room in &state.rooms {
            let slots = room
                .controller
                .iter()
                .map(|id| (*id, Role::Controller))
                .chain(room.targets.iter().map(|id| (*id, Role::Target)));

            for (session_id, role) in slots {
                let Some(session) = state.sessions.get(&session_id) else {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "room {} lists closed session {session_id} as {role}",
                            room.room_id
                        ),
                    });
                };

                if session.role != Some(role) || session.room_id.as_ref() != Some(&room.room_id) {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "room {} lists session {session_id} as {role}, session says {:?} in {:?}",
                            room.room_id, session.role, session.room_id
                        ),
                    });
                }
            }
        }

        for (session_id, session) in &state.sessions {
            let (Some(Role::Target), Some(room_id)) = (session.role, &session.room_id) else {
                continue;
            };

            let listed = state
                .rooms
                .iter()
                .any(|room| &room.room_id == room_id && room.targets.contains(session_id));
            if !listed {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("target session {session_id} missing from room {room_id}"),
                });
            }
        }
        Ok(())
    }
}
