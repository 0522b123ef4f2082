//! Presence broadcaster.
//!
//! Keeps a room's controller informed of how many targets it can reach.

use tether_core::ConnectionHandle;
use tether_proto::{RoomId, ServerMessage};

use crate::{connections::ConnectionTable, driver::ServerAction, registry::RoomRegistry};

/// Send the room's controller its current `target_count`.
///
/// No-op if the room does not exist or has no controller. Returns `true` if a
/// count was handed to the controller's transport.
pub fn broadcast_target_count<H: ConnectionHandle>(
    registry: &RoomRegistry,
    connections: &ConnectionTable<H>,
    room_id: &RoomId,
    actions: &mut Vec<ServerAction>,
) -> bool {
    let Some(room) = registry.get(room_id) else {
        return false;
    };
    let Some(controller) = room.controller() else {
        return false;
    };

    connections.notify(controller, &ServerMessage::target_count(room.target_count()), actions)
}
