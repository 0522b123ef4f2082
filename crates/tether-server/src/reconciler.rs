//! Disconnection reconciler.
//!
//! Runs once per closed connection, keyed by the session's last known role
//! and room. The closed connection must already be gone from the connection
//! table so nothing is sent to it.
//!
//! # Rules
//!
//! - Unjoined session: nothing to do.
//! - Current controller: clear it and tell every target
//!   `controller_disconnected`.
//! - Replaced controller: the room is untouched.
//! - Target: remove it by identity, push `target_count`, then tell the
//!   controller `target_update` (targets remain) or `target_lost` (none left).
//!
//! Afterwards an empty room is removed from the registry.

use tether_core::{ConnectionHandle, Role, Session, SessionState};
use tether_proto::ServerMessage;

use crate::{
    connections::{ConnectionTable, tally_deliveries},
    driver::{LogLevel, ServerAction},
    presence,
    registry::RoomRegistry,
};

/// Reconcile the registry after `session_id` closed.
pub fn reconcile_disconnect<H: ConnectionHandle>(
    registry: &mut RoomRegistry,
    connections: &ConnectionTable<H>,
    session_id: u64,
    session: &Session,
    actions: &mut Vec<ServerAction>,
) {
    let SessionState::Joined { role, room_id } = session.state() else {
        return;
    };
    let Some(room) = registry.get_mut(room_id) else {
        return;
    };

    match role {
        Role::Controller => {
            if room.clear_controller(session_id) {
                let message = ServerMessage::controller_disconnected();
                let deliveries = connections.fan_out(room.targets(), &message);
                let delivered = tally_deliveries(&deliveries, message.kind(), actions);
                actions.push(ServerAction::Log {
                    level: LogLevel::Info,
                    message: format!(
                        "controller session {} left, notified {}/{} targets",
                        session_id,
                        delivered,
                        deliveries.len()
                    ),
                });
            } else {
                actions.push(ServerAction::Log {
                    level: LogLevel::Debug,
                    message: format!("replaced controller session {session_id} left"),
                });
            }
        },
        Role::Target => {
            if room.remove_target(session_id) {
                let count = room.target_count();
                let controller = room.controller();

                presence::broadcast_target_count(registry, connections, room_id, actions);

                if let Some(controller) = controller {
                    let update = if count > 0 {
                        ServerMessage::target_update(count)
                    } else {
                        ServerMessage::target_lost()
                    };
                    connections.notify(controller, &update, actions);
                }

                actions.push(ServerAction::Log {
                    level: LogLevel::Info,
                    message: format!("target session {session_id} left, {count} remaining"),
                });
            }
        },
    }

    if registry.remove_if_empty(room_id) {
        actions.push(ServerAction::Log {
            level: LogLevel::Info,
            message: format!("room closed after session {session_id} left"),
        });
    }
}
