//! Relay driver.
//!
//! Ties together the connection table (session state and handles), the room
//! registry, the presence broadcaster and the disconnection reconciler.
//!
//! The driver is synchronous and does no I/O of its own. The runtime feeds it
//! [`ServerEvent`]s one at a time; messages go out through each connection's
//! [`ConnectionHandle`] during the event, and everything else the runtime must
//! do (logging, closing connections) comes back as [`ServerAction`]s.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tether_core::{ConnectionHandle, Environment, Role, RoomSecret, Session};
use tether_proto::{ClientMessage, RoomId, ServerMessage};

use crate::{
    connections::{ConnectionTable, tally_deliveries},
    driver_error::DriverError,
    presence, reconciler,
    registry::RoomRegistry,
};

/// Driver configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Shared secret every join's room code must equal
    pub room_secret: RoomSecret,
    /// Maximum concurrent connections
    pub max_connections: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self { room_secret: RoomSecret::new(""), max_connections: 10_000 }
    }
}

/// Events that the relay driver processes.
///
/// These are produced by the external runtime (simulation or production).
#[derive(Debug)]
pub enum ServerEvent<H> {
    /// A new connection was accepted
    ConnectionAccepted {
        /// Unique ID from [`RelayDriver::allocate_session_id`]
        session_id: u64,
        /// Outbound half of the connection
        handle: H,
    },

    /// A text frame was received from a connection
    MessageReceived {
        /// Connection that sent the frame
        session_id: u64,
        /// Raw frame text, decoded by the driver
        text: String,
    },

    /// A connection was closed (by peer or error)
    ConnectionClosed {
        /// Connection that was closed
        session_id: u64,
        /// Reason for closure
        reason: String,
    },
}

/// Actions that the relay driver produces.
///
/// These are executed by runtime-specific code (production or simulation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerAction {
    /// Close a connection
    CloseConnection {
        /// Session to close
        session_id: u64,
        /// Reason for closure
        reason: String,
    },

    /// Log a message (for debugging/monitoring)
    Log {
        /// Log level
        level: LogLevel,
        /// Message to log
        message: String,
    },
}

/// Log levels for server actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug information
    Debug,
    /// Informational message
    Info,
    /// Warning
    Warn,
    /// Error
    Error,
}

/// Point-in-time server status, served by the health endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// Always `"online"` while the driver is serving
    pub status: &'static str,
    /// Active rooms
    pub rooms: usize,
    /// Live connections
    pub connections: usize,
    /// Unix time in milliseconds
    pub timestamp: u64,
}

/// Action-based relay driver.
///
/// Orchestrates joins, relays and disconnect reconciliation.
pub struct RelayDriver<E, H>
where
    E: Environment,
    H: ConnectionHandle,
{
    /// Live connections (session_id → session + handle)
    connections: ConnectionTable<H>,
    /// Rooms keyed by room ID
    registry: RoomRegistry,
    /// Environment (RNG, clock)
    env: E,
    /// Driver configuration
    config: RelayConfig,
}

impl<E, H> RelayDriver<E, H>
where
    E: Environment,
    H: ConnectionHandle,
{
    /// Create a new relay driver.
    pub fn new(env: E, config: RelayConfig) -> Self {
        Self { connections: ConnectionTable::new(), registry: RoomRegistry::new(), env, config }
    }

    /// Process a server event and return actions to execute.
    ///
    /// This is the main entry point for the relay driver.
    pub fn process_event(
        &mut self,
        event: ServerEvent<H>,
    ) -> Result<Vec<ServerAction>, DriverError> {
        match event {
            ServerEvent::ConnectionAccepted { session_id, handle } => {
                self.handle_connection_accepted(session_id, handle)
            },
            ServerEvent::MessageReceived { session_id, text } => {
                self.handle_message_received(session_id, &text)
            },
            ServerEvent::ConnectionClosed { session_id, reason } => {
                Ok(self.handle_connection_closed(session_id, &reason))
            },
        }
    }

    /// Pick a fresh, non-zero session ID that is not in use.
    pub fn allocate_session_id(&self) -> u64 {
        loop {
            let id = self.env.random_u64();
            if id != 0 && !self.connections.contains(id) {
                return id;
            }
        }
    }

    fn handle_connection_accepted(
        &mut self,
        session_id: u64,
        handle: H,
    ) -> Result<Vec<ServerAction>, DriverError> {
        if self.connections.len() >= self.config.max_connections {
            return Ok(vec![ServerAction::CloseConnection {
                session_id,
                reason: "max connections exceeded".to_string(),
            }]);
        }

        if !self.connections.insert(session_id, handle) {
            return Err(DriverError::SessionAlreadyExists(session_id));
        }

        Ok(vec![ServerAction::Log {
            level: LogLevel::Debug,
            message: format!("connection accepted, session_id={session_id}"),
        }])
    }

    fn handle_message_received(
        &mut self,
        session_id: u64,
        text: &str,
    ) -> Result<Vec<ServerAction>, DriverError> {
        if !self.connections.contains(session_id) {
            return Err(DriverError::SessionNotFound(session_id));
        }

        let message = match ClientMessage::decode(text) {
            Ok(message) => message,
            Err(e) => {
                return Ok(vec![ServerAction::Log {
                    level: LogLevel::Debug,
                    message: format!("discarding malformed message from session {session_id}: {e}"),
                }]);
            },
        };

        let mut actions = Vec::new();
        match message {
            ClientMessage::ControllerJoin { room_code } => {
                self.handle_join(session_id, Role::Controller, room_code, &mut actions)?;
            },
            ClientMessage::TargetJoin { room_code } => {
                self.handle_join(session_id, Role::Target, room_code, &mut actions)?;
            },
            ClientMessage::RelayMessage { payload } => {
                self.handle_relay(session_id, payload, &mut actions)?;
            },
            ClientMessage::Ping => {
                self.connections.notify(session_id, &ServerMessage::Pong, &mut actions);
            },
            ClientMessage::Unknown => actions.push(ServerAction::Log {
                level: LogLevel::Debug,
                message: format!("ignoring unknown message kind from session {session_id}"),
            }),
        }

        Ok(actions)
    }

    /// Validate the room code, take the role, then update the room.
    ///
    /// Rejections leave both the session and the registry untouched.
    fn handle_join(
        &mut self,
        session_id: u64,
        role: Role,
        room_code: String,
        actions: &mut Vec<ServerAction>,
    ) -> Result<(), DriverError> {
        // Room codes equal the secret, so they are never logged
        if !self.config.room_secret.matches(&room_code) {
            actions.push(ServerAction::Log {
                level: LogLevel::Info,
                message: format!("session {session_id} rejected: invalid room code for {role} join"),
            });
            self.connections.notify(session_id, &ServerMessage::error("Invalid room code"), actions);
            return Ok(());
        }

        let room_id = RoomId::new(room_code);
        let session = self
            .connections
            .session_mut(session_id)
            .ok_or(DriverError::SessionNotFound(session_id))?;

        if let Err(e) = session.join(role, room_id.clone()) {
            actions.push(ServerAction::Log {
                level: LogLevel::Debug,
                message: format!("session {session_id} rejected: {e}"),
            });
            self.connections.notify(session_id, &ServerMessage::error(e.to_string()), actions);
            return Ok(());
        }

        match role {
            Role::Controller => self.join_controller(session_id, &room_id, actions),
            Role::Target => self.join_target(session_id, &room_id, actions),
        }
        Ok(())
    }

    fn join_controller(
        &mut self,
        session_id: u64,
        room_id: &RoomId,
        actions: &mut Vec<ServerAction>,
    ) {
        let room = self.registry.get_or_create(room_id.clone());
        let replaced = room.set_controller(session_id);
        let count = room.target_count();

        if let Some(previous) = replaced {
            actions.push(ServerAction::Log {
                level: LogLevel::Info,
                message: format!("controller session {previous} replaced by session {session_id}"),
            });
        }
        actions.push(ServerAction::Log {
            level: LogLevel::Info,
            message: format!("session {session_id} joined as controller, {count} targets"),
        });

        presence::broadcast_target_count(&self.registry, &self.connections, room_id, actions);

        let status = if count > 0 {
            ServerMessage::target_acquired(count)
        } else {
            ServerMessage::waiting_for_target()
        };
        self.connections.notify(session_id, &status, actions);
    }

    fn join_target(&mut self, session_id: u64, room_id: &RoomId, actions: &mut Vec<ServerAction>) {
        let room = self.registry.get_or_create(room_id.clone());
        room.add_target(session_id);
        let count = room.target_count();
        let controller = room.controller();

        actions.push(ServerAction::Log {
            level: LogLevel::Info,
            message: format!("session {session_id} joined as target, {count} targets"),
        });

        self.connections.notify(session_id, &ServerMessage::connected(), actions);
        presence::broadcast_target_count(&self.registry, &self.connections, room_id, actions);

        if let Some(controller) = controller {
            self.connections.notify(controller, &ServerMessage::target_acquired(count), actions);
        }
    }

    /// Fan `payload` out to every target of the sender's room.
    fn handle_relay(
        &mut self,
        session_id: u64,
        payload: Value,
        actions: &mut Vec<ServerAction>,
    ) -> Result<(), DriverError> {
        let session =
            self.connections.session(session_id).ok_or(DriverError::SessionNotFound(session_id))?;

        let room_id = match (session.role(), session.room_id()) {
            (Some(Role::Controller), Some(room_id)) => room_id.clone(),
            _ => {
                self.reject(session_id, "Only controllers may relay messages", actions);
                return Ok(());
            },
        };

        let room = match self.registry.get(&room_id) {
            Some(room) if room.controller() == Some(session_id) => room,
            _ => {
                self.reject(session_id, "Only the room's active controller may relay messages", actions);
                return Ok(());
            },
        };

        if room.target_count() == 0 {
            self.reject(session_id, "No targets connected", actions);
            return Ok(());
        }

        let message = ServerMessage::relayed(payload);
        let deliveries = self.connections.fan_out(room.targets(), &message);
        let total = deliveries.len();
        let delivered = tally_deliveries(&deliveries, message.kind(), actions);

        actions.push(ServerAction::Log {
            level: LogLevel::Info,
            message: format!("session {session_id} relayed to {delivered}/{total} targets"),
        });
        self.connections.notify(
            session_id,
            &ServerMessage::delivery_receipt(delivered, total),
            actions,
        );
        Ok(())
    }

    fn reject(&self, session_id: u64, reason: &str, actions: &mut Vec<ServerAction>) {
        actions.push(ServerAction::Log {
            level: LogLevel::Debug,
            message: format!("session {session_id} rejected: {reason}"),
        });
        self.connections.notify(session_id, &ServerMessage::error(reason), actions);
    }

    fn handle_connection_closed(&mut self, session_id: u64, reason: &str) -> Vec<ServerAction> {
        let Some(entry) = self.connections.remove(session_id) else {
            return vec![ServerAction::Log {
                level: LogLevel::Debug,
                message: format!("close for unknown session {session_id}: {reason}"),
            }];
        };

        let mut actions = vec![ServerAction::Log {
            level: LogLevel::Debug,
            message: format!("session {session_id} closed: {reason}"),
        }];

        reconciler::reconcile_disconnect(
            &mut self.registry,
            &self.connections,
            session_id,
            &entry.session,
            &mut actions,
        );

        actions
    }

    /// Current status snapshot.
    pub fn status(&self) -> StatusReport {
        StatusReport {
            status: "online",
            rooms: self.registry.room_count(),
            connections: self.connections.len(),
            timestamp: self.env.wall_clock_millis(),
        }
    }

    /// Room registry (read-only).
    pub fn rooms(&self) -> &RoomRegistry {
        &self.registry
    }

    /// Session of a live connection.
    pub fn session(&self, session_id: u64) -> Option<&Session> {
        self.connections.session(session_id)
    }

    /// All live sessions.
    pub fn sessions(&self) -> impl Iterator<Item = (u64, &Session)> + '_ {
        self.connections.sessions()
    }

    /// Check if a connection is live.
    pub fn has_session(&self, session_id: u64) -> bool {
        self.connections.contains(session_id)
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of active rooms.
    pub fn room_count(&self) -> usize {
        self.registry.room_count()
    }
}

impl<E, H> fmt::Debug for RelayDriver<E, H>
where
    E: Environment,
    H: ConnectionHandle,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayDriver")
            .field("connections", &self.connections.len())
            .field("rooms", &self.registry.room_count())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
