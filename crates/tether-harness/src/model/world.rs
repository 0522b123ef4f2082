//! Model world - the reference relay.
//!
//! A deliberately simple re-statement of the relay rules for a single room
//! (every valid room code is the secret, so there is only one). It is the
//! oracle the real driver is checked against: for each operation it predicts
//! what every client receives and what the room looks like afterwards.

use tether_core::Role;
use tether_proto::ServerMessage;

use super::operation::{ClientId, Operation, relay_payload};

/// One client's view in the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelClient {
    /// Whether the client currently has a connection.
    pub connected: bool,
    /// Role of the current connection, if joined.
    pub role: Option<Role>,
}

/// Room state comparable with the real registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservableState {
    /// Whether the room exists.
    pub room_exists: bool,
    /// Current controller.
    pub controller: Option<ClientId>,
    /// Targets in join order.
    pub targets: Vec<ClientId>,
}

/// Messages a single operation delivers, in per-client send order.
pub type Deliveries = Vec<(ClientId, ServerMessage)>;

/// Model world.
#[derive(Debug, Clone)]
pub struct ModelWorld {
    clients: Vec<ModelClient>,
    controller: Option<ClientId>,
    targets: Vec<ClientId>,
}

impl ModelWorld {
    /// Create a world with `num_clients` disconnected clients.
    pub fn new(num_clients: usize) -> Self {
        Self {
            clients: vec![ModelClient::default(); num_clients],
            controller: None,
            targets: Vec::new(),
        }
    }

    /// Number of clients in the world.
    pub fn num_clients(&self) -> usize {
        self.clients.len()
    }

    /// Client by ID.
    pub fn client(&self, id: ClientId) -> Option<&ModelClient> {
        self.clients.get(usize::from(id))
    }

    /// Observable room state.
    pub fn observable(&self) -> ObservableState {
        ObservableState {
            room_exists: self.controller.is_some() || !self.targets.is_empty(),
            controller: self.controller,
            targets: self.targets.clone(),
        }
    }

    /// Apply an operation, returning what each client should receive.
    ///
    /// Operations on a disconnected client (other than `Connect`) are no-ops.
    pub fn apply(&mut self, op: &Operation) -> Deliveries {
        let id = op.client_id();
        let Some(client) = self.clients.get(usize::from(id)).copied() else {
            return Vec::new();
        };

        if !client.connected {
            if let Operation::Connect { .. } = op {
                self.clients[usize::from(id)] = ModelClient { connected: true, role: None };
            }
            return Vec::new();
        }

        match *op {
            Operation::Connect { .. } | Operation::Garbage { .. } | Operation::UnknownKind { .. } => {
                Vec::new()
            },
            Operation::Ping { .. } => vec![(id, ServerMessage::Pong)],
            Operation::ControllerJoin { valid_code, .. } => {
                self.join(id, client, Role::Controller, valid_code)
            },
            Operation::TargetJoin { valid_code, .. } => {
                self.join(id, client, Role::Target, valid_code)
            },
            Operation::Relay { tag, .. } => self.relay(id, client, tag),
            Operation::Disconnect { .. } => self.disconnect(id, client),
        }
    }

    fn join(&mut self, id: ClientId, client: ModelClient, role: Role, valid: bool) -> Deliveries {
        if !valid {
            return vec![(id, ServerMessage::error("Invalid room code"))];
        }
        if let Some(existing) = client.role {
            return vec![(id, ServerMessage::error(format!("already joined as {existing}")))];
        }

        self.clients[usize::from(id)].role = Some(role);
        let mut out = Vec::new();

        match role {
            Role::Controller => {
                self.controller = Some(id);
                let count = self.targets.len();
                out.push((id, ServerMessage::target_count(count)));
                out.push((id, if count > 0 {
                    ServerMessage::target_acquired(count)
                } else {
                    ServerMessage::waiting_for_target()
                }));
            },
            Role::Target => {
                self.targets.push(id);
                let count = self.targets.len();
                out.push((id, ServerMessage::connected()));
                if let Some(controller) = self.controller {
                    out.push((controller, ServerMessage::target_count(count)));
                    out.push((controller, ServerMessage::target_acquired(count)));
                }
            },
        }
        out
    }

    fn relay(&self, id: ClientId, client: ModelClient, tag: u8) -> Deliveries {
        if client.role != Some(Role::Controller) {
            return vec![(id, ServerMessage::error("Only controllers may relay messages"))];
        }
        if self.controller != Some(id) {
            return vec![(
                id,
                ServerMessage::error("Only the room's active controller may relay messages"),
            )];
        }
        if self.targets.is_empty() {
            return vec![(id, ServerMessage::error("No targets connected"))];
        }

        let mut out: Deliveries = self
            .targets
            .iter()
            .map(|target| (*target, ServerMessage::relayed(relay_payload(tag))))
            .collect();
        out.push((id, ServerMessage::delivery_receipt(self.targets.len(), self.targets.len())));
        out
    }

    fn disconnect(&mut self, id: ClientId, client: ModelClient) -> Deliveries {
        self.clients[usize::from(id)] = ModelClient::default();
        let mut out = Vec::new();

        match client.role {
            Some(Role::Controller) if self.controller == Some(id) => {
                self.controller = None;
                for target in &self.targets {
                    out.push((*target, ServerMessage::controller_disconnected()));
                }
            },
            Some(Role::Target) => {
                self.targets.retain(|t| *t != id);
                let count = self.targets.len();
                if let Some(controller) = self.controller {
                    out.push((controller, ServerMessage::target_count(count)));
                    out.push((controller, if count > 0 {
                        ServerMessage::target_update(count)
                    } else {
                        ServerMessage::target_lost()
                    }));
                }
            },
            _ => {},
        }
        out
    }
}
