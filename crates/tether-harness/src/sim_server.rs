//! Simulated relay server.
//!
//! Wraps a [`RelayDriver`] with [`SimEnv`] and [`SimHandle`]s so tests can
//! connect clients, send messages and disconnect without any I/O. Every
//! event can optionally be followed by an invariant check.

use std::collections::HashMap;

use tether_core::RoomSecret;
use tether_proto::{ClientMessage, ProtocolError, RoomId, ServerMessage};
use tether_server::{DriverError, RelayConfig, RelayDriver, ServerAction, ServerEvent};

use crate::{
    invariants::{InvariantRegistry, SystemSnapshot},
    model::{ClientId, Operation},
    sim_env::SimEnv,
    sim_handle::SimHandle,
};

/// Error type for the simulated server.
#[derive(Debug)]
pub enum SimError {
    /// The driver rejected an event.
    Driver(DriverError),
    /// A client message could not be encoded.
    Encode(ProtocolError),
}

impl std::fmt::Display for SimError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Driver(e) => write!(f, "SimError: driver: {e}"),
            Self::Encode(e) => write!(f, "SimError: encode: {e}"),
        }
    }
}

impl std::error::Error for SimError {}

impl From<DriverError> for SimError {
    fn from(err: DriverError) -> Self {
        Self::Driver(err)
    }
}

impl From<ProtocolError> for SimError {
    fn from(err: ProtocolError) -> Self {
        Self::Encode(err)
    }
}

/// A connected simulated client.
#[derive(Debug, Clone)]
pub struct SimClient {
    /// Session ID assigned by the driver
    pub session_id: u64,
    /// Recording handle shared with the driver
    pub handle: SimHandle,
}

/// In-memory relay server.
pub struct SimServer {
    driver: RelayDriver<SimEnv, SimHandle>,
    secret: String,
    invariants: Option<InvariantRegistry>,
    /// Every action the driver returned, in order
    actions: Vec<ServerAction>,
    /// Model client ID to live client
    clients: HashMap<ClientId, SimClient>,
}

impl SimServer {
    /// Create a server with `secret` and a seeded environment.
    pub fn new(secret: &str, seed: u64) -> Self {
        let config = RelayConfig { room_secret: RoomSecret::new(secret), ..Default::default() };
        Self::with_config(config, secret, seed)
    }

    /// Create a server from an explicit driver configuration.
    pub fn with_config(config: RelayConfig, secret: &str, seed: u64) -> Self {
        Self {
            driver: RelayDriver::new(SimEnv::with_seed(seed), config),
            secret: secret.to_string(),
            invariants: None,
            actions: Vec::new(),
            clients: HashMap::new(),
        }
    }

    /// Check `registry` after every event.
    #[must_use]
    pub fn with_invariants(mut self, registry: InvariantRegistry) -> Self {
        self.invariants = Some(registry);
        self
    }

    /// The room every valid join lands in.
    pub fn room_id(&self) -> RoomId {
        RoomId::new(self.secret.as_str())
    }

    /// Underlying driver.
    pub fn driver(&self) -> &RelayDriver<SimEnv, SimHandle> {
        &self.driver
    }

    /// Snapshot of the current driver state.
    pub fn snapshot(&self) -> SystemSnapshot {
        SystemSnapshot::from_driver(&self.driver)
    }

    /// Every action returned so far.
    pub fn actions(&self) -> &[ServerAction] {
        &self.actions
    }

    /// Process one event, recording actions and checking invariants.
    pub fn process(&mut self, event: ServerEvent<SimHandle>) -> Result<(), SimError> {
        let label = match &event {
            ServerEvent::ConnectionAccepted { session_id, .. } => format!("accept {session_id}"),
            ServerEvent::MessageReceived { session_id, .. } => format!("message from {session_id}"),
            ServerEvent::ConnectionClosed { session_id, .. } => format!("close {session_id}"),
        };

        let actions = self.driver.process_event(event)?;
        self.actions.extend(actions);

        if let Some(registry) = &self.invariants {
            registry.assert_all(&self.snapshot(), &format!("after {label}"));
        }
        Ok(())
    }

    /// Accept a new connection.
    pub fn connect(&mut self) -> Result<SimClient, SimError> {
        self.connect_with(SimHandle::new())
    }

    /// Accept a new connection using `handle`.
    pub fn connect_with(&mut self, handle: SimHandle) -> Result<SimClient, SimError> {
        let session_id = self.driver.allocate_session_id();
        self.process(ServerEvent::ConnectionAccepted { session_id, handle: handle.clone() })?;
        Ok(SimClient { session_id, handle })
    }

    /// Deliver raw text from a client.
    pub fn send_text(&mut self, session_id: u64, text: impl Into<String>) -> Result<(), SimError> {
        self.process(ServerEvent::MessageReceived { session_id, text: text.into() })
    }

    /// Encode and deliver a message from a client.
    pub fn send(&mut self, session_id: u64, message: &ClientMessage) -> Result<(), SimError> {
        let text = message.encode()?;
        self.send_text(session_id, text)
    }

    /// Join `session_id` as controller with the configured secret.
    pub fn join_controller(&mut self, session_id: u64) -> Result<(), SimError> {
        let room_code = self.secret.clone();
        self.send(session_id, &ClientMessage::ControllerJoin { room_code })
    }

    /// Join `session_id` as target with the configured secret.
    pub fn join_target(&mut self, session_id: u64) -> Result<(), SimError> {
        let room_code = self.secret.clone();
        self.send(session_id, &ClientMessage::TargetJoin { room_code })
    }

    /// Close a connection.
    pub fn disconnect(&mut self, session_id: u64) -> Result<(), SimError> {
        self.process(ServerEvent::ConnectionClosed {
            session_id,
            reason: "simulated close".to_string(),
        })
    }

    /// Apply a model operation to the real driver.
    ///
    /// Returns, for each model client, the messages it received during the
    /// operation. Operations on disconnected clients (other than `Connect`)
    /// are no-ops, matching the model.
    pub fn apply(
        &mut self,
        op: &Operation,
    ) -> Result<HashMap<ClientId, Vec<ServerMessage>>, SimError> {
        let client_id = op.client_id();

        match (op, self.clients.get(&client_id).map(|c| c.session_id)) {
            (Operation::Connect { .. }, None) => {
                let client = self.connect()?;
                self.clients.insert(client_id, client);
            },
            (Operation::Disconnect { .. }, Some(session_id)) => {
                self.clients.remove(&client_id);
                self.disconnect(session_id)?;
            },
            (_, Some(session_id)) => {
                if let Some(text) = op.wire_text(&self.secret) {
                    self.send_text(session_id, text)?;
                }
            },
            (_, None) => {},
        }

        Ok(self.drain_clients())
    }

    /// Model client ID of a session, if it is a live model client.
    pub fn client_for_session(&self, session_id: u64) -> Option<ClientId> {
        self.clients.iter().find(|(_, c)| c.session_id == session_id).map(|(id, _)| *id)
    }

    fn drain_clients(&self) -> HashMap<ClientId, Vec<ServerMessage>> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.handle.drain()))
            .filter(|(_, messages)| !messages.is_empty())
            .collect()
    }
}

impl std::fmt::Debug for SimServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimServer")
            .field("driver", &self.driver)
            .field("clients", &self.clients.len())
            .finish_non_exhaustive()
    }
}
