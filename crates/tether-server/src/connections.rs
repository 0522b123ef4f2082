//! Live connection table.
//!
//! Owns the [`Session`] and [`ConnectionHandle`] of every accepted connection,
//! keyed by session ID. Rooms refer to connections by session ID only; all
//! sends go through this table so a vanished connection surfaces as a
//! [`SendError`] instead of a dangling reference.

use std::collections::HashMap;

use tether_core::{ConnectionHandle, SendError, Session};
use tether_proto::ServerMessage;

use crate::driver::{LogLevel, ServerAction};

/// One live connection.
#[derive(Debug)]
pub struct ConnectionEntry<H> {
    /// Protocol state
    pub session: Session,
    /// Outbound half of the transport
    pub handle: H,
}

/// Outcome of sending to one recipient during a fan-out.
#[derive(Debug)]
pub struct Delivery {
    /// Recipient session
    pub session_id: u64,
    /// Send result
    pub outcome: Result<(), SendError>,
}

impl Delivery {
    /// Whether the message was handed to the recipient's transport.
    pub fn is_delivered(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Table of live connections.
#[derive(Debug)]
pub struct ConnectionTable<H> {
    entries: HashMap<u64, ConnectionEntry<H>>,
}

impl<H> Default for ConnectionTable<H> {
    fn default() -> Self {
        Self { entries: HashMap::new() }
    }
}

impl<H: ConnectionHandle> ConnectionTable<H> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection with an unjoined session.
    ///
    /// Returns `false` (and drops nothing) if the ID is already taken.
    pub fn insert(&mut self, session_id: u64, handle: H) -> bool {
        if self.entries.contains_key(&session_id) {
            return false;
        }
        self.entries.insert(session_id, ConnectionEntry { session: Session::new(), handle });
        true
    }

    /// Remove a connection, returning its entry.
    pub fn remove(&mut self, session_id: u64) -> Option<ConnectionEntry<H>> {
        self.entries.remove(&session_id)
    }

    /// Session of a connection. `None` if it doesn't exist.
    pub fn session(&self, session_id: u64) -> Option<&Session> {
        self.entries.get(&session_id).map(|e| &e.session)
    }

    /// Mutable session of a connection. `None` if it doesn't exist.
    pub fn session_mut(&mut self, session_id: u64) -> Option<&mut Session> {
        self.entries.get_mut(&session_id).map(|e| &mut e.session)
    }

    /// Check if a connection is registered.
    pub fn contains(&self, session_id: u64) -> bool {
        self.entries.contains_key(&session_id)
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no connections are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All live sessions.
    pub fn sessions(&self) -> impl Iterator<Item = (u64, &Session)> + '_ {
        self.entries.iter().map(|(id, e)| (*id, &e.session))
    }

    /// Send to one connection.
    ///
    /// An unknown session is reported as [`SendError::Closed`].
    pub fn send(&self, session_id: u64, message: &ServerMessage) -> Result<(), SendError> {
        match self.entries.get(&session_id) {
            Some(entry) => entry.handle.send(message),
            None => Err(SendError::Closed),
        }
    }

    /// Send to one connection, recording a warning on failure.
    ///
    /// Returns `true` if the message was handed to the transport.
    pub fn notify(
        &self,
        session_id: u64,
        message: &ServerMessage,
        actions: &mut Vec<ServerAction>,
    ) -> bool {
        match self.send(session_id, message) {
            Ok(()) => true,
            Err(e) => {
                actions.push(ServerAction::Log {
                    level: LogLevel::Warn,
                    message: format!(
                        "failed to send {} to session {}: {}",
                        message.kind(),
                        session_id,
                        e
                    ),
                });
                false
            },
        }
    }

    /// Send `message` to every recipient, attempting all of them.
    ///
    /// One failed recipient never stops delivery to the rest.
    pub fn fan_out(&self, recipients: &[u64], message: &ServerMessage) -> Vec<Delivery> {
        recipients
            .iter()
            .map(|&session_id| Delivery { session_id, outcome: self.send(session_id, message) })
            .collect()
    }
}

/// Count successful deliveries, recording a warning for each failure.
pub fn tally_deliveries(
    deliveries: &[Delivery],
    kind: &str,
    actions: &mut Vec<ServerAction>,
) -> usize {
    let mut delivered = 0;
    for delivery in deliveries {
        match &delivery.outcome {
            Ok(()) => delivered += 1,
            Err(e) => actions.push(ServerAction::Log {
                level: LogLevel::Warn,
                message: format!("failed to send {} to session {}: {}", kind, delivery.session_id, e),
            }),
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tether_core::Role;
    use tether_proto::RoomId;

    use super::*;

    #[derive(Debug, Clone, Default)]
    struct TestHandle {
        sent: Arc<Mutex<Vec<ServerMessage>>>,
        broken: bool,
    }

    impl ConnectionHandle for TestHandle {
        fn send(&self, message: &ServerMessage) -> Result<(), SendError> {
            if self.broken {
                return Err(SendError::Closed);
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    #[test]
    fn insert_duplicate_fails() {
        let mut table = ConnectionTable::new();
        assert!(table.insert(1, TestHandle::default()));
        assert!(!table.insert(1, TestHandle::default()));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn new_connection_is_unjoined() {
        let mut table = ConnectionTable::new();
        table.insert(1, TestHandle::default());
        assert!(!table.session(1).unwrap().is_joined());
    }

    #[test]
    fn session_mut_updates_in_place() {
        let mut table = ConnectionTable::new();
        table.insert(1, TestHandle::default());

        table.session_mut(1).unwrap().join(Role::Target, RoomId::new("r")).unwrap();

        assert_eq!(table.session(1).unwrap().role(), Some(Role::Target));
    }

    #[test]
    fn send_to_unknown_session_is_closed() {
        let table: ConnectionTable<TestHandle> = ConnectionTable::new();
        assert!(matches!(table.send(9, &ServerMessage::Pong), Err(SendError::Closed)));
    }

    #[test]
    fn notify_logs_failure() {
        let mut table = ConnectionTable::new();
        table.insert(1, TestHandle { broken: true, ..Default::default() });

        let mut actions = Vec::new();
        assert!(!table.notify(1, &ServerMessage::Pong, &mut actions));
        assert!(matches!(actions[0], ServerAction::Log { level: LogLevel::Warn, .. }));
    }

    #[test]
    fn fan_out_attempts_every_recipient() {
        let good = TestHandle::default();
        let mut table = ConnectionTable::new();
        table.insert(1, good.clone());
        table.insert(2, TestHandle { broken: true, ..Default::default() });
        table.insert(3, good.clone());

        let deliveries = table.fan_out(&[1, 2, 3, 4], &ServerMessage::Pong);

        let delivered: Vec<_> =
            deliveries.iter().filter(|d| d.is_delivered()).map(|d| d.session_id).collect();
        assert_eq!(delivered, vec![1, 3]);
        assert_eq!(good.sent.lock().unwrap().len(), 2);

        let mut actions = Vec::new();
        assert_eq!(tally_deliveries(&deliveries, "pong", &mut actions), 2);
        assert_eq!(actions.len(), 2);
    }
}
