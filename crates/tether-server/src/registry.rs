//! Room registry.
//!
//! Maps room IDs to [`Room`] records. A room holds session IDs, never
//! connection handles: the driver owns handles and resolves IDs at send time,
//! so a connection can only be removed by identity.
//!
//! Rooms are created lazily by the first join and must be collected with
//! [`RoomRegistry::remove_if_empty`] after every mutation that can empty
//! them. A room with no controller and no targets never outlives the event
//! that emptied it.

use std::collections::HashMap;

use tether_proto::RoomId;

/// One room: at most one controller and an ordered set of targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Room {
    /// Authoritative controller session, if any
    controller: Option<u64>,
    /// Target sessions in join order (unique)
    targets: Vec<u64>,
}

impl Room {
    /// Create an empty room.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current controller session.
    pub fn controller(&self) -> Option<u64> {
        self.controller
    }

    /// Make `session_id` the controller, returning the one it replaced.
    ///
    /// Last joiner wins. The replaced session is not notified or closed.
    pub fn set_controller(&mut self, session_id: u64) -> Option<u64> {
        self.controller.replace(session_id)
    }

    /// Clear the controller if it is `session_id`.
    ///
    /// Returns `true` if it was cleared. A replaced controller leaving does
    /// not unseat its successor.
    pub fn clear_controller(&mut self, session_id: u64) -> bool {
        if self.controller == Some(session_id) {
            self.controller = None;
            true
        } else {
            false
        }
    }

    /// Target sessions in join order.
    pub fn targets(&self) -> &[u64] {
        &self.targets
    }

    /// Number of targets.
    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    /// Whether `session_id` is a target of this room.
    pub fn has_target(&self, session_id: u64) -> bool {
        self.targets.contains(&session_id)
    }

    /// Append a target. Returns `false` if it was already present.
    pub fn add_target(&mut self, session_id: u64) -> bool {
        if self.has_target(session_id) {
            return false;
        }
        self.targets.push(session_id);
        true
    }

    /// Remove exactly `session_id` from the targets, keeping the others in
    /// order. Returns `true` if it was present.
    pub fn remove_target(&mut self, session_id: u64) -> bool {
        let before = self.targets.len();
        self.targets.retain(|&t| t != session_id);
        self.targets.len() != before
    }

    /// No controller and no targets.
    pub fn is_empty(&self) -> bool {
        self.controller.is_none() && self.targets.is_empty()
    }
}

/// Registry of live rooms.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomId, Room>,
}

impl RoomRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing room, or a freshly created empty one.
    pub fn get_or_create(&mut self, room_id: RoomId) -> &mut Room {
        self.rooms.entry(room_id).or_default()
    }

    /// Room by ID. `None` if it does not exist.
    pub fn get(&self, room_id: &RoomId) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    /// Mutable room by ID. `None` if it does not exist.
    pub fn get_mut(&mut self, room_id: &RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(room_id)
    }

    /// Remove a room. Idempotent.
    pub fn remove(&mut self, room_id: &RoomId) -> Option<Room> {
        self.rooms.remove(room_id)
    }

    /// Remove the room if it has neither controller nor targets.
    ///
    /// Returns `true` if a room was removed.
    pub fn remove_if_empty(&mut self, room_id: &RoomId) -> bool {
        if self.rooms.get(room_id).is_some_and(Room::is_empty) {
            self.rooms.remove(room_id);
            true
        } else {
            false
        }
    }

    /// Check if a room exists.
    pub fn contains(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Number of live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// All live rooms.
    pub fn iter(&self) -> impl Iterator<Item = (&RoomId, &Room)> + '_ {
        self.rooms.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(name: &str) -> RoomId {
        RoomId::new(name)
    }

    #[test]
    fn get_or_create_creates_once() {
        let mut registry = RoomRegistry::new();

        registry.get_or_create(room("a")).add_target(1);
        registry.get_or_create(room("a")).add_target(2);

        assert_eq!(registry.room_count(), 1);
        assert_eq!(registry.get(&room("a")).unwrap().targets(), &[1, 2]);
    }

    #[test]
    fn get_missing_room_is_none() {
        let registry = RoomRegistry::new();
        assert!(registry.get(&room("nope")).is_none());
    }

    #[test]
    fn remove_is_idempotent() {
        let mut registry = RoomRegistry::new();
        registry.get_or_create(room("a")).set_controller(1);

        assert!(registry.remove(&room("a")).is_some());
        assert!(registry.remove(&room("a")).is_none());
        assert_eq!(registry.room_count(), 0);
    }

    #[test]
    fn remove_if_empty_keeps_occupied_rooms() {
        let mut registry = RoomRegistry::new();
        registry.get_or_create(room("a")).set_controller(1);
        registry.get_or_create(room("b"));

        assert!(!registry.remove_if_empty(&room("a")));
        assert!(registry.remove_if_empty(&room("b")));
        assert!(!registry.remove_if_empty(&room("missing")));

        assert!(registry.contains(&room("a")));
        assert!(!registry.contains(&room("b")));
    }

    #[test]
    fn set_controller_returns_replaced() {
        let mut r = Room::new();
        assert_eq!(r.set_controller(1), None);
        assert_eq!(r.set_controller(2), Some(1));
        assert_eq!(r.controller(), Some(2));
    }

    #[test]
    fn clear_controller_only_for_current() {
        let mut r = Room::new();
        r.set_controller(1);
        r.set_controller(2);

        assert!(!r.clear_controller(1));
        assert_eq!(r.controller(), Some(2));

        assert!(r.clear_controller(2));
        assert_eq!(r.controller(), None);
    }

    #[test]
    fn add_target_rejects_duplicates() {
        let mut r = Room::new();
        assert!(r.add_target(7));
        assert!(!r.add_target(7));
        assert_eq!(r.target_count(), 1);
    }

    #[test]
    fn remove_middle_target_preserves_order() {
        let mut r = Room::new();
        for id in [10, 20, 30, 40] {
            r.add_target(id);
        }

        assert!(r.remove_target(20));
        assert_eq!(r.targets(), &[10, 30, 40]);

        assert!(!r.remove_target(20));
        assert_eq!(r.target_count(), 3);
    }

    #[test]
    fn empty_means_no_controller_and_no_targets() {
        let mut r = Room::new();
        assert!(r.is_empty());

        r.add_target(1);
        assert!(!r.is_empty());

        r.remove_target(1);
        r.set_controller(2);
        assert!(!r.is_empty());

        r.clear_controller(2);
        assert!(r.is_empty());
    }
}
