//! Fuzz target for the relay driver event loop
//!
//! # Strategy
//!
//! Arbitrary operation sequences (connects, joins with valid and invalid
//! codes, relays, pings, garbage and disconnects) are applied to both the
//! reference model and a simulated server.
//!
//! # Invariants
//!
//! - Every client receives exactly the messages the model predicts
//! - The room's controller and targets match the model after each step
//! - Structural invariants (occupancy, exclusive membership, session/room
//!   agreement) hold after every event

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tether_harness::{InvariantRegistry, ModelWorld, Operation, SimServer};

const NUM_CLIENTS: usize = 6;

#[derive(Debug, Arbitrary)]
struct Scenario {
    seed: u64,
    operations: Vec<Operation>,
}

fuzz_target!(|scenario: Scenario| {
    let mut model = ModelWorld::new(NUM_CLIENTS);
    let mut server =
        SimServer::new("fuzz-secret", scenario.seed).with_invariants(InvariantRegistry::standard());

    for op in scenario.operations.into_iter().take(256) {
        let op = op.for_world(NUM_CLIENTS);

        let mut expected = std::collections::HashMap::new();
        for (client_id, message) in model.apply(&op) {
            expected.entry(client_id).or_insert_with(Vec::new).push(message);
        }
        let actual = server.apply(&op).expect("driver rejected a model operation");

        assert_eq!(actual, expected, "delivery mismatch at {op:?}");

        let room = server.driver().rooms().get(&server.room_id());
        let observed = model.observable();
        assert_eq!(room.is_some(), observed.room_exists, "room existence mismatch at {op:?}");
        if let Some(room) = room {
            assert_eq!(room.target_count(), observed.targets.len(), "target count mismatch at {op:?}");
            assert_eq!(room.controller().is_some(), observed.controller.is_some());
        }
    }
});
