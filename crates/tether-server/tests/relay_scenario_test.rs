//! End-to-end relay scenarios against the driver.
//!
//! Each test walks a full session lifecycle through the simulated server and
//! checks exactly what every connection receives, in order.

use serde_json::json;
use tether_harness::{InvariantRegistry, SimServer};
use tether_proto::{ClientMessage, RoomId, ServerMessage};

const SECRET: &str = "R";

fn server() -> SimServer {
    SimServer::new(SECRET, 0x7e7e).with_invariants(InvariantRegistry::standard())
}

#[test]
fn controller_target_relay_lifecycle() {
    let mut server = server();
    let controller = server.connect().unwrap();
    let target = server.connect().unwrap();
    let room = RoomId::new(SECRET);

    server.join_controller(controller.session_id).unwrap();
    assert_eq!(controller.handle.drain(), vec![
        ServerMessage::target_count(0),
        ServerMessage::waiting_for_target(),
    ]);

    server.join_target(target.session_id).unwrap();
    assert_eq!(target.handle.drain(), vec![ServerMessage::connected()]);
    assert_eq!(controller.handle.drain(), vec![
        ServerMessage::target_count(1),
        ServerMessage::target_acquired(1),
    ]);

    server
        .send(controller.session_id, &ClientMessage::RelayMessage { payload: json!({"type": "X"}) })
        .unwrap();
    assert_eq!(target.handle.drain(), vec![ServerMessage::relayed(json!({"type": "X"}))]);
    assert_eq!(controller.handle.drain(), vec![ServerMessage::delivery_receipt(1, 1)]);

    server.disconnect(target.session_id).unwrap();
    assert_eq!(controller.handle.drain(), vec![
        ServerMessage::target_count(0),
        ServerMessage::target_lost(),
    ]);
    assert!(server.driver().rooms().contains(&room));

    server.disconnect(controller.session_id).unwrap();
    assert!(!server.driver().rooms().contains(&room));
    assert_eq!(server.driver().connection_count(), 0);
}

#[test]
fn relayed_payload_reaches_wire_unchanged() {
    let mut server = server();
    let controller = server.connect().unwrap();
    let target = server.connect().unwrap();
    server.join_controller(controller.session_id).unwrap();
    server.join_target(target.session_id).unwrap();
    target.handle.drain();

    server
        .send_text(
            controller.session_id,
            r#"{"type":"relay_message","payload":{"type":"X","nested":{"list":[1,"two",null]}}}"#,
        )
        .unwrap();

    let received = target.handle.drain();
    assert_eq!(received.len(), 1);
    let wire: serde_json::Value = serde_json::from_str(&received[0].encode().unwrap()).unwrap();
    assert_eq!(
        wire,
        json!({"type": "prank_message", "payload": {"type": "X", "nested": {"list": [1, "two", null]}}})
    );
}

#[test]
fn controller_leaving_mid_session_then_rejoining() {
    let mut server = server();
    let first = server.connect().unwrap();
    let target = server.connect().unwrap();
    server.join_controller(first.session_id).unwrap();
    server.join_target(target.session_id).unwrap();
    target.handle.drain();

    server.disconnect(first.session_id).unwrap();
    assert_eq!(target.handle.drain(), vec![ServerMessage::controller_disconnected()]);
    assert_eq!(server.driver().rooms().get(&server.room_id()).unwrap().controller(), None);

    let second = server.connect().unwrap();
    server.join_controller(second.session_id).unwrap();
    assert_eq!(second.handle.drain(), vec![
        ServerMessage::target_count(1),
        ServerMessage::target_acquired(1),
    ]);

    server
        .send(second.session_id, &ClientMessage::RelayMessage { payload: json!("again") })
        .unwrap();
    assert_eq!(target.handle.drain(), vec![ServerMessage::relayed(json!("again"))]);
}

#[test]
fn last_joiner_becomes_controller() {
    let mut server = server();
    let old = server.connect().unwrap();
    let new = server.connect().unwrap();
    let target = server.connect().unwrap();
    server.join_controller(old.session_id).unwrap();
    server.join_target(target.session_id).unwrap();
    old.handle.drain();

    server.join_controller(new.session_id).unwrap();

    // The replaced controller is neither told nor closed
    assert!(old.handle.drain().is_empty());
    assert!(server.driver().has_session(old.session_id));
    assert_eq!(
        server.driver().rooms().get(&server.room_id()).unwrap().controller(),
        Some(new.session_id)
    );

    target.handle.drain();
    server.disconnect(target.session_id).unwrap();
    assert_eq!(new.handle.drain(), vec![
        ServerMessage::target_count(1),
        ServerMessage::target_acquired(1),
        ServerMessage::target_count(0),
        ServerMessage::target_lost(),
    ]);
    assert!(old.handle.drain().is_empty());
}

#[test]
fn ping_yields_pong_in_every_state() {
    let mut server = server();
    let unjoined = server.connect().unwrap();
    let controller = server.connect().unwrap();
    let target = server.connect().unwrap();
    server.join_controller(controller.session_id).unwrap();
    server.join_target(target.session_id).unwrap();

    for client in [&unjoined, &controller, &target] {
        client.handle.drain();
        server.send(client.session_id, &ClientMessage::Ping).unwrap();
    }

    for client in [&unjoined, &controller, &target] {
        assert_eq!(client.handle.drain(), vec![ServerMessage::Pong]);
    }
}

#[test]
fn malformed_input_keeps_connection_open() {
    let mut server = server();
    let client = server.connect().unwrap();

    for text in ["", "null", "[]", "{}", r#"{"type":7}"#, r#"{"type":"target_join"}"#, "\u{0}"] {
        server.send_text(client.session_id, text).unwrap();
    }

    assert!(client.handle.drain().is_empty());
    assert!(server.driver().has_session(client.session_id));

    server.join_target(client.session_id).unwrap();
    assert_eq!(client.handle.drain(), vec![ServerMessage::connected()]);
}

#[test]
fn health_status_tracks_rooms_and_connections() {
    let mut server = server();
    let controller = server.connect().unwrap();
    server.connect().unwrap();
    server.join_controller(controller.session_id).unwrap();

    let status = server.driver().status();
    assert_eq!((status.status, status.rooms, status.connections), ("online", 1, 2));
}
