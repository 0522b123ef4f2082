//! Property-based tests for message decoding.
//!
//! Decoding runs on untrusted input from every connection, so these tests
//! check that it is total (never panics) and that the ignore/discard split is
//! stable for all inputs, not just hand-picked examples.

use proptest::prelude::*;
use serde_json::{Value, json};
use tether_proto::{ClientMessage, ServerMessage};

/// Strategy for arbitrary JSON payloads (bounded depth)
fn arbitrary_payload() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-zA-Z0-9 ]{0,16}".prop_map(Value::String),
    ];

    leaf.prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::hash_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

const KNOWN_KINDS: [&str; 4] = ["controller_join", "target_join", "relay_message", "ping"];

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Property: decoding arbitrary text never panics
    #[test]
    fn prop_decode_arbitrary_text_never_panics(text in ".{0,256}") {
        let _ = ClientMessage::decode(&text);
    }

    /// Property: any object with an unrecognised string `type` is Unknown
    #[test]
    fn prop_unknown_kind_decodes_as_unknown(
        kind in "[a-z_]{1,20}",
        extra in arbitrary_payload()
    ) {
        prop_assume!(!KNOWN_KINDS.contains(&kind.as_str()));

        let text = json!({"type": kind, "extra": extra}).to_string();
        prop_assert_eq!(ClientMessage::decode(&text)?, ClientMessage::Unknown);
    }

    /// Property: relay payloads are delivered untouched
    #[test]
    fn prop_relay_payload_preserved(payload in arbitrary_payload()) {
        let text = json!({"type": "relay_message", "payload": payload.clone()}).to_string();

        match ClientMessage::decode(&text)? {
            ClientMessage::RelayMessage { payload: decoded } => prop_assert_eq!(decoded, payload),
            other => prop_assert!(false, "unexpected decode: {:?}", other),
        }
    }

    /// Property: the relayed wrapper carries the payload under `payload`
    #[test]
    fn prop_relayed_wrapper_shape(payload in arbitrary_payload()) {
        let text = ServerMessage::relayed(payload.clone()).encode()?;
        let value: Value = serde_json::from_str(&text)?;

        prop_assert_eq!(&value["type"], &json!("prank_message"));
        prop_assert_eq!(&value["payload"], &payload);
    }

    /// Property: join messages keep the room code byte-for-byte
    #[test]
    fn prop_room_code_preserved(code in ".{0,64}") {
        let text = json!({"type": "target_join", "roomCode": code.clone()}).to_string();
        prop_assert_eq!(
            ClientMessage::decode(&text)?,
            ClientMessage::TargetJoin { room_code: code }
        );
    }
}
