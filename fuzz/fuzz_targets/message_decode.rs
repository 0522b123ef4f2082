//! Fuzz target for client and server message decoding
//!
//! Feeds arbitrary text to both decoders. Decoding must never panic, and
//! anything that decodes must encode again and still decode.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tether_proto::{ClientMessage, ServerMessage};

fuzz_target!(|text: &str| {
    if let Ok(message) = ClientMessage::decode(text) {
        let encoded = message.encode().expect("decoded message must encode");
        assert!(ClientMessage::decode(&encoded).is_ok(), "re-encoded message failed: {encoded}");
    }

    let _ = ServerMessage::decode(text);
});
