//! Fuzz target for the player-property stream decoder
//!
//! Property streams arrive inside otherplprops/playerprops bodies and are
//! fully attacker-controlled.
//!
//! # Invariants
//!
//! - Decoding never panics; failures are structured errors
//! - A fully decoded stream (no unknown id) re-encodes without panicking

#![no_main]

use libfuzzer_sys::fuzz_target;
use reborn_proto::{decode_props, encode_props};

fuzz_target!(|body: Vec<u8>| {
    if let Ok(stream) = decode_props(&body) {
        if stream.unknown.is_none() {
            let _ = encode_props(&stream.props);
        }
    }
});
