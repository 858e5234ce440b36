//! Fuzz target for frame decoding
//!
//! The receive loop feeds socket bytes straight into `FrameCodec::decode`;
//! hostile peers control every byte after the length prefix.
//!
//! # Invariants
//!
//! - All decode failures are structured errors, never panics
//! - A successful decode consumes `2 + declared` bytes exactly
//! - Encode followed by decode with a paired codec is the identity

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use reborn_proto::FrameCodec;

#[derive(Debug, Arbitrary)]
struct Input {
    key: u8,
    wire: Vec<u8>,
    payload: Vec<u8>,
}

fuzz_target!(|input: Input| {
    // Arbitrary wire bytes: decode must never panic.
    let mut codec = FrameCodec::new(input.key);
    if let Ok((_, consumed)) = codec.decode(&input.wire) {
        assert!(consumed >= 3);
        assert!(consumed <= input.wire.len());
    }

    // Round trip through a fresh pair.
    if input.payload.len() < 60_000 {
        let mut tx = FrameCodec::new(input.key);
        let mut rx = FrameCodec::new(input.key);
        let frame = tx.encode(&input.payload).expect("bounded payload encodes");
        let (inner, consumed) = rx.decode(&frame).expect("own frames decode");
        assert_eq!(consumed, frame.len());
        assert_eq!(inner, input.payload);
    }
});
