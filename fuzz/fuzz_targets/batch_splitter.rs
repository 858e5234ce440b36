//! Fuzz target for logical-packet batch splitting
//!
//! The splitter is stateful (raw-data carves span frames); sequences of
//! hostile payloads must never panic or let the carve buffer run away.
//!
//! # Invariants
//!
//! - `split` never panics on any payload sequence
//! - Every produced packet is attributable to input bytes (no amplification)

#![no_main]

use libfuzzer_sys::fuzz_target;
use reborn_proto::BatchSplitter;

fuzz_target!(|payloads: Vec<Vec<u8>>| {
    let mut splitter = BatchSplitter::new();
    let total: usize = payloads.iter().map(Vec::len).sum();

    let mut produced = 0usize;
    for payload in &payloads {
        for packet in splitter.split(payload) {
            produced += 1 + packet.body.len();
        }
    }

    assert!(produced <= total + payloads.len());
});
