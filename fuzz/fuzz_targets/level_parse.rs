//! Fuzz target for the text file parsers
//!
//! Level files and gmap manifests come from file transfers, which a hostile
//! server fully controls.
//!
//! # Invariants
//!
//! - Parsers never panic on arbitrary text
//! - Parsed boards are exactly 64×64 with every id under 1024

#![no_main]

use libfuzzer_sys::fuzz_target;
use reborn_proto::board::{BOARD_TILES, TILE_MODULUS, parse_gmap, parse_level};

fuzz_target!(|text: String| {
    if let Ok(level) = parse_level(&text) {
        assert_eq!(level.tiles.len(), BOARD_TILES);
        assert!(level.tiles.iter().all(|&t| t < TILE_MODULUS));
    }

    if let Ok(gmap) = parse_gmap(&text) {
        assert_eq!(
            gmap.names.len(),
            usize::from(gmap.width) * usize::from(gmap.height)
        );
    }
});
