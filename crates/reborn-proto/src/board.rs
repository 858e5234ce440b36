//! Board, level-file, and GMAP manifest codecs.
//!
//! A board is the 64×64 grid of u16 tile ids forming a level's terrain. It
//! travels two ways: as 8192 bytes of little-endian u16s inside a raw-data
//! carve (the board packet), and as text in `GLEVNW01` level files where each
//! tile is two characters from the base64 alphabet. Tile ids are normalized
//! modulo 1024 on every decode path.
//!
//! GMAP manifests are small text files declaring a `WIDTH` × `HEIGHT` grid of
//! child level names; the session treats the whole grid as one logical level.

use crate::errors::{ProtocolError, Result};

/// Tiles per board edge.
pub const BOARD_SIZE: usize = 64;

/// Tiles per board.
pub const BOARD_TILES: usize = BOARD_SIZE * BOARD_SIZE;

/// Bytes in a wire-encoded board.
pub const BOARD_BYTES: usize = BOARD_TILES * 2;

/// Tile ids wrap at this bound.
pub const TILE_MODULUS: u16 = 1024;

/// Character alphabet of text-encoded tiles (standard base64 order).
pub const TILE_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Index of a tile character in the alphabet.
#[must_use]
pub fn tile_char_index(c: u8) -> Option<u16> {
    match c {
        b'A'..=b'Z' => Some(u16::from(c - b'A')),
        b'a'..=b'z' => Some(u16::from(c - b'a') + 26),
        b'0'..=b'9' => Some(u16::from(c - b'0') + 52),
        b'+' => Some(62),
        b'/' => Some(63),
        _ => None,
    }
}

/// Decode one two-character tile pair.
pub fn decode_tile_pair(c1: u8, c2: u8) -> Result<u16> {
    let hi = tile_char_index(c1)
        .ok_or_else(|| ProtocolError::BadLevel(format!("invalid tile character {:?}", c1 as char)))?;
    let lo = tile_char_index(c2)
        .ok_or_else(|| ProtocolError::BadLevel(format!("invalid tile character {:?}", c2 as char)))?;
    Ok((hi * 64 + lo) % TILE_MODULUS)
}

/// Encode one tile id as its two-character pair.
#[must_use]
pub fn encode_tile_pair(tile: u16) -> [u8; 2] {
    let tile = tile % TILE_MODULUS;
    [TILE_ALPHABET[usize::from(tile / 64)], TILE_ALPHABET[usize::from(tile % 64)]]
}

/// Decode a run of text-encoded tiles (two characters each).
pub fn decode_tile_run(encoded: &str) -> Result<Vec<u16>> {
    let bytes = encoded.as_bytes();
    if bytes.len() % 2 != 0 {
        return Err(ProtocolError::BadLevel(format!("odd tile run length {}", bytes.len())));
    }
    bytes.chunks_exact(2).map(|pair| decode_tile_pair(pair[0], pair[1])).collect()
}

/// Decode the 8192-byte wire board into 4096 tile ids.
pub fn decode_board(data: &[u8]) -> Result<Vec<u16>> {
    if data.len() != BOARD_BYTES {
        return Err(ProtocolError::BadPacket(format!(
            "board data is {} bytes, expected {BOARD_BYTES}",
            data.len()
        )));
    }
    Ok(data
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]) % TILE_MODULUS)
        .collect())
}

/// Encode 4096 tile ids as the 8192-byte wire board.
#[must_use]
pub fn encode_board(tiles: &[u16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(BOARD_BYTES);
    for tile in tiles.iter().take(BOARD_TILES) {
        out.extend_from_slice(&(tile % TILE_MODULUS).to_le_bytes());
    }
    out.resize(BOARD_BYTES, 0);
    out
}

/// A sign parsed from a level file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelSign {
    /// Tile column.
    pub x: u8,
    /// Tile row.
    pub y: u8,
    /// Sign text, newline-joined.
    pub text: String,
}

/// A warp link parsed from a level file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelLink {
    /// Destination level name.
    pub dest: String,
    /// Link rectangle origin column.
    pub x: u8,
    /// Link rectangle origin row.
    pub y: u8,
    /// Link rectangle width in tiles.
    pub w: u8,
    /// Link rectangle height in tiles.
    pub h: u8,
    /// Destination X: a number or the token `playerx`.
    pub dest_x: String,
    /// Destination Y: a number or the token `playery`.
    pub dest_y: String,
}

/// A chest parsed from a level file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelChest {
    /// Tile column.
    pub x: u8,
    /// Tile row.
    pub y: u8,
    /// Item type token.
    pub item: String,
    /// Sign text shown when opened.
    pub sign: String,
}

/// An NPC instance parsed from a level file. The script is opaque.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelNpc {
    /// Image file name (`-` for none).
    pub image: String,
    /// Tile column, half-tile precision.
    pub x: f32,
    /// Tile row, half-tile precision.
    pub y: f32,
    /// Script body, unparsed.
    pub script: String,
}

/// A parsed `GLEVNW01` level file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LevelFile {
    /// 4096 tile ids, row-major.
    pub tiles: Vec<u16>,
    /// Signs.
    pub signs: Vec<LevelSign>,
    /// Warp links.
    pub links: Vec<LevelLink>,
    /// Chests.
    pub chests: Vec<LevelChest>,
    /// NPC instances.
    pub npcs: Vec<LevelNpc>,
}

/// File header of the text level format.
pub const LEVEL_HEADER: &str = "GLEVNW01";

fn parse_coord(token: &str, what: &'static str) -> Result<u8> {
    token
        .parse::<u8>()
        .map_err(|_| ProtocolError::BadLevel(format!("bad {what} coordinate {token:?}")))
}

/// Parse a `GLEVNW01` text level file.
///
/// `BOARD x y w h data` lines place `w × max(h, 1)` tiles at `(x, y)`; the
/// flat-layer convention writes `0` in the fourth field for a single row.
/// `SIGN`/`NPC` blocks run to their `…END` terminator; `LINK` and `CHEST` are
/// single-line records.
pub fn parse_level(text: &str) -> Result<LevelFile> {
    let mut lines = text.lines();
    let header = lines.next().unwrap_or_default().trim();
    if header != LEVEL_HEADER {
        return Err(ProtocolError::BadLevel(format!("bad header {header:?}")));
    }

    let mut level = LevelFile { tiles: vec![0; BOARD_TILES], ..LevelFile::default() };

    while let Some(line) = lines.next() {
        let line = line.trim_end_matches('\r');
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("BOARD") => {
                let x = parse_coord(tokens.next().unwrap_or(""), "board x")?;
                let y = parse_coord(tokens.next().unwrap_or(""), "board y")?;
                let w = parse_coord(tokens.next().unwrap_or(""), "board width")?;
                let h = parse_coord(tokens.next().unwrap_or(""), "board height")?;
                let data = tokens.next().unwrap_or("");

                let rows = usize::from(h.max(1));
                let width = usize::from(w);
                let run = decode_tile_run(data)?;
                if run.len() < rows * width {
                    return Err(ProtocolError::BadLevel(format!(
                        "board run at ({x},{y}) holds {} tiles, expected {}",
                        run.len(),
                        rows * width
                    )));
                }

                for row in 0..rows {
                    for col in 0..width {
                        let bx = usize::from(x) + col;
                        let by = usize::from(y) + row;
                        if bx < BOARD_SIZE && by < BOARD_SIZE {
                            level.tiles[by * BOARD_SIZE + bx] = run[row * width + col];
                        }
                    }
                }
            },
            Some("SIGN") => {
                let x = parse_coord(tokens.next().unwrap_or(""), "sign x")?;
                let y = parse_coord(tokens.next().unwrap_or(""), "sign y")?;
                let mut body = Vec::new();
                for sign_line in lines.by_ref() {
                    let sign_line = sign_line.trim_end_matches('\r');
                    if sign_line == "SIGNEND" {
                        break;
                    }
                    body.push(sign_line);
                }
                level.signs.push(LevelSign { x, y, text: body.join("\n") });
            },
            Some("LINK") => {
                let dest = tokens.next().unwrap_or("").to_string();
                let x = parse_coord(tokens.next().unwrap_or(""), "link x")?;
                let y = parse_coord(tokens.next().unwrap_or(""), "link y")?;
                let w = parse_coord(tokens.next().unwrap_or(""), "link width")?;
                let h = parse_coord(tokens.next().unwrap_or(""), "link height")?;
                let dest_x = tokens.next().unwrap_or("0").to_string();
                let dest_y = tokens.next().unwrap_or("0").to_string();
                level.links.push(LevelLink { dest, x, y, w, h, dest_x, dest_y });
            },
            Some("CHEST") => {
                let x = parse_coord(tokens.next().unwrap_or(""), "chest x")?;
                let y = parse_coord(tokens.next().unwrap_or(""), "chest y")?;
                let item = tokens.next().unwrap_or("").to_string();
                let sign = tokens.collect::<Vec<_>>().join(" ");
                level.chests.push(LevelChest { x, y, item, sign });
            },
            Some("NPC") => {
                let image = tokens.next().unwrap_or("-").to_string();
                let x = tokens.next().unwrap_or("0").parse::<f32>().unwrap_or(0.0);
                let y = tokens.next().unwrap_or("0").parse::<f32>().unwrap_or(0.0);
                let mut body = Vec::new();
                for npc_line in lines.by_ref() {
                    let npc_line = npc_line.trim_end_matches('\r');
                    if npc_line == "NPCEND" {
                        break;
                    }
                    body.push(npc_line);
                }
                level.npcs.push(LevelNpc { image, x, y, script: body.join("\n") });
            },
            // Unknown record kinds are skipped for forward compatibility.
            _ => {},
        }
    }

    Ok(level)
}

/// A parsed `.gmap` manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GmapFile {
    /// Segment columns.
    pub width: u8,
    /// Segment rows.
    pub height: u8,
    /// Child level names, row-major, `width * height` entries.
    pub names: Vec<String>,
}

impl GmapFile {
    /// Child level name at a segment coordinate.
    #[must_use]
    pub fn level_at(&self, col: u8, row: u8) -> Option<&str> {
        if col >= self.width || row >= self.height {
            return None;
        }
        self.names.get(usize::from(row) * usize::from(self.width) + usize::from(col)).map(String::as_str)
    }

    /// Segment coordinate of a child level name.
    #[must_use]
    pub fn position_of(&self, name: &str) -> Option<(u8, u8)> {
        let idx = self.names.iter().position(|n| n == name)?;
        Some(((idx % usize::from(self.width)) as u8, (idx / usize::from(self.width)) as u8))
    }
}

/// Parse a `.gmap` manifest.
///
/// Requires `WIDTH`/`HEIGHT` declarations and a `LEVELNAMES` …
/// `LEVELNAMESEND` block of quoted, comma-separated child names; the grid
/// must be fully populated.
pub fn parse_gmap(text: &str) -> Result<GmapFile> {
    let mut width = 0u8;
    let mut height = 0u8;
    let mut names = Vec::new();
    let mut in_names = false;

    for line in text.lines() {
        let line = line.trim_end_matches('\r').trim();
        if in_names {
            if line == "LEVELNAMESEND" {
                in_names = false;
                continue;
            }
            for part in line.split(',') {
                let name = part.trim().trim_matches('"');
                if !name.is_empty() {
                    names.push(name.to_string());
                }
            }
            continue;
        }

        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("WIDTH") => {
                width = tokens.next().unwrap_or("").parse().map_err(|_| {
                    ProtocolError::BadGmap(format!("bad WIDTH line {line:?}"))
                })?;
            },
            Some("HEIGHT") => {
                height = tokens.next().unwrap_or("").parse().map_err(|_| {
                    ProtocolError::BadGmap(format!("bad HEIGHT line {line:?}"))
                })?;
            },
            Some("LEVELNAMES") => in_names = true,
            _ => {},
        }
    }

    let expected = usize::from(width) * usize::from(height);
    if expected == 0 {
        return Err(ProtocolError::BadGmap("missing WIDTH or HEIGHT".into()));
    }
    if names.len() != expected {
        return Err(ProtocolError::BadGmap(format!(
            "manifest names {} do not fill the {width}x{height} grid",
            names.len()
        )));
    }

    Ok(GmapFile { width, height, names })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_pair_j4_decodes_to_632() {
        // idx('J') = 9, idx('4') = 56: 9 * 64 + 56 = 632.
        assert_eq!(decode_tile_pair(b'J', b'4').unwrap(), 632);
        assert_eq!(encode_tile_pair(632), [b'J', b'4']);
    }

    #[test]
    fn tile_ids_wrap_at_1024() {
        // "zz" = 51 * 64 + 51 = 3315 -> 3315 % 1024 = 243.
        assert_eq!(decode_tile_pair(b'z', b'z').unwrap(), 243);
    }

    #[test]
    fn wire_board_round_trip_with_known_bytes() {
        let mut tiles = vec![0u16; BOARD_TILES];
        tiles[0] = 632;
        let wire = encode_board(&tiles);
        assert_eq!(wire.len(), BOARD_BYTES);
        assert_eq!(wire[0], 0x78);
        assert_eq!(wire[1], 0x02);

        let decoded = decode_board(&wire).unwrap();
        assert_eq!(decoded.len(), BOARD_TILES);
        assert_eq!(decoded[0], 632);
        assert!(decoded.iter().all(|&t| t < TILE_MODULUS));
    }

    #[test]
    fn wire_board_rejects_wrong_size() {
        assert!(matches!(decode_board(&[0u8; 100]), Err(ProtocolError::BadPacket(_))));
    }

    fn sample_level_text() -> String {
        let mut text = String::from("GLEVNW01\n");
        for y in 0..BOARD_SIZE {
            let row: String =
                if y == 0 { "J4".repeat(BOARD_SIZE) } else { "AA".repeat(BOARD_SIZE) };
            text.push_str(&format!("BOARD 0 {y} 64 0 {row}\n"));
        }
        text.push_str("LINK house1.nw 30 12 2 1 25 30.5\n");
        text.push_str("SIGN 10 5\nwelcome to the island\nline two\nSIGNEND\n");
        text.push_str("CHEST 4 4 greenrupee 0\n");
        text.push_str("NPC block.png 20 21.5\nthis.dontblock = 1;\nNPCEND\n");
        text
    }

    #[test]
    fn parse_level_board_and_records() {
        let level = parse_level(&sample_level_text()).unwrap();
        assert_eq!(level.tiles.len(), BOARD_TILES);
        assert!(level.tiles.iter().all(|&t| t < TILE_MODULUS));
        assert_eq!(level.tiles[0], 632);
        assert_eq!(level.tiles[63], 632);
        assert_eq!(level.tiles[64], 0);

        assert_eq!(level.links.len(), 1);
        assert_eq!(level.links[0].dest, "house1.nw");
        assert_eq!(level.links[0].dest_y, "30.5");

        assert_eq!(level.signs.len(), 1);
        assert_eq!(level.signs[0].text, "welcome to the island\nline two");

        assert_eq!(level.chests.len(), 1);
        assert_eq!(level.chests[0].item, "greenrupee");

        assert_eq!(level.npcs.len(), 1);
        assert_eq!(level.npcs[0].script, "this.dontblock = 1;");
    }

    #[test]
    fn parse_level_rejects_bad_header() {
        assert!(matches!(parse_level("GRMAP001\n"), Err(ProtocolError::BadLevel(_))));
    }

    #[test]
    fn parse_gmap_grid() {
        let text = "GRMAP001\nWIDTH 3\nHEIGHT 2\nLEVELNAMES\n\"a.nw\",\"b.nw\",\"c.nw\",\n\"d.nw\",\"e.nw\",\"f.nw\",\nLEVELNAMESEND\n";
        let gmap = parse_gmap(text).unwrap();
        assert_eq!((gmap.width, gmap.height), (3, 2));
        assert_eq!(gmap.level_at(0, 0), Some("a.nw"));
        assert_eq!(gmap.level_at(2, 1), Some("f.nw"));
        assert_eq!(gmap.level_at(3, 0), None);
        assert_eq!(gmap.position_of("e.nw"), Some((1, 1)));
    }

    #[test]
    fn parse_gmap_rejects_incomplete_grid() {
        let text = "WIDTH 2\nHEIGHT 2\nLEVELNAMES\n\"a.nw\",\"b.nw\",\nLEVELNAMESEND\n";
        assert!(matches!(parse_gmap(text), Err(ProtocolError::BadGmap(_))));
    }
}
