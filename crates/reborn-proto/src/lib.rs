//! Wire codec layer for the Reborn (GServer-v2 lineage) game protocol.
//!
//! This crate is pure: no sockets, no clocks, no async. It covers, bottom
//! up:
//!
//! - [`cipher`]: the ENCRYPT_GEN_5 partial XOR stream cipher
//! - [`compression`]: per-frame uncompressed / zlib / bzip2 selection
//! - [`frame`]: length-prefixed TCP frames and logical-packet batch splitting
//! - [`codecs`]: the +32 variable-length integer and string encodings
//! - [`packets`]: the static id registry with typed decode and builders
//! - [`props`]: the tagged player-property stream
//! - [`board`]: tile boards, `GLEVNW01` level files, `.gmap` manifests
//!
//! Sessions own one codec state per direction; everything here is driven by
//! the `reborn-core` state machine and the `reborn-client` I/O shell.

#![forbid(unsafe_code)]

pub mod board;
pub mod cipher;
pub mod codecs;
pub mod compression;
pub mod errors;
pub mod frame;
pub mod packets;
pub mod props;

pub use board::{GmapFile, LevelFile};
pub use cipher::Gen5Cipher;
pub use compression::CompressionType;
pub use errors::{ProtocolError, Result};
pub use frame::{BatchSplitter, FrameCodec, RawPacket};
pub use packets::{ClientPacket, PacketCategory, ServerPacket, ServerPacketId, encode_batch};
pub use props::{PlayerProp, PropStream, decode_props, encode_props};

/// Default port of game servers.
pub const DEFAULT_GAME_PORT: u16 = 14900;

/// Default port of the server-list directory service.
pub const DEFAULT_SERVERLIST_PORT: u16 = 14922;

/// Known protocol version tags for the login packet.
pub mod versions {
    /// v2.22 servers.
    pub const V2_22: &str = "GNW22122";
    /// v2.30 servers.
    pub const V2_30: &str = "GNW30000";
    /// v6.037 servers.
    pub const V6_037: &str = "GNW03014";
}
