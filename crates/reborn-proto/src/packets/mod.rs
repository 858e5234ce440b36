//! Packet registry: ids, categories, typed decode and encode.
//!
//! The registry is a pair of static `#[repr(u8)]` enums, one per direction,
//! with a typed record per inbound id ([`ServerPacket`]) and a builder per
//! outbound id ([`ClientPacket`]). Dispatch is a single exhaustive match on
//! the id; ids the registry does not know decode to
//! [`ServerPacket::Unknown`] and are surfaced as events rather than errors.

mod client;
mod registry;
mod server;

pub use client::{ClientPacket, encode_batch};
pub use registry::{PacketCategory, ServerPacketId};
pub use server::ServerPacket;
