//! NPC instances tracked by the world.

use bytes::Bytes;

/// One live NPC.
///
/// Scripts and most properties are opaque to the core; the world tracks
/// identity, position, and the raw property bytes for collaborators that
/// understand them.
#[derive(Debug, Clone, PartialEq)]
pub struct Npc {
    /// Server-assigned id.
    pub id: u32,
    /// Tile column.
    pub x: f32,
    /// Tile row.
    pub y: f32,
    /// Image file name.
    pub image: String,
    /// Level the NPC lives on.
    pub level: String,
    /// Raw property bytes from the latest `npcprops`.
    pub props: Bytes,
    /// Whether the NPC is visible.
    pub visible: bool,
    /// Whether the NPC blocks movement.
    pub blocking: bool,
}

impl Npc {
    /// Fresh NPC with an id.
    #[must_use]
    pub fn new(id: u32) -> Self {
        Self {
            id,
            x: 0.0,
            y: 0.0,
            image: String::new(),
            level: String::new(),
            props: Bytes::new(),
            visible: true,
            blocking: false,
        }
    }
}
