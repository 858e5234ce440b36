//! World model: the local player, remote players, levels, NPCs, flags.
//!
//! The world is owned by the session and mutated only from packet handling
//! (the receive side). External collaborators read through clone-returning
//! getters on the client facade; nothing outside the crate holds a reference
//! into this state.

mod gmap;
mod level;
mod npc;
mod player;

use std::collections::HashMap;

pub use gmap::{Gmap, SEGMENT_SIZE, SegmentCrossing, wrap_position};
pub use level::{Item, Level, LevelCache, MIN_CACHE_CAPACITY};
pub use npc::Npc;
pub use player::{Direction, Player};

/// All state observed from the server over one session.
#[derive(Debug)]
pub struct World {
    /// The local player.
    pub local: Player,
    /// Remote players by id.
    players: HashMap<u16, Player>,
    /// Cached levels by name.
    pub levels: LevelCache,
    /// The active GMAP, when the current level is one.
    pub gmap: Option<Gmap>,
    /// Name of the level the local player is on.
    current_level: Option<String>,
    /// Server flags.
    flags: HashMap<String, String>,
    /// NPCs by id.
    npcs: HashMap<u32, Npc>,
    /// Weapon scripts granted to the local player.
    weapons: Vec<String>,
    /// Latest server world time.
    pub time: u32,
}

impl World {
    /// Empty world with a level-cache capacity.
    #[must_use]
    pub fn new(cache_capacity: usize) -> Self {
        Self {
            local: Player::default(),
            players: HashMap::new(),
            levels: LevelCache::new(cache_capacity),
            gmap: None,
            current_level: None,
            flags: HashMap::new(),
            npcs: HashMap::new(),
            weapons: Vec::new(),
            time: 0,
        }
    }

    /// Remote player by id.
    #[must_use]
    pub fn player(&self, id: u16) -> Option<&Player> {
        self.players.get(&id)
    }

    /// Iterate remote players.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Remote players on a level.
    pub fn players_on_level<'a>(&'a self, level: &'a str) -> impl Iterator<Item = &'a Player> {
        self.players.values().filter(move |p| p.level == level)
    }

    /// Mutable remote player by id.
    pub fn player_mut(&mut self, id: u16) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    /// Get or create a remote player; returns whether it was created.
    pub fn upsert_player(&mut self, id: u16) -> (&mut Player, bool) {
        let created = !self.players.contains_key(&id);
        (self.players.entry(id).or_insert_with(|| Player::new(id)), created)
    }

    /// Remove a remote player.
    pub fn remove_player(&mut self, id: u16) -> Option<Player> {
        self.players.remove(&id)
    }

    /// Name of the current level (the gmap name while one is active).
    #[must_use]
    pub fn current_level(&self) -> Option<&str> {
        self.current_level.as_deref()
    }

    /// Switch the current level, creating its cache entry.
    pub fn enter_level(&mut self, name: &str) {
        self.current_level = Some(name.to_string());
        self.levels.entry(name);
        self.local.level = name.to_string();
    }

    /// The current level's cache entry, if any.
    #[must_use]
    pub fn current_level_entry(&mut self) -> Option<&mut Level> {
        let name = self.current_level.clone()?;
        Some(self.levels.entry(&name))
    }

    /// Name of the level board packets apply to: the active gmap segment's
    /// child level when on a gmap, the current level otherwise.
    #[must_use]
    pub fn board_target(&self) -> Option<String> {
        if let (Some(gmap), Some(col), Some(row)) =
            (&self.gmap, self.local.gmaplevelx(), self.local.gmaplevely())
        {
            if let Some(child) = gmap.level_at(col, row) {
                return Some(child.to_string());
            }
        }
        self.current_level.clone()
    }

    /// Flag value by name.
    #[must_use]
    pub fn flag(&self, name: &str) -> Option<&str> {
        self.flags.get(name).map(String::as_str)
    }

    /// All flags.
    #[must_use]
    pub fn flags(&self) -> &HashMap<String, String> {
        &self.flags
    }

    /// Set a flag.
    pub fn set_flag(&mut self, name: String, value: String) {
        self.flags.insert(name, value);
    }

    /// Delete a flag.
    pub fn delete_flag(&mut self, name: &str) -> bool {
        self.flags.remove(name).is_some()
    }

    /// NPC by id.
    #[must_use]
    pub fn npc(&self, id: u32) -> Option<&Npc> {
        self.npcs.get(&id)
    }

    /// Get or create an NPC.
    pub fn upsert_npc(&mut self, id: u32) -> &mut Npc {
        self.npcs.entry(id).or_insert_with(|| Npc::new(id))
    }

    /// Remove an NPC.
    pub fn remove_npc(&mut self, id: u32) -> Option<Npc> {
        self.npcs.remove(&id)
    }

    /// Number of tracked NPCs.
    #[must_use]
    pub fn npc_count(&self) -> usize {
        self.npcs.len()
    }

    /// Record a granted weapon script.
    pub fn add_weapon(&mut self, name: String) {
        if !self.weapons.contains(&name) {
            self.weapons.push(name);
        }
    }

    /// Revoke a weapon script.
    pub fn remove_weapon(&mut self, name: &str) {
        self.weapons.retain(|w| w != name);
    }

    /// Weapon scripts currently granted.
    #[must_use]
    pub fn weapons(&self) -> &[String] {
        &self.weapons
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_reports_creation_once() {
        let mut world = World::new(32);
        let (_, created) = world.upsert_player(7);
        assert!(created);
        let (_, created) = world.upsert_player(7);
        assert!(!created);
        assert_eq!(world.players().count(), 1);
    }

    #[test]
    fn players_on_level_filters() {
        let mut world = World::new(32);
        world.upsert_player(1).0.level = "a.nw".into();
        world.upsert_player(2).0.level = "b.nw".into();
        world.upsert_player(3).0.level = "a.nw".into();
        assert_eq!(world.players_on_level("a.nw").count(), 2);
    }

    #[test]
    fn entering_a_level_creates_cache_entry() {
        let mut world = World::new(32);
        world.enter_level("onlinestartlocal.nw");
        assert_eq!(world.current_level(), Some("onlinestartlocal.nw"));
        assert!(world.levels.peek("onlinestartlocal.nw").is_some());
        assert_eq!(world.local.level, "onlinestartlocal.nw");
    }

    #[test]
    fn board_target_prefers_gmap_child() {
        use reborn_proto::board::parse_gmap;

        let mut world = World::new(32);
        world.enter_level("world.gmap");
        let manifest = "WIDTH 2\nHEIGHT 1\nLEVELNAMES\n\"a.nw\",\"b.nw\",\nLEVELNAMESEND\n";
        world.gmap = Some(Gmap::new("world.gmap", parse_gmap(manifest).unwrap()));
        world.local.set_gmaplevelx(1);
        world.local.set_gmaplevely(0);

        assert_eq!(world.board_target(), Some("b.nw".into()));
    }

    #[test]
    fn weapons_dedupe() {
        let mut world = World::new(32);
        world.add_weapon("bow".into());
        world.add_weapon("bow".into());
        assert_eq!(world.weapons().len(), 1);
        world.remove_weapon("bow");
        assert!(world.weapons().is_empty());
    }
}
