//! Player state and property application.

use reborn_proto::props::PlayerProp;

/// Facing direction, the low two bits of the sprite index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Direction {
    /// Facing up.
    Up = 0,
    /// Facing left.
    Left = 1,
    /// Facing down.
    #[default]
    Down = 2,
    /// Facing right.
    Right = 3,
}

impl Direction {
    /// Direction encoded in a sprite index.
    #[must_use]
    pub fn from_sprite(sprite: u8) -> Self {
        match sprite % 4 {
            0 => Self::Up,
            1 => Self::Left,
            3 => Self::Right,
            _ => Self::Down,
        }
    }

    /// Low-bits value of this direction.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// One player, local or remote.
///
/// Coordinate fields keep the GMAP synchronization invariant: with a segment
/// active, `x2 == gmaplevelx * 64 + x` (and likewise for y). The setters
/// maintain it in both directions, so external code only ever assigns through
/// them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Player {
    /// Server-assigned id.
    pub id: u16,
    /// Account name.
    pub account: String,
    /// Display name.
    pub nickname: String,

    x: f32,
    y: f32,
    z: f32,
    x2: Option<f32>,
    y2: Option<f32>,
    z2: Option<f32>,
    gmaplevelx: Option<u8>,
    gmaplevely: Option<u8>,

    /// Sprite index; facing is `sprite % 4`.
    pub sprite: u8,
    /// Status flag bits.
    pub status: u8,
    /// Carried object sprite.
    pub carry_sprite: u8,
    /// Carried NPC id.
    pub carry_npc: u32,

    /// Current level name; the gmap name while a gmap is active.
    pub level: String,

    /// Head image file.
    pub head_image: String,
    /// Body image file.
    pub body_image: String,
    /// Sword image file.
    pub sword_image: String,
    /// Shield image file.
    pub shield_image: String,
    /// Horse image file.
    pub horse_image: String,
    /// Sword strength.
    pub sword_power: u8,
    /// Shield strength.
    pub shield_power: u8,
    /// Glove strength.
    pub glove_power: u8,
    /// Bomb strength.
    pub bomb_power: u8,
    /// Color slots: skin, coat, sleeves, shoes, belt.
    pub colors: [u8; 5],

    /// Current hearts.
    pub hearts: f32,
    /// Maximum hearts.
    pub max_hearts: u8,
    /// Magic points.
    pub magic: u8,
    /// Rupee count.
    pub rupees: u8,
    /// Arrow count.
    pub arrows: u8,
    /// Bomb count.
    pub bombs: u8,
    /// Alignment points.
    pub ap: u8,
    /// Alignment byte (legacy clients).
    pub alignment: u8,
    /// Kill count.
    pub kills: u32,
    /// Death count.
    pub deaths: u32,
    /// Seconds online.
    pub online_secs: u32,
    /// Packed rating.
    pub rating: u32,

    /// Current animation name.
    pub gani: String,
    /// Chat bubble text.
    pub chat: String,
    /// Community (forum) name.
    pub community_name: String,
    /// Client OS tag.
    pub os_type: String,
    /// Client text codepage.
    pub codepage: u32,
    /// Player-list grouping.
    pub playerlist_category: u8,

    /// The 30 opaque attribute slots, `gattrib1` at index 0.
    pub gattribs: [String; 30],
}

impl Player {
    /// Fresh player with an id.
    #[must_use]
    pub fn new(id: u16) -> Self {
        Self { id, ..Self::default() }
    }

    /// X position in segment-local tiles.
    #[must_use]
    pub fn x(&self) -> f32 {
        self.x
    }

    /// Y position in segment-local tiles.
    #[must_use]
    pub fn y(&self) -> f32 {
        self.y
    }

    /// Z position in tiles.
    #[must_use]
    pub fn z(&self) -> f32 {
        self.z
    }

    /// World X in tiles, when high-precision tracking is active.
    #[must_use]
    pub fn x2(&self) -> Option<f32> {
        self.x2
    }

    /// World Y in tiles, when high-precision tracking is active.
    #[must_use]
    pub fn y2(&self) -> Option<f32> {
        self.y2
    }

    /// World Z in tiles, when high-precision tracking is active.
    #[must_use]
    pub fn z2(&self) -> Option<f32> {
        self.z2
    }

    /// Active GMAP segment column.
    #[must_use]
    pub fn gmaplevelx(&self) -> Option<u8> {
        self.gmaplevelx
    }

    /// Active GMAP segment row.
    #[must_use]
    pub fn gmaplevely(&self) -> Option<u8> {
        self.gmaplevely
    }

    /// Facing direction.
    #[must_use]
    pub fn direction(&self) -> Direction {
        Direction::from_sprite(self.sprite)
    }

    /// Whether a GMAP segment is active.
    #[must_use]
    pub fn on_gmap(&self) -> bool {
        self.gmaplevelx.is_some() && self.gmaplevely.is_some()
    }

    /// Set the segment-local X, rederiving world X when a segment is active.
    pub fn set_x(&mut self, x: f32) {
        self.x = x;
        if let Some(gx) = self.gmaplevelx {
            self.x2 = Some(f32::from(gx) * 64.0 + x);
        }
    }

    /// Set the segment-local Y, rederiving world Y when a segment is active.
    pub fn set_y(&mut self, y: f32) {
        self.y = y;
        if let Some(gy) = self.gmaplevely {
            self.y2 = Some(f32::from(gy) * 64.0 + y);
        }
    }

    /// Set the world X, rederiving local X and (when unset) the segment
    /// column.
    pub fn set_x2(&mut self, x2: f32) {
        self.x2 = Some(x2);
        self.x = x2.rem_euclid(64.0);
        if self.gmaplevelx.is_none() {
            self.gmaplevelx = Some((x2 / 64.0).floor().max(0.0) as u8);
        }
    }

    /// Set the world Y, rederiving local Y and (when unset) the segment row.
    pub fn set_y2(&mut self, y2: f32) {
        self.y2 = Some(y2);
        self.y = y2.rem_euclid(64.0);
        if self.gmaplevely.is_none() {
            self.gmaplevely = Some((y2 / 64.0).floor().max(0.0) as u8);
        }
    }

    /// Set the segment column, rederiving world X from local X.
    pub fn set_gmaplevelx(&mut self, col: u8) {
        self.gmaplevelx = Some(col);
        self.x2 = Some(f32::from(col) * 64.0 + self.x);
    }

    /// Set the segment row, rederiving world Y from local Y.
    pub fn set_gmaplevely(&mut self, row: u8) {
        self.gmaplevely = Some(row);
        self.y2 = Some(f32::from(row) * 64.0 + self.y);
    }

    /// Clear GMAP tracking (the player warped to a plain level).
    pub fn clear_gmap(&mut self) {
        self.gmaplevelx = None;
        self.gmaplevely = None;
        self.x2 = None;
        self.y2 = None;
        self.z2 = None;
    }

    /// Apply one decoded property.
    pub fn apply_prop(&mut self, prop: &PlayerProp) {
        match prop {
            PlayerProp::Nickname(v) => self.nickname.clone_from(v),
            PlayerProp::MaxPower(v) => self.max_hearts = *v,
            PlayerProp::CurPower(v) => self.hearts = *v,
            PlayerProp::Rupees(v) => self.rupees = *v,
            PlayerProp::Arrows(v) => self.arrows = *v,
            PlayerProp::Bombs(v) => self.bombs = *v,
            PlayerProp::GlovePower(v) => self.glove_power = *v,
            PlayerProp::BombPower(v) => self.bomb_power = *v,
            PlayerProp::SwordPower { power, image } => {
                self.sword_power = *power;
                self.sword_image.clone_from(image);
            },
            PlayerProp::ShieldPower { power, image } => {
                self.shield_power = *power;
                self.shield_image.clone_from(image);
            },
            PlayerProp::Gani(v) => self.gani.clone_from(v),
            PlayerProp::HeadImage(v) => self.head_image.clone_from(v),
            PlayerProp::CurChat(v) => self.chat.clone_from(v),
            PlayerProp::Colors(v) => self.colors = *v,
            PlayerProp::PlayerId(v) => self.id = *v,
            PlayerProp::X(v) => self.set_x(*v),
            PlayerProp::Y(v) => self.set_y(*v),
            PlayerProp::Sprite(v) => self.sprite = *v,
            PlayerProp::Status(v) => self.status = *v,
            PlayerProp::CarrySprite(v) => self.carry_sprite = *v,
            PlayerProp::CurLevel(v) => self.level.clone_from(v),
            PlayerProp::HorseImage(v) => self.horse_image.clone_from(v),
            PlayerProp::HorseBushes(_) => {},
            PlayerProp::CarryNpc(v) => self.carry_npc = *v,
            PlayerProp::ApCounter(v) => self.ap = *v,
            PlayerProp::MagicPoints(v) => self.magic = *v,
            PlayerProp::Kills(v) => self.kills = *v,
            PlayerProp::Deaths(v) => self.deaths = *v,
            PlayerProp::OnlineSecs(v) => self.online_secs = *v,
            PlayerProp::IpAddress(_) | PlayerProp::UdpPort(_) => {},
            PlayerProp::Alignment(v) => self.alignment = *v,
            PlayerProp::AdditionalFlags(_) => {},
            PlayerProp::AccountName(v) => self.account.clone_from(v),
            PlayerProp::BodyImage(v) => self.body_image.clone_from(v),
            PlayerProp::Rating(v) => self.rating = *v,
            PlayerProp::Gattrib { index, value } => {
                if let Some(slot) = self.gattribs.get_mut(usize::from(*index) - 1) {
                    slot.clone_from(value);
                }
            },
            PlayerProp::GmapLevelX(v) => self.set_gmaplevelx(*v),
            PlayerProp::GmapLevelY(v) => self.set_gmaplevely(*v),
            PlayerProp::Z(v) => self.z = *v,
            PlayerProp::OsType(v) => self.os_type.clone_from(v),
            PlayerProp::TextCodepage(v) => self.codepage = *v,
            PlayerProp::X2(v) => self.set_x2(*v),
            PlayerProp::Y2(v) => self.set_y2(*v),
            PlayerProp::Z2(v) => self.z2 = Some(*v),
            PlayerProp::PlayerListCategory(v) => self.playerlist_category = *v,
            PlayerProp::CommunityName(v) => self.community_name.clone_from(v),
            PlayerProp::Opaque { .. } => {},
        }
    }

    /// Apply a decoded property stream.
    pub fn apply_props<'a>(&mut self, props: impl IntoIterator<Item = &'a PlayerProp>) {
        for prop in props {
            self.apply_prop(prop);
        }
    }
}
