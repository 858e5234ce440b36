//! Player property stream codec.
//!
//! A property stream is a concatenation of `[id + 32][data…]` records with no
//! sentinel; the registered layout of each id tells the decoder how many
//! bytes the record owns. Layouts follow the classic GServer table: one-byte
//! numerics (positions at half-tile precision), length-prefixed strings, and
//! a few specials such as HEADGIF's +100 length byte, sword/shield's offset
//! power byte, the five color slots, and the 2-byte high-precision
//! coordinates.
//!
//! Ids we recognize but carry no semantics for decode as
//! [`PlayerProp::Opaque`], preserving their bytes for re-encode. Ids with no
//! registered layout at all stop the stream: [`decode_props`] returns the
//! prefix it managed to decode plus the offending id, and the session drops
//! the remainder without dying.

use bytes::BufMut;

use crate::{
    codecs::{PacketReader, write_gchar, write_gint3, write_gint5, write_gshort, write_gstring},
    errors::{ProtocolError, Result},
};

/// Pixels per tile; high-precision coordinates are wire-encoded in pixels.
const PIXELS_PER_TILE: f32 = 16.0;

/// Offset applied to the HEADGIF length byte instead of the usual 32.
const HEADGIF_LENGTH_OFFSET: u8 = 100;

/// Offset applied to the sword power byte.
const SWORD_POWER_OFFSET: u8 = 30;

/// Offset applied to the shield power byte.
const SHIELD_POWER_OFFSET: u8 = 10;

/// A single decoded player property.
///
/// Variant order follows the wire id table; [`PlayerProp::id`] maps back.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerProp {
    /// Display name (id 0).
    Nickname(String),
    /// Maximum hearts (id 1).
    MaxPower(u8),
    /// Current hearts (id 2, half-heart precision).
    CurPower(f32),
    /// Rupee count (id 3).
    Rupees(u8),
    /// Arrow count (id 4).
    Arrows(u8),
    /// Bomb count (id 5).
    Bombs(u8),
    /// Glove strength (id 6).
    GlovePower(u8),
    /// Bomb strength (id 7).
    BombPower(u8),
    /// Sword strength and image (id 8).
    SwordPower {
        /// Sword level.
        power: u8,
        /// Sword image file name.
        image: String,
    },
    /// Shield strength and image (id 9).
    ShieldPower {
        /// Shield level.
        power: u8,
        /// Shield image file name.
        image: String,
    },
    /// Current animation name (id 10).
    Gani(String),
    /// Head image (id 11, +100 length byte).
    HeadImage(String),
    /// Chat bubble text (id 12).
    CurChat(String),
    /// The five color slots: skin, coat, sleeves, shoes, belt (id 13).
    Colors([u8; 5]),
    /// Server-assigned player id (id 14).
    PlayerId(u16),
    /// X position in tiles, half-tile precision (id 15).
    X(f32),
    /// Y position in tiles, half-tile precision (id 16).
    Y(f32),
    /// Sprite / facing index (id 17).
    Sprite(u8),
    /// Status flag bits (id 18).
    Status(u8),
    /// Carried object sprite (id 19).
    CarrySprite(u8),
    /// Current level name (id 20).
    CurLevel(String),
    /// Horse image (id 21).
    HorseImage(String),
    /// Horse bush-eating counter (id 22).
    HorseBushes(u8),
    /// Carried NPC id (id 24).
    CarryNpc(u32),
    /// Alignment points (id 25).
    ApCounter(u8),
    /// Magic points (id 26).
    MagicPoints(u8),
    /// Kill count (id 27).
    Kills(u32),
    /// Death count (id 28).
    Deaths(u32),
    /// Seconds spent online (id 29).
    OnlineSecs(u32),
    /// IPv4 address as a packed integer (id 30).
    IpAddress(u32),
    /// UDP port (id 31).
    UdpPort(u32),
    /// Alignment byte (id 32).
    Alignment(u8),
    /// Additional flag bits (id 33).
    AdditionalFlags(u8),
    /// Account name (id 34).
    AccountName(String),
    /// Body image (id 35).
    BodyImage(String),
    /// Packed rating / deviation (id 36).
    Rating(u32),
    /// One of the 30 opaque attribute slots (ids 37–41, 46–49, 54–74).
    Gattrib {
        /// Slot number, 1..=30.
        index: u8,
        /// Opaque payload.
        value: String,
    },
    /// Active GMAP segment column (id 43).
    GmapLevelX(u8),
    /// Active GMAP segment row (id 44).
    GmapLevelY(u8),
    /// Z position in tiles, half-tile precision (id 45).
    Z(f32),
    /// Client operating system tag (id 75).
    OsType(String),
    /// Client text codepage (id 76).
    TextCodepage(u32),
    /// High-precision X in tiles, 1/16-tile granularity (id 78).
    X2(f32),
    /// High-precision Y in tiles, 1/16-tile granularity (id 79).
    Y2(f32),
    /// High-precision Z in tiles, 1/16-tile granularity (id 80).
    Z2(f32),
    /// Player-list grouping category (id 81).
    PlayerListCategory(u8),
    /// Community (forum) name (id 82).
    CommunityName(String),
    /// Recognized id whose semantics the core does not model; bytes kept
    /// verbatim for round-tripping.
    Opaque {
        /// Wire property id.
        id: u8,
        /// Raw record bytes, excluding the id byte.
        data: Vec<u8>,
    },
}

/// Wire id of a gattrib slot index (1..=30), if valid.
#[must_use]
pub fn gattrib_id(index: u8) -> Option<u8> {
    match index {
        1..=5 => Some(36 + index),
        6..=9 => Some(40 + index),
        10..=30 => Some(44 + index),
        _ => None,
    }
}

/// Gattrib slot index of a wire id, if it is one.
#[must_use]
pub fn gattrib_index(id: u8) -> Option<u8> {
    match id {
        37..=41 => Some(id - 36),
        46..=49 => Some(id - 40),
        54..=74 => Some(id - 44),
        _ => None,
    }
}

/// Skip-fallback layout for recognized-but-opaque ids.
fn opaque_layout(id: u8) -> Option<OpaqueLayout> {
    match id {
        // Effect colors: one byte.
        23 => Some(OpaqueLayout::Byte),
        // Reserved slot and the legacy join/connected/language/status-message
        // block: length-prefixed.
        42 | 50..=53 => Some(OpaqueLayout::String),
        _ => None,
    }
}

#[derive(Clone, Copy)]
enum OpaqueLayout {
    Byte,
    String,
}

impl PlayerProp {
    /// Wire id of this property.
    #[must_use]
    pub fn id(&self) -> u8 {
        match self {
            Self::Nickname(_) => 0,
            Self::MaxPower(_) => 1,
            Self::CurPower(_) => 2,
            Self::Rupees(_) => 3,
            Self::Arrows(_) => 4,
            Self::Bombs(_) => 5,
            Self::GlovePower(_) => 6,
            Self::BombPower(_) => 7,
            Self::SwordPower { .. } => 8,
            Self::ShieldPower { .. } => 9,
            Self::Gani(_) => 10,
            Self::HeadImage(_) => 11,
            Self::CurChat(_) => 12,
            Self::Colors(_) => 13,
            Self::PlayerId(_) => 14,
            Self::X(_) => 15,
            Self::Y(_) => 16,
            Self::Sprite(_) => 17,
            Self::Status(_) => 18,
            Self::CarrySprite(_) => 19,
            Self::CurLevel(_) => 20,
            Self::HorseImage(_) => 21,
            Self::HorseBushes(_) => 22,
            Self::CarryNpc(_) => 24,
            Self::ApCounter(_) => 25,
            Self::MagicPoints(_) => 26,
            Self::Kills(_) => 27,
            Self::Deaths(_) => 28,
            Self::OnlineSecs(_) => 29,
            Self::IpAddress(_) => 30,
            Self::UdpPort(_) => 31,
            Self::Alignment(_) => 32,
            Self::AdditionalFlags(_) => 33,
            Self::AccountName(_) => 34,
            Self::BodyImage(_) => 35,
            Self::Rating(_) => 36,
            Self::Gattrib { index, .. } => gattrib_id(*index).unwrap_or(37),
            Self::GmapLevelX(_) => 43,
            Self::GmapLevelY(_) => 44,
            Self::Z(_) => 45,
            Self::OsType(_) => 75,
            Self::TextCodepage(_) => 76,
            Self::X2(_) => 78,
            Self::Y2(_) => 79,
            Self::Z2(_) => 80,
            Self::PlayerListCategory(_) => 81,
            Self::CommunityName(_) => 82,
            Self::Opaque { id, .. } => *id,
        }
    }
}

/// Decode a single property record after its id byte has been consumed.
///
/// # Errors
///
/// [`ProtocolError::UnknownProperty`] when the id has neither a registered
/// layout nor a skip fallback; [`ProtocolError::UnexpectedEof`] when the body
/// ends inside a registered layout.
pub fn decode_prop(id: u8, r: &mut PacketReader<'_>) -> Result<PlayerProp> {
    if let Some(index) = gattrib_index(id) {
        return Ok(PlayerProp::Gattrib { index, value: r.gstring()? });
    }

    let prop = match id {
        0 => PlayerProp::Nickname(r.gstring()?),
        1 => PlayerProp::MaxPower(r.gchar()?),
        2 => PlayerProp::CurPower(f32::from(r.gchar()?) / 2.0),
        3 => PlayerProp::Rupees(r.gchar()?),
        4 => PlayerProp::Arrows(r.gchar()?),
        5 => PlayerProp::Bombs(r.gchar()?),
        6 => PlayerProp::GlovePower(r.gchar()?),
        7 => PlayerProp::BombPower(r.gchar()?),
        8 => {
            let raw = r.take(1, "sword power")?[0];
            PlayerProp::SwordPower {
                power: raw.saturating_sub(SWORD_POWER_OFFSET),
                image: r.gstring()?,
            }
        },
        9 => {
            let raw = r.take(1, "shield power")?[0];
            PlayerProp::ShieldPower {
                power: raw.saturating_sub(SHIELD_POWER_OFFSET),
                image: r.gstring()?,
            }
        },
        10 => PlayerProp::Gani(r.gstring()?),
        11 => {
            let raw = r.take(1, "head length")?[0];
            let len = usize::from(raw.saturating_sub(HEADGIF_LENGTH_OFFSET));
            let image = String::from_utf8_lossy(r.take(len, "head image")?).into_owned();
            PlayerProp::HeadImage(image)
        },
        12 => PlayerProp::CurChat(r.gstring()?),
        13 => {
            let raw = r.take(5, "colors")?;
            let mut colors = [0u8; 5];
            for (slot, byte) in colors.iter_mut().zip(raw) {
                *slot = byte.saturating_sub(32);
            }
            PlayerProp::Colors(colors)
        },
        14 => PlayerProp::PlayerId(r.gshort()?),
        15 => PlayerProp::X(r.half_tile()?),
        16 => PlayerProp::Y(r.half_tile()?),
        17 => PlayerProp::Sprite(r.gchar()?),
        18 => PlayerProp::Status(r.gchar()?),
        19 => PlayerProp::CarrySprite(r.gchar()?),
        20 => PlayerProp::CurLevel(r.gstring()?),
        21 => PlayerProp::HorseImage(r.gstring()?),
        22 => PlayerProp::HorseBushes(r.gchar()?),
        24 => PlayerProp::CarryNpc(r.gint3()?),
        25 => PlayerProp::ApCounter(r.gchar()?),
        26 => PlayerProp::MagicPoints(r.gchar()?),
        27 => PlayerProp::Kills(r.gint3()?),
        28 => PlayerProp::Deaths(r.gint3()?),
        29 => PlayerProp::OnlineSecs(r.gint3()?),
        30 => PlayerProp::IpAddress(r.gint5()? as u32),
        31 => PlayerProp::UdpPort(r.gint3()?),
        32 => PlayerProp::Alignment(r.gchar()?),
        33 => PlayerProp::AdditionalFlags(r.gchar()?),
        34 => PlayerProp::AccountName(r.gstring()?),
        35 => PlayerProp::BodyImage(r.gstring()?),
        36 => PlayerProp::Rating(r.gint3()?),
        43 => PlayerProp::GmapLevelX(r.gchar()?),
        44 => PlayerProp::GmapLevelY(r.gchar()?),
        45 => PlayerProp::Z(r.half_tile()?),
        75 => PlayerProp::OsType(r.gstring()?),
        76 => PlayerProp::TextCodepage(r.gint3()?),
        78 => PlayerProp::X2(f32::from(r.gshort()?) / PIXELS_PER_TILE),
        79 => PlayerProp::Y2(f32::from(r.gshort()?) / PIXELS_PER_TILE),
        80 => PlayerProp::Z2(f32::from(r.gshort()?) / PIXELS_PER_TILE),
        81 => PlayerProp::PlayerListCategory(r.gchar()?),
        82 => PlayerProp::CommunityName(r.gstring()?),
        other => match opaque_layout(other) {
            Some(OpaqueLayout::Byte) => {
                PlayerProp::Opaque { id: other, data: r.take(1, "opaque byte")?.to_vec() }
            },
            Some(OpaqueLayout::String) => {
                let len = usize::from(r.clone().gchar()?);
                let data = r.take(len + 1, "opaque string")?.to_vec();
                PlayerProp::Opaque { id: other, data }
            },
            None => return Err(ProtocolError::UnknownProperty(other)),
        },
    };
    Ok(prop)
}

/// Decoded prefix of a property stream.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PropStream {
    /// Properties decoded before the stream ended or hit an unknown id.
    pub props: Vec<PlayerProp>,
    /// Id that stopped decoding, when no layout or fallback was registered.
    pub unknown: Option<u8>,
}

/// Decode a full property stream.
///
/// An unregistered id truncates the stream (the decoded prefix is kept and
/// the id reported); a registered layout running out of bytes is a malformed
/// packet and errors.
pub fn decode_props(body: &[u8]) -> Result<PropStream> {
    let mut r = PacketReader::new(body);
    let mut props = Vec::new();

    while !r.is_empty() {
        let id = r.gchar()?;
        match decode_prop(id, &mut r) {
            Ok(prop) => props.push(prop),
            Err(ProtocolError::UnknownProperty(id)) => {
                return Ok(PropStream { props, unknown: Some(id) });
            },
            Err(e) => return Err(e),
        }
    }

    Ok(PropStream { props, unknown: None })
}

/// Encode one property record, id byte included.
pub fn encode_prop(prop: &PlayerProp, buf: &mut impl BufMut) {
    write_gchar(buf, prop.id());

    match prop {
        PlayerProp::Nickname(s)
        | PlayerProp::Gani(s)
        | PlayerProp::CurChat(s)
        | PlayerProp::CurLevel(s)
        | PlayerProp::HorseImage(s)
        | PlayerProp::AccountName(s)
        | PlayerProp::BodyImage(s)
        | PlayerProp::OsType(s)
        | PlayerProp::CommunityName(s)
        | PlayerProp::Gattrib { value: s, .. } => write_gstring(buf, s),

        PlayerProp::MaxPower(v)
        | PlayerProp::Rupees(v)
        | PlayerProp::Arrows(v)
        | PlayerProp::Bombs(v)
        | PlayerProp::GlovePower(v)
        | PlayerProp::BombPower(v)
        | PlayerProp::Sprite(v)
        | PlayerProp::Status(v)
        | PlayerProp::CarrySprite(v)
        | PlayerProp::HorseBushes(v)
        | PlayerProp::ApCounter(v)
        | PlayerProp::MagicPoints(v)
        | PlayerProp::Alignment(v)
        | PlayerProp::AdditionalFlags(v)
        | PlayerProp::GmapLevelX(v)
        | PlayerProp::GmapLevelY(v)
        | PlayerProp::PlayerListCategory(v) => write_gchar(buf, *v),

        PlayerProp::CurPower(v) | PlayerProp::X(v) | PlayerProp::Y(v) | PlayerProp::Z(v) => {
            write_gchar(buf, (v * 2.0).floor().clamp(0.0, 223.0) as u8);
        },

        PlayerProp::SwordPower { power, image } => {
            buf.put_u8(power.wrapping_add(SWORD_POWER_OFFSET));
            write_gstring(buf, image);
        },
        PlayerProp::ShieldPower { power, image } => {
            buf.put_u8(power.wrapping_add(SHIELD_POWER_OFFSET));
            write_gstring(buf, image);
        },

        PlayerProp::HeadImage(image) => {
            let bytes = image.as_bytes();
            let len = bytes.len().min(usize::from(u8::MAX - HEADGIF_LENGTH_OFFSET));
            buf.put_u8(len as u8 + HEADGIF_LENGTH_OFFSET);
            buf.put_slice(&bytes[..len]);
        },

        PlayerProp::Colors(colors) => {
            for color in colors {
                write_gchar(buf, *color);
            }
        },

        PlayerProp::PlayerId(v) => write_gshort(buf, *v),

        PlayerProp::CarryNpc(v)
        | PlayerProp::Kills(v)
        | PlayerProp::Deaths(v)
        | PlayerProp::OnlineSecs(v)
        | PlayerProp::UdpPort(v)
        | PlayerProp::Rating(v)
        | PlayerProp::TextCodepage(v) => write_gint3(buf, *v),

        PlayerProp::IpAddress(v) => write_gint5(buf, u64::from(*v)),

        PlayerProp::X2(v) | PlayerProp::Y2(v) | PlayerProp::Z2(v) => {
            write_gshort(buf, (v * PIXELS_PER_TILE).round().clamp(0.0, 28_671.0) as u16);
        },

        PlayerProp::Opaque { data, .. } => buf.put_slice(data),
    }
}

/// Encode a property stream.
#[must_use]
pub fn encode_props(props: &[PlayerProp]) -> Vec<u8> {
    let mut buf = Vec::new();
    for prop in props {
        encode_prop(prop, &mut buf);
    }
    buf
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn nickname_x_colors_stream_bytes() {
        let props = vec![
            PlayerProp::Nickname("Bob".into()),
            PlayerProp::X(30.5),
            PlayerProp::Colors([10, 20, 5, 7, 3]),
        ];
        let bytes = encode_props(&props);
        assert_eq!(
            bytes,
            [
                0x20, 0x23, b'B', b'o', b'b', // nickname, length 3
                0x2F, 0x5D, // x, 30.5 * 2 = 61, offset by 32
                0x2D, 0x2A, 0x34, 0x25, 0x27, 0x23, // colors, each + 32
            ]
        );

        let decoded = decode_props(&bytes).unwrap();
        assert_eq!(decoded.unknown, None);
        assert_eq!(decoded.props, props);
    }

    #[test]
    fn headgif_uses_plus_100_length() {
        let bytes = encode_props(&[PlayerProp::HeadImage("head1.png".into())]);
        assert_eq!(bytes[0], 11 + 32);
        assert_eq!(bytes[1], 9 + 100);
        assert_eq!(&bytes[2..], b"head1.png");
    }

    #[test]
    fn sword_power_offsets_by_30() {
        let bytes =
            encode_props(&[PlayerProp::SwordPower { power: 2, image: "sword1.png".into() }]);
        assert_eq!(bytes[0], 8 + 32);
        assert_eq!(bytes[1], 2 + 30);
        assert_eq!(bytes[2], 10 + 32);
    }

    #[test]
    fn high_precision_coords_are_sixteenths() {
        let bytes = encode_props(&[PlayerProp::X2(128.5)]);
        // 128.5 tiles * 16 = 2056 pixels = gshort [8 + 32, 16 + 32]
        assert_eq!(bytes, [78 + 32, 0x28, 0x30]);
        let decoded = decode_props(&bytes).unwrap();
        assert_eq!(decoded.props, vec![PlayerProp::X2(128.5)]);
    }

    #[test]
    fn unknown_id_truncates_stream_without_error() {
        // Nickname, then id 77 (no layout, no fallback), then garbage.
        let mut bytes = encode_props(&[PlayerProp::Nickname("a".into())]);
        bytes.push(77 + 32);
        bytes.extend_from_slice(&[0xF0, 0x0D]);

        let decoded = decode_props(&bytes).unwrap();
        assert_eq!(decoded.props, vec![PlayerProp::Nickname("a".into())]);
        assert_eq!(decoded.unknown, Some(77));
    }

    #[test]
    fn reserved_ids_round_trip_opaquely() {
        let mut bytes = Vec::new();
        write_gchar(&mut bytes, 42);
        write_gstring(&mut bytes, "mystery");
        write_gchar(&mut bytes, 17); // sprite id
        write_gchar(&mut bytes, 2); // sprite value

        let decoded = decode_props(&bytes).unwrap();
        assert_eq!(decoded.unknown, None);
        assert_eq!(decoded.props.len(), 2);
        assert!(matches!(decoded.props[0], PlayerProp::Opaque { id: 42, .. }));
        assert_eq!(decoded.props[1], PlayerProp::Sprite(2));
        assert_eq!(encode_props(&decoded.props), bytes);
    }

    #[test]
    fn truncated_registered_layout_is_malformed() {
        // Colors id with only 3 of 5 bytes.
        let bytes = [13 + 32, 0x2A, 0x34, 0x25];
        assert_eq!(decode_props(&bytes), Err(ProtocolError::UnexpectedEof("colors")));
    }

    #[test]
    fn gattrib_ids_skip_the_reserved_blocks() {
        assert_eq!(gattrib_id(1), Some(37));
        assert_eq!(gattrib_id(5), Some(41));
        assert_eq!(gattrib_id(6), Some(46));
        assert_eq!(gattrib_id(9), Some(49));
        assert_eq!(gattrib_id(10), Some(54));
        assert_eq!(gattrib_id(30), Some(74));
        assert_eq!(gattrib_id(31), None);
        for index in 1..=30 {
            assert_eq!(gattrib_index(gattrib_id(index).unwrap()), Some(index));
        }
    }

    fn arb_prop() -> impl Strategy<Value = PlayerProp> {
        let text = "[ -~]{0,40}";
        let strategies: Vec<BoxedStrategy<PlayerProp>> = vec![
            text.prop_map(PlayerProp::Nickname).boxed(),
            any::<u8>().prop_map(|v| PlayerProp::MaxPower(v.min(223))).boxed(),
            (0u8..=223).prop_map(|v| PlayerProp::CurPower(f32::from(v) / 2.0)).boxed(),
            (0u8..=223).prop_map(PlayerProp::Rupees).boxed(),
            (0u8..=127).prop_map(|v| PlayerProp::X(f32::from(v) / 2.0)).boxed(),
            (0u8..=127).prop_map(|v| PlayerProp::Y(f32::from(v) / 2.0)).boxed(),
            (0u8..=3).prop_map(PlayerProp::Sprite).boxed(),
            prop::array::uniform5(0u8..=30).prop_map(PlayerProp::Colors).boxed(),
            (0u16..=28_671).prop_map(PlayerProp::PlayerId).boxed(),
            text.prop_map(PlayerProp::CurLevel).boxed(),
            text.prop_map(PlayerProp::Gani).boxed(),
            text.prop_map(PlayerProp::HeadImage).boxed(),
            (1u8..=30, text)
                .prop_map(|(index, value)| PlayerProp::Gattrib { index, value })
                .boxed(),
            (0u8..=63).prop_map(PlayerProp::GmapLevelX).boxed(),
            (0u8..=63).prop_map(PlayerProp::GmapLevelY).boxed(),
            (0u16..=4096).prop_map(|v| PlayerProp::X2(f32::from(v) / 16.0)).boxed(),
            (0u16..=4096).prop_map(|v| PlayerProp::Y2(f32::from(v) / 16.0)).boxed(),
            (0u8..=9, text)
                .prop_map(|(power, image)| PlayerProp::SwordPower { power, image })
                .boxed(),
            (0u8..=223).prop_map(PlayerProp::Status).boxed(),
            (0u32..=100_000).prop_map(PlayerProp::OnlineSecs).boxed(),
        ];
        proptest::strategy::Union::new(strategies)
    }

    proptest! {
        #[test]
        fn stream_round_trip(props in prop::collection::vec(arb_prop(), 0..12)) {
            let bytes = encode_props(&props);
            let decoded = decode_props(&bytes).unwrap();
            prop_assert_eq!(decoded.unknown, None);
            prop_assert_eq!(decoded.props, props);
        }
    }
}
