//! Typed decode of server → client packets.

use bytes::Bytes;

use crate::{
    board,
    codecs::PacketReader,
    errors::Result,
    packets::registry::ServerPacketId,
    props::{self, PropStream},
};

/// One decoded server packet.
///
/// Ids the registry knows decode into a named record; anything else lands in
/// [`ServerPacket::Unknown`] and is reported through the event bus instead of
/// failing the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerPacket {
    /// Legacy full-board text packet (id 0); kept raw.
    LevelBoard {
        /// Unparsed body.
        data: Bytes,
    },
    /// A warp link of the current level (id 1).
    LevelLink {
        /// Parsed link record.
        link: board::LevelLink,
    },
    /// Baddy state (id 2); opaque to the core.
    BaddyProps {
        /// Unparsed body.
        data: Bytes,
    },
    /// NPC property stream (id 3).
    NpcProps {
        /// NPC id.
        id: u32,
        /// Unparsed property bytes.
        props: Bytes,
    },
    /// A chest of the current level (id 4).
    LevelChest {
        /// Tile column.
        x: u8,
        /// Tile row.
        y: u8,
        /// Item type id.
        item: u8,
        /// Sign text shown on open.
        sign: String,
    },
    /// A sign of the current level (id 5).
    LevelSign {
        /// Tile column.
        x: u8,
        /// Tile row.
        y: u8,
        /// Encoded sign text.
        text: String,
    },
    /// Name of the level the player is entering (id 6).
    LevelName {
        /// Level file name.
        name: String,
    },
    /// In-place board edit (id 7).
    BoardModify {
        /// Region origin column.
        x: u8,
        /// Region origin row.
        y: u8,
        /// Region width.
        w: u8,
        /// Region height.
        h: u8,
        /// `w * h` replacement tiles, row-major.
        tiles: Vec<u16>,
    },
    /// Property stream of another player (id 8).
    OtherPlayerProps {
        /// Player id.
        id: u16,
        /// Decoded property prefix.
        props: PropStream,
    },
    /// Property stream of the local player (id 9).
    PlayerProps {
        /// Decoded property prefix.
        props: PropStream,
    },
    /// The local player leads the current level (id 10).
    IsLeader,
    /// Bomb placed (id 11).
    BombAdd {
        /// Owning player id.
        owner: u16,
        /// Tile column.
        x: f32,
        /// Tile row.
        y: f32,
        /// Bomb power.
        power: u8,
        /// Fuse timer.
        timer: u8,
    },
    /// Bomb removed (id 12).
    BombDel {
        /// Tile column.
        x: f32,
        /// Tile row.
        y: f32,
    },
    /// Public chat line (id 13).
    ToAll {
        /// Speaking player id.
        id: u16,
        /// Chat text.
        text: String,
    },
    /// Warp the local player (id 14).
    PlayerWarp {
        /// Target column.
        x: f32,
        /// Target row.
        y: f32,
        /// Target level name.
        level: String,
    },
    /// A warp was rejected (id 15).
    WarpFailed {
        /// Level that refused the warp.
        level: String,
    },
    /// Server is disconnecting us (id 16).
    DiscMessage {
        /// Human-readable reason.
        reason: String,
    },
    /// Horse placed (id 17).
    HorseAdd {
        /// Tile column.
        x: f32,
        /// Tile row.
        y: f32,
        /// Horse image.
        image: String,
    },
    /// Horse removed (id 18).
    HorseDel {
        /// Tile column.
        x: f32,
        /// Tile row.
        y: f32,
    },
    /// Arrow fired (id 19).
    ArrowAdd {
        /// Owning player id.
        owner: u16,
        /// Unparsed trajectory bytes.
        data: Bytes,
    },
    /// Fire effect (id 20).
    FireSpy {
        /// Owning player id.
        owner: u16,
        /// Unparsed body.
        data: Bytes,
    },
    /// Carried object thrown (id 21).
    ThrownCarried {
        /// Owning player id.
        owner: u16,
        /// Unparsed body.
        data: Bytes,
    },
    /// Item appeared (id 22).
    ItemAdd {
        /// Tile column.
        x: f32,
        /// Tile row.
        y: f32,
        /// Item type id.
        item: u8,
    },
    /// Item removed (id 23).
    ItemDel {
        /// Tile column.
        x: f32,
        /// Tile row.
        y: f32,
    },
    /// NPC moved (id 24).
    NpcMoved {
        /// NPC id.
        id: u32,
        /// Unparsed movement bytes.
        data: Bytes,
    },
    /// Login accepted (id 25).
    Signature {
        /// Server signature byte(s).
        data: Bytes,
    },
    /// NPC action (id 26).
    NpcAction {
        /// NPC id.
        id: u32,
        /// Unparsed body.
        data: Bytes,
    },
    /// Baddy hurt (id 27); opaque.
    BaddyHurt {
        /// Unparsed body.
        data: Bytes,
    },
    /// Server flag set (id 28).
    FlagSet {
        /// Flag name.
        name: String,
        /// Flag value (empty for bare flags).
        value: String,
    },
    /// NPC deleted (id 29).
    NpcDel {
        /// NPC id.
        id: u32,
    },
    /// File request failed (id 30).
    FileSendFailed {
        /// File name.
        name: String,
    },
    /// Server flag deleted (id 31).
    FlagDel {
        /// Flag name.
        name: String,
    },
    /// Show-image hint (id 32); opaque.
    ShowImg {
        /// Unparsed body.
        data: Bytes,
    },
    /// Weapon script granted (id 33).
    NpcWeaponAdd {
        /// Weapon name.
        name: String,
        /// Script body, opaque to the core.
        script: Bytes,
    },
    /// Weapon script revoked (id 34).
    NpcWeaponDel {
        /// Weapon name.
        name: String,
    },
    /// RC administrative message (id 35).
    RcAdminMessage {
        /// Message text.
        text: String,
    },
    /// Explosion (id 36).
    Explosion {
        /// Tile column.
        x: f32,
        /// Tile row.
        y: f32,
        /// Blast power.
        power: u8,
    },
    /// Private message (id 37).
    PrivateMessage {
        /// Sending player id.
        from: u16,
        /// Message text.
        text: String,
    },
    /// Push-away impulse (id 38); opaque.
    PushAway {
        /// Unparsed body.
        data: Bytes,
    },
    /// Modification time of the current level (id 39).
    LevelModTime {
        /// Unix timestamp.
        modtime: u64,
    },
    /// The local player was hurt (id 40).
    HurtPlayer {
        /// Attacking player id.
        from: u16,
        /// Damage in hearts.
        damage: f32,
    },
    /// Server start message (id 41).
    StartMessage {
        /// Message text.
        text: String,
    },
    /// Heartbeat / world clock (id 42).
    NewWorldTime {
        /// Server world time.
        time: u32,
    },
    /// Default weapon assignment (id 43).
    DefaultWeapon {
        /// Weapon id.
        weapon: u8,
    },
    /// The server runs an NPC-server (id 44).
    HasNpcServer,
    /// A requested file is already current (id 45).
    FileUpToDate {
        /// File name.
        name: String,
    },
    /// Hit-test result (id 46); opaque.
    HitObjects {
        /// Unparsed body.
        data: Bytes,
    },
    /// Staff guild list (id 47).
    StaffGuilds {
        /// Comma-separated guild names.
        guilds: String,
    },
    /// Server-side trigger (id 48).
    TriggerAction {
        /// Action name.
        action: String,
        /// Action arguments.
        args: Vec<String>,
    },
    /// High-precision warp used on GMAPs (id 49).
    GmapWarp {
        /// World X in tiles.
        x2: f32,
        /// World Y in tiles.
        y2: f32,
        /// World Z in tiles.
        z2: f32,
        /// Segment column.
        gmaplevelx: u8,
        /// Segment row.
        gmaplevely: u8,
        /// Level (usually the gmap) name.
        level: String,
    },
    /// A player entered our awareness (id 55).
    AddPlayer {
        /// Player id.
        id: u16,
        /// Decoded property prefix.
        props: PropStream,
    },
    /// A player left our awareness (id 56).
    DelPlayer {
        /// Player id.
        id: u16,
    },
    /// Large file transfer begins (id 68).
    LargeFileStart {
        /// File name.
        name: String,
    },
    /// Large file transfer complete (id 69).
    LargeFileEnd {
        /// File name.
        name: String,
        /// Informal checksum, when the server sends one.
        checksum: Option<u64>,
    },
    /// Size announcement for the active large file (id 84).
    LargeFileSize {
        /// Total size in bytes.
        size: u64,
    },
    /// Raw-data preamble (id 100); consumed by the batch splitter, decoded
    /// here for completeness.
    RawData {
        /// Announced byte count.
        size: u64,
    },
    /// Board data carved from a raw chunk (id 101).
    BoardPacket {
        /// 4096 normalized tile ids.
        tiles: Vec<u16>,
    },
    /// File content (id 102), possibly one chunk of a large transfer.
    File {
        /// Modification time.
        modtime: u64,
        /// File name.
        name: String,
        /// Content bytes.
        data: Bytes,
    },
    /// Ghost-mode toggle (id 170).
    GhostMode {
        /// Whether ghost mode is active.
        active: bool,
    },
    /// Big-map layout hint (id 171); opaque.
    BigMap {
        /// Unparsed body.
        data: Bytes,
    },
    /// Minimap layout hint (id 172); opaque.
    Minimap {
        /// Unparsed body.
        data: Bytes,
    },
    /// Redirect to another server (id 178).
    ServerWarp {
        /// Target descriptor, unparsed.
        descriptor: String,
    },
    /// High-rate movement update (id 189); opaque.
    Move2 {
        /// Unparsed body.
        data: Bytes,
    },
    /// High-rate shot update (id 191); opaque.
    Shoot2 {
        /// Unparsed body.
        data: Bytes,
    },
    /// Id missing from the registry.
    Unknown {
        /// Wire packet id.
        id: u8,
        /// Raw body.
        data: Bytes,
    },
}

impl ServerPacket {
    /// Decode one logical packet body.
    ///
    /// Errors are scoped to this packet: the caller logs, skips, and moves to
    /// the next packet in the batch.
    pub fn decode(id: u8, body: &Bytes) -> Result<Self> {
        let Some(known) = ServerPacketId::from_u8(id) else {
            return Ok(Self::Unknown { id, data: body.clone() });
        };

        let mut r = PacketReader::new(body);
        let packet = match known {
            ServerPacketId::LevelBoard => Self::LevelBoard { data: body.clone() },
            ServerPacketId::LevelLink => {
                let line = r.rest_string();
                let mut tokens = line.split_whitespace();
                let dest = tokens.next().unwrap_or("").to_string();
                let mut coord = || tokens.next().unwrap_or("0").parse::<u8>().unwrap_or(0);
                let (x, y, w, h) = (coord(), coord(), coord(), coord());
                let dest_x = tokens.next().unwrap_or("0").to_string();
                let dest_y = tokens.next().unwrap_or("0").to_string();
                Self::LevelLink { link: board::LevelLink { dest, x, y, w, h, dest_x, dest_y } }
            },
            ServerPacketId::BaddyProps => Self::BaddyProps { data: body.clone() },
            ServerPacketId::NpcProps => {
                let id = r.gint3()?;
                Self::NpcProps { id, props: Bytes::copy_from_slice(r.rest()) }
            },
            ServerPacketId::LevelChest => {
                let x = r.gchar()?;
                let y = r.gchar()?;
                let item = r.gchar()?;
                Self::LevelChest { x, y, item, sign: r.rest_string() }
            },
            ServerPacketId::LevelSign => {
                let x = r.gchar()?;
                let y = r.gchar()?;
                Self::LevelSign { x, y, text: r.rest_string() }
            },
            ServerPacketId::LevelName => Self::LevelName { name: r.rest_string() },
            ServerPacketId::BoardModify => {
                let x = r.gchar()?;
                let y = r.gchar()?;
                let w = r.gchar()?;
                let h = r.gchar()?;
                let tiles = board::decode_tile_run(&r.rest_string())?;
                Self::BoardModify { x, y, w, h, tiles }
            },
            ServerPacketId::OtherPlayerProps => {
                let id = r.gshort()?;
                Self::OtherPlayerProps { id, props: props::decode_props(r.rest())? }
            },
            ServerPacketId::PlayerProps => {
                Self::PlayerProps { props: props::decode_props(r.rest())? }
            },
            ServerPacketId::IsLeader => Self::IsLeader,
            ServerPacketId::BombAdd => {
                let owner = r.gshort()?;
                let x = r.half_tile()?;
                let y = r.half_tile()?;
                let power = r.gchar()?;
                let timer = if r.is_empty() { 55 } else { r.gchar()? };
                Self::BombAdd { owner, x, y, power, timer }
            },
            ServerPacketId::BombDel => {
                Self::BombDel { x: r.half_tile()?, y: r.half_tile()? }
            },
            ServerPacketId::ToAll => {
                let id = r.gshort()?;
                Self::ToAll { id, text: r.rest_string() }
            },
            ServerPacketId::PlayerWarp => {
                let x = r.half_tile()?;
                let y = r.half_tile()?;
                Self::PlayerWarp { x, y, level: r.rest_string() }
            },
            ServerPacketId::WarpFailed => Self::WarpFailed { level: r.rest_string() },
            ServerPacketId::DiscMessage => Self::DiscMessage { reason: r.rest_string() },
            ServerPacketId::HorseAdd => {
                let x = r.half_tile()?;
                let y = r.half_tile()?;
                Self::HorseAdd { x, y, image: r.rest_string() }
            },
            ServerPacketId::HorseDel => {
                Self::HorseDel { x: r.half_tile()?, y: r.half_tile()? }
            },
            ServerPacketId::ArrowAdd => {
                let owner = r.gshort()?;
                Self::ArrowAdd { owner, data: Bytes::copy_from_slice(r.rest()) }
            },
            ServerPacketId::FireSpy => {
                let owner = r.gshort()?;
                Self::FireSpy { owner, data: Bytes::copy_from_slice(r.rest()) }
            },
            ServerPacketId::ThrownCarried => {
                let owner = r.gshort()?;
                Self::ThrownCarried { owner, data: Bytes::copy_from_slice(r.rest()) }
            },
            ServerPacketId::ItemAdd => {
                let x = r.half_tile()?;
                let y = r.half_tile()?;
                Self::ItemAdd { x, y, item: r.gchar()? }
            },
            ServerPacketId::ItemDel => {
                Self::ItemDel { x: r.half_tile()?, y: r.half_tile()? }
            },
            ServerPacketId::NpcMoved => {
                let id = r.gint3()?;
                Self::NpcMoved { id, data: Bytes::copy_from_slice(r.rest()) }
            },
            ServerPacketId::Signature => Self::Signature { data: body.clone() },
            ServerPacketId::NpcAction => {
                let id = r.gint3()?;
                Self::NpcAction { id, data: Bytes::copy_from_slice(r.rest()) }
            },
            ServerPacketId::BaddyHurt => Self::BaddyHurt { data: body.clone() },
            ServerPacketId::FlagSet => {
                let line = r.rest_string();
                match line.split_once('=') {
                    Some((name, value)) => {
                        Self::FlagSet { name: name.to_string(), value: value.to_string() }
                    },
                    None => Self::FlagSet { name: line, value: String::new() },
                }
            },
            ServerPacketId::NpcDel => Self::NpcDel { id: r.gint3()? },
            ServerPacketId::FileSendFailed => Self::FileSendFailed { name: r.rest_string() },
            ServerPacketId::FlagDel => Self::FlagDel { name: r.rest_string() },
            ServerPacketId::ShowImg => Self::ShowImg { data: body.clone() },
            ServerPacketId::NpcWeaponAdd => {
                let name = r.gstring()?;
                Self::NpcWeaponAdd { name, script: Bytes::copy_from_slice(r.rest()) }
            },
            ServerPacketId::NpcWeaponDel => Self::NpcWeaponDel { name: r.rest_string() },
            ServerPacketId::RcAdminMessage => Self::RcAdminMessage { text: r.rest_string() },
            ServerPacketId::Explosion => {
                let x = r.half_tile()?;
                let y = r.half_tile()?;
                Self::Explosion { x, y, power: r.gchar()? }
            },
            ServerPacketId::PrivateMessage => {
                let from = r.gshort()?;
                Self::PrivateMessage { from, text: r.rest_string() }
            },
            ServerPacketId::PushAway => Self::PushAway { data: body.clone() },
            ServerPacketId::LevelModTime => Self::LevelModTime { modtime: r.gint5()? },
            ServerPacketId::HurtPlayer => {
                let from = r.gshort()?;
                let damage = f32::from(r.gchar()?) / 2.0;
                Self::HurtPlayer { from, damage }
            },
            ServerPacketId::StartMessage => Self::StartMessage { text: r.rest_string() },
            ServerPacketId::NewWorldTime => Self::NewWorldTime { time: r.gint4()? },
            ServerPacketId::DefaultWeapon => Self::DefaultWeapon { weapon: r.gchar()? },
            ServerPacketId::HasNpcServer => Self::HasNpcServer,
            ServerPacketId::FileUpToDate => Self::FileUpToDate { name: r.rest_string() },
            ServerPacketId::HitObjects => Self::HitObjects { data: body.clone() },
            ServerPacketId::StaffGuilds => Self::StaffGuilds { guilds: r.rest_string() },
            ServerPacketId::TriggerAction => {
                let line = r.rest_string();
                let mut parts = line.split(',').map(str::to_string);
                let action = parts.next().unwrap_or_default();
                Self::TriggerAction { action, args: parts.collect() }
            },
            ServerPacketId::GmapWarp => {
                let x2 = f32::from(r.gshort()?) / 16.0;
                let y2 = f32::from(r.gshort()?) / 16.0;
                let z2 = f32::from(r.gshort()?) / 16.0;
                let gmaplevelx = r.gchar()?;
                let gmaplevely = r.gchar()?;
                Self::GmapWarp { x2, y2, z2, gmaplevelx, gmaplevely, level: r.rest_string() }
            },
            ServerPacketId::AddPlayer => {
                let id = r.gshort()?;
                Self::AddPlayer { id, props: props::decode_props(r.rest())? }
            },
            ServerPacketId::DelPlayer => Self::DelPlayer { id: r.gshort()? },
            ServerPacketId::LargeFileStart => Self::LargeFileStart { name: r.rest_string() },
            ServerPacketId::LargeFileEnd => {
                let name = r.gstring()?;
                let checksum = if r.is_empty() { None } else { Some(r.gint_var()?) };
                Self::LargeFileEnd { name, checksum }
            },
            ServerPacketId::LargeFileSize => Self::LargeFileSize { size: r.gint5()? },
            ServerPacketId::RawData => Self::RawData { size: r.gint_var()? },
            ServerPacketId::BoardPacket => Self::BoardPacket { tiles: board::decode_board(body)? },
            ServerPacketId::File => {
                let modtime = r.gint5()?;
                let name = r.gstring()?;
                Self::File { modtime, name, data: Bytes::copy_from_slice(r.rest()) }
            },
            ServerPacketId::GhostMode => Self::GhostMode { active: r.gchar()? != 0 },
            ServerPacketId::BigMap => Self::BigMap { data: body.clone() },
            ServerPacketId::Minimap => Self::Minimap { data: body.clone() },
            ServerPacketId::ServerWarp => Self::ServerWarp { descriptor: r.rest_string() },
            ServerPacketId::Move2 => Self::Move2 { data: body.clone() },
            ServerPacketId::Shoot2 => Self::Shoot2 { data: body.clone() },
        };
        Ok(packet)
    }
}
