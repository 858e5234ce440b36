//! Static id tables for both directions.

/// Coarse grouping of packet ids, used for filtering and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketCategory {
    /// Login, liveness, level lifecycle.
    Core,
    /// Player and projectile movement.
    Movement,
    /// Damage, explosions, thrown objects.
    Combat,
    /// File transfer and board streaming.
    Files,
    /// Flags, text channels, administrative messages.
    System,
    /// Client-presentation hints (images, minimaps, ghost mode).
    Ui,
    /// NPC and baddy state.
    Npcs,
}

/// Server → client packet ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(missing_docs)] // names mirror the wire protocol's packet table
pub enum ServerPacketId {
    LevelBoard = 0,
    LevelLink = 1,
    BaddyProps = 2,
    NpcProps = 3,
    LevelChest = 4,
    LevelSign = 5,
    LevelName = 6,
    BoardModify = 7,
    OtherPlayerProps = 8,
    PlayerProps = 9,
    IsLeader = 10,
    BombAdd = 11,
    BombDel = 12,
    ToAll = 13,
    PlayerWarp = 14,
    WarpFailed = 15,
    DiscMessage = 16,
    HorseAdd = 17,
    HorseDel = 18,
    ArrowAdd = 19,
    FireSpy = 20,
    ThrownCarried = 21,
    ItemAdd = 22,
    ItemDel = 23,
    NpcMoved = 24,
    Signature = 25,
    NpcAction = 26,
    BaddyHurt = 27,
    FlagSet = 28,
    NpcDel = 29,
    FileSendFailed = 30,
    FlagDel = 31,
    ShowImg = 32,
    NpcWeaponAdd = 33,
    NpcWeaponDel = 34,
    RcAdminMessage = 35,
    Explosion = 36,
    PrivateMessage = 37,
    PushAway = 38,
    LevelModTime = 39,
    HurtPlayer = 40,
    StartMessage = 41,
    NewWorldTime = 42,
    DefaultWeapon = 43,
    HasNpcServer = 44,
    FileUpToDate = 45,
    HitObjects = 46,
    StaffGuilds = 47,
    TriggerAction = 48,
    GmapWarp = 49,
    AddPlayer = 55,
    DelPlayer = 56,
    LargeFileStart = 68,
    LargeFileEnd = 69,
    LargeFileSize = 84,
    RawData = 100,
    BoardPacket = 101,
    File = 102,
    GhostMode = 170,
    BigMap = 171,
    Minimap = 172,
    ServerWarp = 178,
    Move2 = 189,
    Shoot2 = 191,
}

impl ServerPacketId {
    /// Wire id.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Look an id up in the registry.
    #[must_use]
    pub fn from_u8(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::LevelBoard),
            1 => Some(Self::LevelLink),
            2 => Some(Self::BaddyProps),
            3 => Some(Self::NpcProps),
            4 => Some(Self::LevelChest),
            5 => Some(Self::LevelSign),
            6 => Some(Self::LevelName),
            7 => Some(Self::BoardModify),
            8 => Some(Self::OtherPlayerProps),
            9 => Some(Self::PlayerProps),
            10 => Some(Self::IsLeader),
            11 => Some(Self::BombAdd),
            12 => Some(Self::BombDel),
            13 => Some(Self::ToAll),
            14 => Some(Self::PlayerWarp),
            15 => Some(Self::WarpFailed),
            16 => Some(Self::DiscMessage),
            17 => Some(Self::HorseAdd),
            18 => Some(Self::HorseDel),
            19 => Some(Self::ArrowAdd),
            20 => Some(Self::FireSpy),
            21 => Some(Self::ThrownCarried),
            22 => Some(Self::ItemAdd),
            23 => Some(Self::ItemDel),
            24 => Some(Self::NpcMoved),
            25 => Some(Self::Signature),
            26 => Some(Self::NpcAction),
            27 => Some(Self::BaddyHurt),
            28 => Some(Self::FlagSet),
            29 => Some(Self::NpcDel),
            30 => Some(Self::FileSendFailed),
            31 => Some(Self::FlagDel),
            32 => Some(Self::ShowImg),
            33 => Some(Self::NpcWeaponAdd),
            34 => Some(Self::NpcWeaponDel),
            35 => Some(Self::RcAdminMessage),
            36 => Some(Self::Explosion),
            37 => Some(Self::PrivateMessage),
            38 => Some(Self::PushAway),
            39 => Some(Self::LevelModTime),
            40 => Some(Self::HurtPlayer),
            41 => Some(Self::StartMessage),
            42 => Some(Self::NewWorldTime),
            43 => Some(Self::DefaultWeapon),
            44 => Some(Self::HasNpcServer),
            45 => Some(Self::FileUpToDate),
            46 => Some(Self::HitObjects),
            47 => Some(Self::StaffGuilds),
            48 => Some(Self::TriggerAction),
            49 => Some(Self::GmapWarp),
            55 => Some(Self::AddPlayer),
            56 => Some(Self::DelPlayer),
            68 => Some(Self::LargeFileStart),
            69 => Some(Self::LargeFileEnd),
            84 => Some(Self::LargeFileSize),
            100 => Some(Self::RawData),
            101 => Some(Self::BoardPacket),
            102 => Some(Self::File),
            170 => Some(Self::GhostMode),
            171 => Some(Self::BigMap),
            172 => Some(Self::Minimap),
            178 => Some(Self::ServerWarp),
            189 => Some(Self::Move2),
            191 => Some(Self::Shoot2),
            _ => None,
        }
    }

    /// Registry category of this id.
    #[must_use]
    pub const fn category(self) -> PacketCategory {
        match self {
            Self::LevelBoard
            | Self::LevelLink
            | Self::LevelChest
            | Self::LevelSign
            | Self::LevelName
            | Self::BoardModify
            | Self::OtherPlayerProps
            | Self::PlayerProps
            | Self::IsLeader
            | Self::PlayerWarp
            | Self::WarpFailed
            | Self::DiscMessage
            | Self::Signature
            | Self::AddPlayer
            | Self::DelPlayer
            | Self::NewWorldTime
            | Self::LevelModTime
            | Self::GmapWarp
            | Self::ServerWarp => PacketCategory::Core,

            Self::HorseAdd | Self::HorseDel | Self::Move2 | Self::PushAway => {
                PacketCategory::Movement
            },

            Self::BombAdd
            | Self::BombDel
            | Self::ArrowAdd
            | Self::FireSpy
            | Self::ThrownCarried
            | Self::Explosion
            | Self::HurtPlayer
            | Self::HitObjects
            | Self::Shoot2
            | Self::ItemAdd
            | Self::ItemDel => PacketCategory::Combat,

            Self::FileSendFailed
            | Self::FileUpToDate
            | Self::LargeFileStart
            | Self::LargeFileEnd
            | Self::LargeFileSize
            | Self::RawData
            | Self::BoardPacket
            | Self::File => PacketCategory::Files,

            Self::ToAll
            | Self::PrivateMessage
            | Self::FlagSet
            | Self::FlagDel
            | Self::RcAdminMessage
            | Self::StartMessage
            | Self::StaffGuilds
            | Self::TriggerAction
            | Self::HasNpcServer => PacketCategory::System,

            Self::ShowImg | Self::GhostMode | Self::BigMap | Self::Minimap => PacketCategory::Ui,

            Self::BaddyProps
            | Self::BaddyHurt
            | Self::NpcProps
            | Self::NpcMoved
            | Self::NpcAction
            | Self::NpcDel
            | Self::NpcWeaponAdd
            | Self::NpcWeaponDel
            | Self::DefaultWeapon => PacketCategory::Npcs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_lookup() {
        for id in 0..=u8::MAX {
            if let Some(packet) = ServerPacketId::from_u8(id) {
                assert_eq!(packet.as_u8(), id);
            }
        }
    }

    #[test]
    fn spot_check_wire_values() {
        assert_eq!(ServerPacketId::Signature.as_u8(), 25);
        assert_eq!(ServerPacketId::NewWorldTime.as_u8(), 42);
        assert_eq!(ServerPacketId::RawData.as_u8(), 100);
        assert_eq!(ServerPacketId::BoardPacket.as_u8(), 101);
        assert_eq!(ServerPacketId::GmapWarp.as_u8(), 49);
        assert_eq!(ServerPacketId::from_u8(199), None);
    }

    #[test]
    fn categories_cover_the_file_transfer_family() {
        for id in [
            ServerPacketId::RawData,
            ServerPacketId::BoardPacket,
            ServerPacketId::File,
            ServerPacketId::LargeFileStart,
            ServerPacketId::LargeFileEnd,
        ] {
            assert_eq!(id.category(), PacketCategory::Files);
        }
    }
}
