//! Session state machine.
//!
//! Pure and Sans-IO, in the action pattern: methods take the current time as
//! a parameter and return [`SessionAction`]s for the driver to execute
//! (send a packet, publish an event, close the connection). No method here
//! performs I/O or reads a clock.
//!
//! # State machine
//!
//! ```text
//! ┌──────────────┐ connect  ┌────────────┐ login   ┌─────────────┐
//! │ Disconnected │─────────>│ Connecting │────────>│ Handshaking │
//! └──────────────┘          └────────────┘         └─────────────┘
//!        ▲                                                │
//!        │          discmessage / timeout / close         │ signature
//!        └────────────────────────────────────────────────┤
//!        ▲                                                ▼
//!        │                                        ┌───────────────┐
//!        └────────────────────────────────────────│ Authenticated │
//!                                                 └───────────────┘
//! ```
//!
//! Generic over the instant type so tests drive time explicitly, the same
//! way production passes `std::time::Instant`.

use std::{
    collections::HashSet,
    ops::Sub,
    time::{Duration, Instant},
};

use reborn_proto::{
    ClientPacket, ServerPacket,
    props::{PlayerProp, PropStream},
};

use crate::{
    error::SessionError,
    event::{DisconnectReason, Event},
    transfer::{ChunkOutcome, FileTransfers},
    world::{Direction, Gmap, Level, World, wrap_position},
};

/// Default heartbeat silence bound.
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default level cache capacity.
pub const DEFAULT_CACHE_CAPACITY: usize = 64;

/// Default client-type byte (pre-offset).
pub const DEFAULT_CLIENT_TYPE: u8 = 0x37;

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection.
    Disconnected,
    /// TCP established, login not yet sent.
    Connecting,
    /// Login sent, waiting for the server signature.
    Handshaking,
    /// Signature received; the full packet set is live.
    Authenticated,
}

/// Actions returned by the state machine for the driver to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Queue this packet for sending.
    Send(ClientPacket),
    /// Publish this event on the bus.
    Emit(Event),
    /// Tear the connection down; the matching `Disconnected` event precedes
    /// this action.
    Close(DisconnectReason),
}

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Protocol version tag sent at login.
    pub version: String,
    /// Client-type byte (pre-offset).
    pub client_type: u8,
    /// Platform identity line sent at login.
    pub identity: String,
    /// Heartbeat silence bound before a `Timeout` disconnect.
    pub heartbeat_timeout: Duration,
    /// Level cache capacity.
    pub level_cache_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            version: reborn_proto::versions::V6_037.to_string(),
            client_type: DEFAULT_CLIENT_TYPE,
            identity: "PC,,,,,Reborn".to_string(),
            heartbeat_timeout: DEFAULT_HEARTBEAT_TIMEOUT,
            level_cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// The session: state machine plus the world model it owns.
#[derive(Debug)]
pub struct Session<I = Instant>
where
    I: Copy + Sub<Output = Duration>,
{
    state: SessionState,
    config: SessionConfig,
    world: World,
    transfers: FileTransfers,
    /// Most recently started large transfer, target of `largefilesize`.
    active_transfer: Option<String>,
    /// Files requested via `wantfile` and not yet resolved.
    requested_files: HashSet<String>,
    /// Arrival time of the last `newworldtime`.
    last_heartbeat: Option<I>,
    /// When the login packet went out.
    handshake_started: Option<I>,
}

impl<I> Session<I>
where
    I: Copy + Sub<Output = Duration>,
{
    /// Fresh session in [`SessionState::Disconnected`].
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        let cache = config.level_cache_capacity;
        Self {
            state: SessionState::Disconnected,
            config,
            world: World::new(cache),
            transfers: FileTransfers::new(),
            active_transfer: None,
            requested_files: HashSet::new(),
            last_heartbeat: None,
            handshake_started: None,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Session configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Read access to the world model.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    fn require_authenticated(&self, action: &'static str) -> Result<(), SessionError> {
        if self.state == SessionState::Authenticated {
            Ok(())
        } else {
            Err(SessionError::NotReady { action, state: self.state })
        }
    }

    /// Begin connecting. World state from a previous session is discarded; a
    /// fresh connect is a fresh session.
    pub fn begin_connect(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Disconnected {
            return Err(SessionError::NotReady { action: "connect", state: self.state });
        }
        self.world = World::new(self.config.level_cache_capacity);
        self.transfers = FileTransfers::new();
        self.active_transfer = None;
        self.requested_files.clear();
        self.last_heartbeat = None;
        self.handshake_started = None;
        self.state = SessionState::Connecting;
        Ok(())
    }

    /// TCP is up and the codecs are seeded.
    pub fn connected(&mut self) -> Vec<SessionAction> {
        vec![SessionAction::Emit(Event::Connected)]
    }

    /// Send the login packet.
    ///
    /// `key` is the cipher key the driver seeded both codec directions with;
    /// it rides inside the packet so the server can mirror it.
    pub fn login(
        &mut self,
        account: &str,
        password: &str,
        key: u8,
        now: I,
    ) -> Result<Vec<SessionAction>, SessionError> {
        if self.state != SessionState::Connecting {
            return Err(SessionError::NotReady { action: "login", state: self.state });
        }
        self.state = SessionState::Handshaking;
        self.handshake_started = Some(now);
        self.world.local.account = account.to_string();

        Ok(vec![SessionAction::Send(ClientPacket::Login {
            client_type: self.config.client_type,
            key,
            version: self.config.version.clone(),
            account: account.to_string(),
            password: password.to_string(),
            identity: self.config.identity.clone(),
        })])
    }

    /// Close the session. Idempotent; later calls return nothing.
    pub fn disconnect(&mut self, reason: DisconnectReason) -> Vec<SessionAction> {
        if self.state == SessionState::Disconnected {
            return Vec::new();
        }
        self.state = SessionState::Disconnected;
        vec![
            SessionAction::Emit(Event::Disconnected(reason.clone())),
            SessionAction::Close(reason),
        ]
    }

    /// Periodic maintenance: heartbeat and handshake timeouts.
    pub fn tick(&mut self, now: I) -> Vec<SessionAction> {
        let bound = self.config.heartbeat_timeout;
        match self.state {
            SessionState::Authenticated => {
                if let Some(last) = self.last_heartbeat {
                    if now - last > bound {
                        return self.disconnect(DisconnectReason::Timeout);
                    }
                }
            },
            SessionState::Handshaking => {
                if let Some(started) = self.handshake_started {
                    if now - started > bound {
                        return self.disconnect(DisconnectReason::Timeout);
                    }
                }
            },
            _ => {},
        }
        Vec::new()
    }

    /// Dispatch one decoded inbound packet, mutating the world and producing
    /// follow-up actions. Never fails: malformed packets were already
    /// filtered by the decode layer, and unknown content becomes events.
    #[allow(clippy::too_many_lines)] // one arm per packet id, by design
    pub fn handle_packet(&mut self, packet: ServerPacket, now: I) -> Vec<SessionAction> {
        let mut actions = Vec::new();

        match packet {
            ServerPacket::Signature { .. } => {
                if self.state == SessionState::Handshaking {
                    self.state = SessionState::Authenticated;
                    self.last_heartbeat = Some(now);
                    actions.push(SessionAction::Emit(Event::Authenticated));
                }
            },
            ServerPacket::DiscMessage { reason } => {
                let reason = if self.state == SessionState::Handshaking {
                    DisconnectReason::AuthFailed(reason)
                } else {
                    DisconnectReason::Kicked(reason)
                };
                actions.extend(self.disconnect(reason));
            },
            ServerPacket::NewWorldTime { time } => {
                self.last_heartbeat = Some(now);
                self.world.time = time;
            },

            ServerPacket::PlayerProps { props } => {
                self.apply_local_props(&props, &mut actions);
            },
            ServerPacket::OtherPlayerProps { id, props }
            | ServerPacket::AddPlayer { id, props } => {
                if let Some(unknown) = props.unknown {
                    actions.push(SessionAction::Emit(Event::UnknownProperty(unknown)));
                }
                let (player, created) = self.world.upsert_player(id);
                player.apply_props(&props.props);
                actions.push(SessionAction::Emit(if created {
                    Event::PlayerAdded(id)
                } else {
                    Event::PlayerUpdated(id)
                }));
            },
            ServerPacket::DelPlayer { id } => {
                if self.world.remove_player(id).is_some() {
                    actions.push(SessionAction::Emit(Event::PlayerRemoved(id)));
                }
            },

            ServerPacket::ToAll { id, text } => {
                if let Some(player) = self.world.player_mut(id) {
                    player.chat.clone_from(&text);
                }
                actions.push(SessionAction::Emit(Event::ChatMessage { id, text }));
            },
            ServerPacket::PrivateMessage { from, text } => {
                actions.push(SessionAction::Emit(Event::PrivateMessage { from, text }));
            },

            ServerPacket::LevelName { name } => {
                self.enter_level(&name, &mut actions);
            },
            ServerPacket::PlayerWarp { x, y, level } => {
                self.world.local.set_x(x);
                self.world.local.set_y(y);
                self.enter_level(&level, &mut actions);
            },
            ServerPacket::GmapWarp { x2, y2, z2, gmaplevelx, gmaplevely, level } => {
                self.world.local.set_gmaplevelx(gmaplevelx);
                self.world.local.set_gmaplevely(gmaplevely);
                self.world.local.set_x2(x2);
                self.world.local.set_y2(y2);
                self.world.local.apply_prop(&PlayerProp::Z2(z2));
                self.enter_level(&level, &mut actions);
            },
            ServerPacket::WarpFailed { .. } => {},
            ServerPacket::LevelModTime { modtime } => {
                if let Some(level) = self.world.current_level_entry() {
                    level.modtime = modtime;
                }
            },

            ServerPacket::BoardPacket { tiles } => {
                if let Some(target) = self.world.board_target() {
                    self.world.levels.entry(&target).apply_board(&tiles);
                    actions.push(SessionAction::Emit(Event::LevelBoardLoaded(target)));
                }
            },
            ServerPacket::LevelBoard { .. } => {},
            ServerPacket::BoardModify { x, y, w, h, tiles } => {
                if let Some(target) = self.world.board_target() {
                    self.world.levels.entry(&target).modify_board(x, y, w, h, &tiles);
                }
            },
            ServerPacket::LevelLink { link } => {
                if let Some(level) = self.world.current_level_entry() {
                    level.links.push(link);
                }
            },
            ServerPacket::LevelSign { x, y, text } => {
                if let Some(level) = self.world.current_level_entry() {
                    level.signs.push(reborn_proto::board::LevelSign { x, y, text });
                }
            },
            ServerPacket::LevelChest { x, y, item, sign } => {
                if let Some(level) = self.world.current_level_entry() {
                    level.chests.push(reborn_proto::board::LevelChest {
                        x,
                        y,
                        item: item.to_string(),
                        sign,
                    });
                }
            },

            ServerPacket::ItemAdd { x, y, item } => {
                if let Some(level) = self.world.current_level_entry() {
                    level.add_item(x, y, item);
                }
                actions.push(SessionAction::Emit(Event::ItemAdded { x, y, item }));
            },
            ServerPacket::ItemDel { x, y } => {
                if let Some(level) = self.world.current_level_entry() {
                    level.remove_item(x, y);
                }
                actions.push(SessionAction::Emit(Event::ItemRemoved { x, y }));
            },

            ServerPacket::NpcProps { id, props } => {
                let current = self.world.current_level().unwrap_or_default().to_string();
                let npc = self.world.upsert_npc(id);
                npc.props = props;
                if npc.level.is_empty() {
                    npc.level = current;
                }
            },
            ServerPacket::NpcMoved { id, .. } | ServerPacket::NpcAction { id, .. } => {
                self.world.upsert_npc(id);
            },
            ServerPacket::NpcDel { id } => {
                self.world.remove_npc(id);
            },
            ServerPacket::NpcWeaponAdd { name, .. } => {
                self.world.add_weapon(name);
            },
            ServerPacket::NpcWeaponDel { name } => {
                self.world.remove_weapon(&name);
            },

            ServerPacket::FlagSet { name, value } => {
                self.world.set_flag(name.clone(), value.clone());
                actions.push(SessionAction::Emit(Event::FlagSet { name, value }));
            },
            ServerPacket::FlagDel { name } => {
                if self.world.delete_flag(&name) {
                    actions.push(SessionAction::Emit(Event::FlagDeleted(name)));
                }
            },

            ServerPacket::TriggerAction { action, args } => {
                actions.push(SessionAction::Emit(Event::TriggerAction { action, args }));
            },
            ServerPacket::Explosion { x, y, power } => {
                actions.push(SessionAction::Emit(Event::Explosion { x, y, power }));
            },
            ServerPacket::HurtPlayer { from, damage } => {
                actions.push(SessionAction::Emit(Event::Hurt { from, damage }));
            },

            ServerPacket::File { name, data, .. } => {
                match self.transfers.chunk(&name, &data) {
                    ChunkOutcome::Buffered => {},
                    ChunkOutcome::Complete(bytes) => {
                        self.file_received(&name, &bytes, &mut actions);
                    },
                }
            },
            ServerPacket::LargeFileStart { name } => {
                self.transfers.start(&name);
                self.active_transfer = Some(name);
            },
            ServerPacket::LargeFileSize { size } => {
                if let Some(name) = self.active_transfer.clone() {
                    self.transfers.set_size(&name, size);
                }
            },
            ServerPacket::LargeFileEnd { name, .. } => {
                self.active_transfer = None;
                if let Some((data, _complete)) = self.transfers.finish(&name) {
                    self.file_received(&name, &data, &mut actions);
                }
            },
            ServerPacket::FileSendFailed { name } => {
                self.transfers.abort(&name);
                self.requested_files.remove(&name);
                actions.push(SessionAction::Emit(Event::FileTransferFailed(name)));
            },
            ServerPacket::FileUpToDate { name } => {
                self.requested_files.remove(&name);
            },
            ServerPacket::RawData { .. } => {},

            ServerPacket::StartMessage { text } | ServerPacket::RcAdminMessage { text } => {
                actions.push(SessionAction::Emit(Event::ServerText(text)));
            },
            ServerPacket::ServerWarp { descriptor } => {
                actions.push(SessionAction::Emit(Event::ServerWarp(descriptor)));
            },

            ServerPacket::Unknown { id, data } => {
                actions.push(SessionAction::Emit(Event::UnknownPacket { id, data }));
            },

            // Presentation hints and combat minutiae the core tracks no state
            // for.
            ServerPacket::IsLeader
            | ServerPacket::HasNpcServer
            | ServerPacket::StaffGuilds { .. }
            | ServerPacket::DefaultWeapon { .. }
            | ServerPacket::BaddyProps { .. }
            | ServerPacket::BaddyHurt { .. }
            | ServerPacket::BombAdd { .. }
            | ServerPacket::BombDel { .. }
            | ServerPacket::ArrowAdd { .. }
            | ServerPacket::FireSpy { .. }
            | ServerPacket::ThrownCarried { .. }
            | ServerPacket::HorseAdd { .. }
            | ServerPacket::HorseDel { .. }
            | ServerPacket::PushAway { .. }
            | ServerPacket::HitObjects { .. }
            | ServerPacket::ShowImg { .. }
            | ServerPacket::GhostMode { .. }
            | ServerPacket::BigMap { .. }
            | ServerPacket::Minimap { .. }
            | ServerPacket::Move2 { .. }
            | ServerPacket::Shoot2 { .. } => {},
        }

        actions
    }

    fn apply_local_props(&mut self, props: &PropStream, actions: &mut Vec<SessionAction>) {
        if let Some(unknown) = props.unknown {
            actions.push(SessionAction::Emit(Event::UnknownProperty(unknown)));
        }
        self.world.local.apply_props(&props.props);

        // A CURLEVEL in the stream moves us; keep the world's notion of the
        // current level in sync.
        let level = self.world.local.level.clone();
        if !level.is_empty() && self.world.current_level() != Some(level.as_str()) {
            self.enter_level(&level, actions);
        }

        let id = self.world.local.id;
        actions.push(SessionAction::Emit(Event::PlayerUpdated(id)));
    }

    /// Switch the current level, requesting the gmap manifest when entering
    /// a gmap whose manifest we do not hold.
    fn enter_level(&mut self, name: &str, actions: &mut Vec<SessionAction>) {
        self.world.enter_level(name);

        if name.ends_with(".gmap") {
            let held = self.world.gmap.as_ref().is_some_and(|g| g.name == name);
            if !held {
                self.request_file(name, actions);
            }
        } else {
            // Plain level: gmap tracking ends here.
            self.world.gmap = None;
            self.world.local.clear_gmap();
        }

        actions.push(SessionAction::Emit(Event::LevelEntered(name.to_string())));
    }

    fn request_file(&mut self, name: &str, actions: &mut Vec<SessionAction>) {
        if self.requested_files.insert(name.to_string()) {
            actions.push(SessionAction::Send(ClientPacket::WantFile(name.to_string())));
        }
    }

    fn file_received(&mut self, name: &str, data: &[u8], actions: &mut Vec<SessionAction>) {
        self.requested_files.remove(name);
        actions.push(SessionAction::Emit(Event::FileReceived {
            name: name.to_string(),
            data: bytes::Bytes::copy_from_slice(data),
        }));

        if name.ends_with(".nw") {
            let text = String::from_utf8_lossy(data);
            if let Ok(file) = reborn_proto::board::parse_level(&text) {
                self.world.levels.insert(Level::from_file(name, file));
                actions.push(SessionAction::Emit(Event::LevelBoardLoaded(name.to_string())));
            }
        } else if name.ends_with(".gmap") {
            let text = String::from_utf8_lossy(data);
            if let Ok(file) = reborn_proto::board::parse_gmap(&text) {
                if self.world.current_level() == Some(name) {
                    self.world.gmap = Some(Gmap::new(name, file));
                }
            }
        }
    }

    /// Move the local player, handling GMAP segment crossings.
    ///
    /// On a gmap, coordinates past a segment edge wrap to the opposite edge
    /// of the neighbor segment, the segment indices advance, the new child
    /// level is requested if uncached, and the update goes out as
    /// high-precision coordinates. Off gmaps the plain X/Y properties are
    /// sent. A direction, when given, is folded into the sprite.
    pub fn move_local(
        &mut self,
        x: f32,
        y: f32,
        direction: Option<Direction>,
        _now: I,
    ) -> Result<Vec<SessionAction>, SessionError> {
        self.require_authenticated("move_to")?;
        let mut actions = Vec::new();

        if let Some(dir) = direction {
            self.world.local.sprite = (self.world.local.sprite & !3) | dir.as_u8();
        }
        let sprite = self.world.local.sprite;

        let grid = self.world.gmap.as_ref().map(|g| (g.file.width, g.file.height));
        if let (Some((grid_w, grid_h)), true) = (grid, self.world.local.on_gmap()) {
            let col = self.world.local.gmaplevelx().unwrap_or(0);
            let row = self.world.local.gmaplevely().unwrap_or(0);
            let crossing = wrap_position(x, y, col, row, grid_w, grid_h);

            if crossing.crossed {
                self.world.local.set_gmaplevelx(crossing.col);
                self.world.local.set_gmaplevely(crossing.row);

                let child = self
                    .world
                    .gmap
                    .as_ref()
                    .and_then(|g| g.level_at(crossing.col, crossing.row))
                    .map(str::to_string);
                if let Some(child) = child {
                    if self.world.levels.peek(&child).is_none_or(|l| !l.board_loaded()) {
                        self.request_file(&child, &mut actions);
                    }
                }
            }

            self.world.local.set_x(crossing.x);
            self.world.local.set_y(crossing.y);

            let x2 = self.world.local.x2().unwrap_or(crossing.x);
            let y2 = self.world.local.y2().unwrap_or(crossing.y);
            actions.push(SessionAction::Send(ClientPacket::PlayerProps(vec![
                PlayerProp::X2(x2),
                PlayerProp::Y2(y2),
                PlayerProp::Sprite(sprite),
            ])));
        } else {
            self.world.local.set_x(x);
            self.world.local.set_y(y);
            actions.push(SessionAction::Send(ClientPacket::PlayerProps(vec![
                PlayerProp::X(x),
                PlayerProp::Y(y),
                PlayerProp::Sprite(sprite),
            ])));
        }

        Ok(actions)
    }

    /// Apply properties to the local player and send them.
    pub fn update_local_props(
        &mut self,
        props: Vec<PlayerProp>,
        action: &'static str,
    ) -> Result<Vec<SessionAction>, SessionError> {
        self.require_authenticated(action)?;
        self.world.local.apply_props(&props);
        Ok(vec![SessionAction::Send(ClientPacket::PlayerProps(props))])
    }

    /// Guard an arbitrary outbound packet on the authenticated state.
    pub fn send_packet(
        &self,
        packet: ClientPacket,
        action: &'static str,
    ) -> Result<Vec<SessionAction>, SessionError> {
        self.require_authenticated(action)?;
        Ok(vec![SessionAction::Send(packet)])
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use reborn_proto::board::parse_gmap;

    use super::*;

    fn authenticated_session() -> (Session, Instant) {
        let t0 = Instant::now();
        let mut session = Session::new(SessionConfig::default());
        session.begin_connect().unwrap();
        session.connected();
        session.login("myuser", "mypass", 0x42, t0).unwrap();
        session.handle_packet(ServerPacket::Signature { data: Bytes::new() }, t0);
        assert_eq!(session.state(), SessionState::Authenticated);
        (session, t0)
    }

    fn sends(actions: &[SessionAction]) -> Vec<&ClientPacket> {
        actions
            .iter()
            .filter_map(|a| match a {
                SessionAction::Send(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn login_flow_reaches_authenticated() {
        let t0 = Instant::now();
        let mut session = Session::new(SessionConfig::default());
        session.begin_connect().unwrap();
        assert_eq!(session.state(), SessionState::Connecting);

        let actions = session.login("myuser", "mypass", 0x42, t0).unwrap();
        assert_eq!(session.state(), SessionState::Handshaking);
        match &actions[..] {
            [SessionAction::Send(ClientPacket::Login { key, account, .. })] => {
                assert_eq!(*key, 0x42);
                assert_eq!(account, "myuser");
            },
            other => panic!("unexpected actions: {other:?}"),
        }

        let actions = session.handle_packet(ServerPacket::Signature { data: Bytes::new() }, t0);
        assert_eq!(session.state(), SessionState::Authenticated);
        assert!(actions.contains(&SessionAction::Emit(Event::Authenticated)));
    }

    #[test]
    fn actions_before_authentication_are_rejected() {
        let t0 = Instant::now();
        let mut session = Session::new(SessionConfig::default());
        session.begin_connect().unwrap();

        let err = session.move_local(10.0, 10.0, None, t0).unwrap_err();
        assert!(matches!(err, SessionError::NotReady { action: "move_to", .. }));
    }

    #[test]
    fn discmessage_during_handshake_is_auth_failure() {
        let t0 = Instant::now();
        let mut session = Session::new(SessionConfig::default());
        session.begin_connect().unwrap();
        session.login("myuser", "badpass", 7, t0).unwrap();

        let actions = session
            .handle_packet(ServerPacket::DiscMessage { reason: "bad password".into() }, t0);
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(actions.iter().any(|a| matches!(
            a,
            SessionAction::Emit(Event::Disconnected(DisconnectReason::AuthFailed(msg)))
                if msg == "bad password"
        )));
        assert!(actions.iter().any(|a| matches!(a, SessionAction::Close(_))));
    }

    #[test]
    fn discmessage_after_login_is_a_kick() {
        let (mut session, t0) = authenticated_session();
        let actions =
            session.handle_packet(ServerPacket::DiscMessage { reason: "server restart".into() }, t0);
        assert!(actions.iter().any(|a| matches!(
            a,
            SessionAction::Emit(Event::Disconnected(DisconnectReason::Kicked(_)))
        )));
    }

    #[test]
    fn heartbeat_silence_times_out() {
        let config = SessionConfig {
            heartbeat_timeout: Duration::from_secs(2),
            ..SessionConfig::default()
        };
        let t0 = Instant::now();
        let mut session = Session::new(config);
        session.begin_connect().unwrap();
        session.login("a", "b", 0, t0).unwrap();
        session.handle_packet(ServerPacket::Signature { data: Bytes::new() }, t0);

        // Fresh heartbeat holds the session open.
        let t1 = t0 + Duration::from_secs(1);
        session.handle_packet(ServerPacket::NewWorldTime { time: 100 }, t1);
        assert!(session.tick(t1 + Duration::from_millis(1900)).is_empty());

        // 2.1 s of silence crosses the 2 s bound.
        let actions = session.tick(t1 + Duration::from_millis(2100));
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(actions.contains(&SessionAction::Emit(Event::Disconnected(
            DisconnectReason::Timeout
        ))));

        // And further actions are rejected.
        let err = session.move_local(1.0, 1.0, None, t1).unwrap_err();
        assert!(matches!(err, SessionError::NotReady { .. }));
    }

    #[test]
    fn disconnect_is_idempotent() {
        let (mut session, _) = authenticated_session();
        let first = session.disconnect(DisconnectReason::Requested);
        assert_eq!(first.len(), 2);
        assert!(session.disconnect(DisconnectReason::Requested).is_empty());
    }

    #[test]
    fn world_time_stamps_heartbeat_and_clock() {
        let (mut session, t0) = authenticated_session();
        session.handle_packet(ServerPacket::NewWorldTime { time: 777 }, t0);
        assert_eq!(session.world().time, 777);
    }

    #[test]
    fn remote_player_lifecycle_events() {
        let (mut session, t0) = authenticated_session();

        let props = reborn_proto::decode_props(&reborn_proto::encode_props(&[
            PlayerProp::Nickname("Ann".into()),
            PlayerProp::CurLevel("town.nw".into()),
        ]))
        .unwrap();

        let actions = session
            .handle_packet(ServerPacket::OtherPlayerProps { id: 9, props: props.clone() }, t0);
        assert!(actions.contains(&SessionAction::Emit(Event::PlayerAdded(9))));
        assert_eq!(session.world().player(9).unwrap().nickname, "Ann");

        let actions = session.handle_packet(ServerPacket::OtherPlayerProps { id: 9, props }, t0);
        assert!(actions.contains(&SessionAction::Emit(Event::PlayerUpdated(9))));

        let actions = session.handle_packet(ServerPacket::DelPlayer { id: 9 }, t0);
        assert!(actions.contains(&SessionAction::Emit(Event::PlayerRemoved(9))));
        assert!(session.world().player(9).is_none());
    }

    #[test]
    fn board_packet_loads_current_level() {
        let (mut session, t0) = authenticated_session();
        session.handle_packet(ServerPacket::LevelName { name: "town.nw".into() }, t0);

        let tiles = vec![632u16; 4096];
        let actions = session.handle_packet(ServerPacket::BoardPacket { tiles }, t0);
        assert!(actions
            .contains(&SessionAction::Emit(Event::LevelBoardLoaded("town.nw".into()))));
        assert_eq!(session.world().levels.peek("town.nw").unwrap().tile(0, 0), Some(632));
    }

    #[test]
    fn entering_a_gmap_requests_the_manifest() {
        let (mut session, t0) = authenticated_session();
        let actions = session.handle_packet(
            ServerPacket::LevelName { name: "world.gmap".into() },
            t0,
        );
        assert!(sends(&actions)
            .iter()
            .any(|p| matches!(p, ClientPacket::WantFile(name) if name == "world.gmap")));
        assert!(actions
            .contains(&SessionAction::Emit(Event::LevelEntered("world.gmap".into()))));
    }

    fn manifest_3x3() -> String {
        let mut text = String::from("WIDTH 3\nHEIGHT 3\nLEVELNAMES\n");
        for row in 0..3 {
            for col in 0..3 {
                text.push_str(&format!("\"seg{col}{row}.nw\","));
            }
            text.push('\n');
        }
        text.push_str("LEVELNAMESEND\n");
        text
    }

    #[test]
    fn gmap_boundary_crossing_east() {
        let (mut session, t0) = authenticated_session();

        // Enter the gmap and deliver its manifest.
        session.handle_packet(ServerPacket::LevelName { name: "world.gmap".into() }, t0);
        session.handle_packet(
            ServerPacket::File {
                modtime: 0,
                name: "world.gmap".into(),
                data: Bytes::from(manifest_3x3()),
            },
            t0,
        );
        assert!(session.world().gmap.is_some());

        // Position: segment (1,1), local (63.5, 30).
        session.handle_packet(
            ServerPacket::GmapWarp {
                x2: 64.0 + 63.5,
                y2: 64.0 + 30.0,
                z2: 0.0,
                gmaplevelx: 1,
                gmaplevely: 1,
                level: "world.gmap".into(),
            },
            t0,
        );
        assert_eq!(session.world().local.gmaplevelx(), Some(1));

        // Move one tile east, crossing into segment (2,1).
        let actions = session.move_local(64.5, 30.0, Some(Direction::Right), t0).unwrap();

        let local = &session.world().local;
        assert_eq!(local.gmaplevelx(), Some(2));
        assert_eq!(local.gmaplevely(), Some(1));
        assert!((local.x() - 0.5).abs() < f32::EPSILON);
        assert_eq!(local.x2(), Some(128.5));

        // The new child level was requested, and coordinates went out in
        // high precision.
        let sent = sends(&actions);
        assert!(sent
            .iter()
            .any(|p| matches!(p, ClientPacket::WantFile(name) if name == "seg21.nw")));
        assert!(sent.iter().any(|p| matches!(
            p,
            ClientPacket::PlayerProps(props)
                if props.contains(&PlayerProp::X2(128.5))
                    && props.iter().any(|q| matches!(q, PlayerProp::Sprite(_)))
        )));
    }

    #[test]
    fn plain_move_sends_low_precision_props() {
        let (mut session, t0) = authenticated_session();
        session.handle_packet(ServerPacket::LevelName { name: "town.nw".into() }, t0);

        let actions = session.move_local(12.0, 13.5, Some(Direction::Down), t0).unwrap();
        let sent = sends(&actions);
        assert!(sent.iter().any(|p| matches!(
            p,
            ClientPacket::PlayerProps(props)
                if props.contains(&PlayerProp::X(12.0)) && props.contains(&PlayerProp::Y(13.5))
        )));
    }

    #[test]
    fn received_level_file_is_parsed_and_cached() {
        let (mut session, t0) = authenticated_session();

        let mut text = String::from("GLEVNW01\n");
        text.push_str(&format!("BOARD 0 0 64 0 {}\n", "J4".repeat(64)));
        let actions = session.handle_packet(
            ServerPacket::File { modtime: 1, name: "house1.nw".into(), data: Bytes::from(text) },
            t0,
        );

        assert!(actions.iter().any(|a| matches!(
            a,
            SessionAction::Emit(Event::FileReceived { name, .. }) if name == "house1.nw"
        )));
        let level = session.world().levels.peek("house1.nw").unwrap();
        assert!(level.board_loaded());
        assert_eq!(level.tile(0, 0), Some(632));
    }

    #[test]
    fn large_transfer_reassembles_through_session() {
        let (mut session, t0) = authenticated_session();

        session.handle_packet(ServerPacket::LargeFileStart { name: "pack.dat".into() }, t0);
        session.handle_packet(ServerPacket::LargeFileSize { size: 6 }, t0);
        session.handle_packet(
            ServerPacket::File { modtime: 0, name: "pack.dat".into(), data: Bytes::from_static(b"abc") },
            t0,
        );
        session.handle_packet(
            ServerPacket::File { modtime: 0, name: "pack.dat".into(), data: Bytes::from_static(b"def") },
            t0,
        );
        let actions =
            session.handle_packet(ServerPacket::LargeFileEnd { name: "pack.dat".into(), checksum: None }, t0);

        assert!(actions.iter().any(|a| matches!(
            a,
            SessionAction::Emit(Event::FileReceived { name, data })
                if name == "pack.dat" && data.as_ref() == b"abcdef"
        )));
    }

    #[test]
    fn file_send_failure_aborts_and_reports() {
        let (mut session, t0) = authenticated_session();
        session.handle_packet(ServerPacket::LargeFileStart { name: "gone.nw".into() }, t0);
        let actions =
            session.handle_packet(ServerPacket::FileSendFailed { name: "gone.nw".into() }, t0);
        assert!(actions
            .contains(&SessionAction::Emit(Event::FileTransferFailed("gone.nw".into()))));
    }

    #[test]
    fn unknown_packets_become_events() {
        let (mut session, t0) = authenticated_session();
        let actions = session.handle_packet(
            ServerPacket::Unknown { id: 167, data: Bytes::from_static(b"?") },
            t0,
        );
        assert!(actions.iter().any(|a| matches!(
            a,
            SessionAction::Emit(Event::UnknownPacket { id: 167, .. })
        )));
    }

    #[test]
    fn unknown_property_in_local_stream_is_reported() {
        let (mut session, t0) = authenticated_session();
        let stream = PropStream {
            props: vec![PlayerProp::Nickname("Bob".into())],
            unknown: Some(77),
        };
        let actions = session.handle_packet(ServerPacket::PlayerProps { props: stream }, t0);
        assert!(actions.contains(&SessionAction::Emit(Event::UnknownProperty(77))));
        assert_eq!(session.world().local.nickname, "Bob");
    }
}
