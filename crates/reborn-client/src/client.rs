//! The public client facade.
//!
//! [`Client`] owns the session state machine, the event bus, and (while
//! connected) the socket tasks. Action methods are synchronous: they
//! validate against the session state, mutate local state, and queue
//! packets; only `connect`, `login`, and `disconnect` await anything.
//!
//! Read accessors return clones. The world model is mutated exclusively by
//! the receive task; handing out snapshots keeps collaborators free of the
//! session's locking discipline.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use reborn_core::{
    Direction, Event, EventBus, EventKind, Level, Player, Session, SessionAction, SessionState,
    SubscriptionId,
};
use reborn_proto::{ClientPacket, props::PlayerProp};
use tokio::net::TcpStream;

use crate::{
    config::ClientConfig,
    connection::{Connection, SharedSession, lock_session},
    error::ClientError,
};

/// How often `login` polls the session state while waiting for the server
/// signature.
const LOGIN_POLL: Duration = Duration::from_millis(10);

/// A Reborn protocol client.
pub struct Client {
    config: ClientConfig,
    session: SharedSession,
    bus: Arc<EventBus>,
    connection: Option<Connection>,
    key: u8,
}

impl Client {
    /// Client with a configuration.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let session = Arc::new(Mutex::new(Session::new(config.session.clone())));
        Self { config, session, bus: Arc::new(EventBus::new()), connection: None, key: 0 }
    }

    /// Client with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(ClientConfig::default())
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        lock_session(&self.session).state()
    }

    /// Establish the TCP connection and seed the cipher pair.
    ///
    /// The session moves to `Connecting`; call [`Client::login`] next.
    pub async fn connect(&mut self, host: &str, port: u16) -> Result<(), ClientError> {
        lock_session(&self.session).begin_connect()?;

        let connect = TcpStream::connect((host, port));
        let stream = match tokio::time::timeout(self.config.connect_timeout, connect).await {
            Err(_) => {
                let actions =
                    lock_session(&self.session).disconnect(reborn_core::DisconnectReason::Timeout);
                let _ = self.execute(actions);
                return Err(ClientError::ConnectTimeout(self.config.connect_timeout));
            },
            Ok(Err(e)) => {
                let actions = lock_session(&self.session)
                    .disconnect(reborn_core::DisconnectReason::Transport(e.to_string()));
                let _ = self.execute(actions);
                return Err(ClientError::Transport(e.to_string()));
            },
            Ok(Ok(stream)) => stream,
        };
        let _ = stream.set_nodelay(true);

        self.key = self.config.encryption_key.unwrap_or_else(rand::random);
        tracing::info!(host, port, "connected");

        let connection = Connection::spawn(
            stream,
            self.key,
            Arc::clone(&self.session),
            Arc::clone(&self.bus),
            &self.config,
        );
        self.connection = Some(connection);

        let actions = lock_session(&self.session).connected();
        self.execute(actions)
    }

    /// Send the login packet and wait for the server's verdict.
    ///
    /// Resolves when the signature packet arrives; errors when the server
    /// rejects the account, the session dies, or nothing arrives within the
    /// connect timeout.
    pub async fn login(&mut self, account: &str, password: &str) -> Result<(), ClientError> {
        let actions = {
            let mut session = lock_session(&self.session);
            session.login(account, password, self.key, std::time::Instant::now())?
        };
        self.execute(actions)?;

        let deadline = tokio::time::Instant::now() + self.config.connect_timeout;
        loop {
            match self.state() {
                SessionState::Authenticated => return Ok(()),
                SessionState::Disconnected => {
                    return Err(ClientError::AuthFailed("session closed during login".into()));
                },
                _ => {},
            }
            if tokio::time::Instant::now() >= deadline {
                self.disconnect_with(reborn_core::DisconnectReason::Timeout).await;
                return Err(ClientError::LoginTimeout(self.config.connect_timeout));
            }
            tokio::time::sleep(LOGIN_POLL).await;
        }
    }

    /// Close the session: drain the send queue briefly, stop both tasks,
    /// drop the socket. Safe to call repeatedly.
    pub async fn disconnect(&mut self) {
        self.disconnect_with(reborn_core::DisconnectReason::Requested).await;
    }

    async fn disconnect_with(&mut self, reason: reborn_core::DisconnectReason) {
        let actions = lock_session(&self.session).disconnect(reason);
        let _ = self.execute(actions);
        if let Some(connection) = self.connection.take() {
            connection.join().await;
        }
    }

    fn execute(&self, actions: Vec<SessionAction>) -> Result<(), ClientError> {
        for action in actions {
            match action {
                SessionAction::Send(packet) => self.queue_packet(&packet)?,
                SessionAction::Emit(event) => self.bus.publish(&event),
                SessionAction::Close(_) => {
                    if let Some(connection) = &self.connection {
                        connection.signal_shutdown();
                    }
                },
            }
        }
        Ok(())
    }

    fn queue_packet(&self, packet: &ClientPacket) -> Result<(), ClientError> {
        let connection = self.connection.as_ref().ok_or(ClientError::Closed)?;
        connection.queue(reborn_proto::encode_batch(std::slice::from_ref(packet)))
    }

    // Movement ------------------------------------------------------------

    /// Move to a position, optionally turning. Handles GMAP segment
    /// crossings (coordinate wrap, segment update, child-level request) and
    /// sends the position properties.
    pub fn move_to(
        &self,
        x: f32,
        y: f32,
        direction: Option<Direction>,
    ) -> Result<(), ClientError> {
        let actions = lock_session(&self.session)
            .move_local(x, y, direction, std::time::Instant::now())?;
        self.execute(actions)
    }

    /// Request a warp to a level.
    pub fn warp_to(&self, x: f32, y: f32, level: &str) -> Result<(), ClientError> {
        self.send_guarded(
            ClientPacket::PlayerWarp { x, y, level: level.to_string() },
            "warp_to",
        )
    }

    // Appearance and chat --------------------------------------------------

    /// Set the display name.
    pub fn set_nickname(&self, nickname: &str) -> Result<(), ClientError> {
        self.update_props(vec![PlayerProp::Nickname(nickname.to_string())], "set_nickname")
    }

    /// Set the chat bubble text.
    pub fn set_chat(&self, text: &str) -> Result<(), ClientError> {
        self.update_props(vec![PlayerProp::CurChat(text.to_string())], "set_chat")
    }

    /// Say something in public chat.
    pub fn say(&self, text: &str) -> Result<(), ClientError> {
        self.send_guarded(ClientPacket::ToAll(text.to_string()), "say")
    }

    /// Send a private message to a player.
    pub fn private_message(&self, player_id: u16, text: &str) -> Result<(), ClientError> {
        self.send_guarded(
            ClientPacket::PrivateMessage { to: player_id, text: text.to_string() },
            "private_message",
        )
    }

    /// Set the head image.
    pub fn set_head_image(&self, image: &str) -> Result<(), ClientError> {
        self.update_props(vec![PlayerProp::HeadImage(image.to_string())], "set_head_image")
    }

    /// Set the body image.
    pub fn set_body_image(&self, image: &str) -> Result<(), ClientError> {
        self.update_props(vec![PlayerProp::BodyImage(image.to_string())], "set_body_image")
    }

    /// Set the shield image, keeping the current shield power.
    pub fn set_shield_image(&self, image: &str) -> Result<(), ClientError> {
        let power = lock_session(&self.session).world().local.shield_power;
        self.update_props(
            vec![PlayerProp::ShieldPower { power, image: image.to_string() }],
            "set_shield_image",
        )
    }

    /// Set the sword image, keeping the current sword power.
    pub fn set_sword_image(&self, image: &str) -> Result<(), ClientError> {
        let power = lock_session(&self.session).world().local.sword_power;
        self.update_props(
            vec![PlayerProp::SwordPower { power, image: image.to_string() }],
            "set_sword_image",
        )
    }

    /// Set the five color slots.
    pub fn set_colors(&self, colors: [u8; 5]) -> Result<(), ClientError> {
        self.update_props(vec![PlayerProp::Colors(colors)], "set_colors")
    }

    // Combat ---------------------------------------------------------------

    /// Drop a bomb at the current position.
    pub fn drop_bomb(&self, power: u8) -> Result<(), ClientError> {
        let (x, y) = {
            let session = lock_session(&self.session);
            (session.world().local.x(), session.world().local.y())
        };
        self.send_guarded(ClientPacket::BombAdd { x, y, power, timer: 55 }, "drop_bomb")
    }

    /// Shoot an arrow.
    pub fn shoot_arrow(&self) -> Result<(), ClientError> {
        self.send_guarded(ClientPacket::ArrowAdd, "shoot_arrow")
    }

    /// Play the fire effect.
    pub fn fire_effect(&self) -> Result<(), ClientError> {
        self.send_guarded(ClientPacket::FireSpy, "fire_effect")
    }

    // Files, flags, triggers ----------------------------------------------

    /// Request a file by name.
    pub fn want_file(&self, name: &str) -> Result<(), ClientError> {
        self.send_guarded(ClientPacket::WantFile(name.to_string()), "want_file")
    }

    /// Ask the server to re-send part of a level board.
    pub fn request_update_board(
        &self,
        level: &str,
        x: u16,
        y: u16,
        w: u16,
        h: u16,
    ) -> Result<(), ClientError> {
        let modtime = lock_session(&self.session)
            .world()
            .levels
            .peek(level)
            .map_or(0, |l| l.modtime);
        self.send_guarded(
            ClientPacket::RequestUpdateBoard { level: level.to_string(), modtime, x, y, w, h },
            "request_update_board",
        )
    }

    /// Set a server flag.
    pub fn set_flag(&self, name: &str, value: &str) -> Result<(), ClientError> {
        self.send_guarded(
            ClientPacket::FlagSet { name: name.to_string(), value: value.to_string() },
            "set_flag",
        )
    }

    /// Fire a server-side trigger action.
    pub fn trigger_action(&self, action: &str, args: &[String]) -> Result<(), ClientError> {
        self.send_guarded(
            ClientPacket::TriggerAction { action: action.to_string(), args: args.to_vec() },
            "trigger_action",
        )
    }

    /// Request a server text value.
    pub fn request_text(&self, key: &str) -> Result<(), ClientError> {
        self.send_guarded(ClientPacket::RequestText(key.to_string()), "request_text")
    }

    /// Send a server text value.
    pub fn send_text(&self, key: &str, value: &str) -> Result<(), ClientError> {
        self.send_guarded(
            ClientPacket::SendText { key: key.to_string(), value: value.to_string() },
            "send_text",
        )
    }

    // Events ---------------------------------------------------------------

    /// Subscribe a handler to one event kind.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + 'static,
    {
        self.bus.subscribe(kind, handler)
    }

    /// Remove a subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    // Read-only views ------------------------------------------------------

    /// Snapshot of the local player.
    #[must_use]
    pub fn local_player(&self) -> Player {
        lock_session(&self.session).world().local.clone()
    }

    /// Snapshot of a remote player.
    #[must_use]
    pub fn player_by_id(&self, id: u16) -> Option<Player> {
        lock_session(&self.session).world().player(id).cloned()
    }

    /// Snapshots of all remote players on a level.
    #[must_use]
    pub fn players_on_level(&self, level: &str) -> Vec<Player> {
        lock_session(&self.session).world().players_on_level(level).cloned().collect()
    }

    /// Snapshot of the current level.
    #[must_use]
    pub fn current_level(&self) -> Option<Level> {
        let session = lock_session(&self.session);
        let name = session.world().current_level()?.to_string();
        session.world().levels.peek(&name).cloned()
    }

    /// Snapshot of a cached level.
    #[must_use]
    pub fn level(&self, name: &str) -> Option<Level> {
        lock_session(&self.session).world().levels.peek(name).cloned()
    }

    /// A server flag's value.
    #[must_use]
    pub fn flag(&self, name: &str) -> Option<String> {
        lock_session(&self.session).world().flag(name).map(str::to_string)
    }

    /// Latest server world time.
    #[must_use]
    pub fn world_time(&self) -> u32 {
        lock_session(&self.session).world().time
    }

    // ----------------------------------------------------------------------

    fn send_guarded(&self, packet: ClientPacket, action: &'static str) -> Result<(), ClientError> {
        let actions = lock_session(&self.session).send_packet(packet, action)?;
        self.execute(actions)
    }

    fn update_props(
        &self,
        props: Vec<PlayerProp>,
        action: &'static str,
    ) -> Result<(), ClientError> {
        let actions = lock_session(&self.session).update_local_props(props, action)?;
        self.execute(actions)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.state())
            .field("connected", &self.connection.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_without_a_connection_fail_cleanly() {
        let client = Client::with_defaults();
        assert_eq!(client.state(), SessionState::Disconnected);

        let err = client.say("hello").unwrap_err();
        assert!(matches!(err, ClientError::Session(_)));
    }

    #[test]
    fn snapshots_are_empty_before_connecting() {
        let client = Client::with_defaults();
        assert!(client.player_by_id(1).is_none());
        assert!(client.current_level().is_none());
        assert_eq!(client.local_player().id, 0);
    }
}
