//! Client → server packet builders.

use bytes::BufMut;

use crate::{
    codecs::{write_gchar, write_gint5, write_gshort, write_gstring, write_half_tile},
    props::{PlayerProp, encode_props},
};

/// One outbound packet, ready to encode.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientPacket {
    /// Login handshake (id 2). The only packet that embeds raw newlines; it
    /// is always sent alone in its frame.
    Login {
        /// Client-type byte (pre-offset).
        client_type: u8,
        /// Stream cipher key chosen for this connection.
        key: u8,
        /// Eight-character protocol version tag.
        version: String,
        /// Account name.
        account: String,
        /// Account password.
        password: String,
        /// Platform identity line.
        identity: String,
    },
    /// Local property update (id 9).
    PlayerProps(Vec<PlayerProp>),
    /// Public chat (id 50).
    ToAll(String),
    /// Private message (id 51).
    PrivateMessage {
        /// Target player id.
        to: u16,
        /// Message text.
        text: String,
    },
    /// Warp request (id 52).
    PlayerWarp {
        /// Target column.
        x: f32,
        /// Target row.
        y: f32,
        /// Target level name.
        level: String,
    },
    /// Place a bomb (id 53).
    BombAdd {
        /// Tile column.
        x: f32,
        /// Tile row.
        y: f32,
        /// Bomb power.
        power: u8,
        /// Fuse timer.
        timer: u8,
    },
    /// Fire an arrow (id 54).
    ArrowAdd,
    /// Fire effect (id 55).
    FireSpy,
    /// Request a file by name (id 56).
    WantFile(String),
    /// Fire a server-side trigger (id 57).
    TriggerAction {
        /// Action name.
        action: String,
        /// Action arguments.
        args: Vec<String>,
    },
    /// Set a server flag (id 58).
    FlagSet {
        /// Flag name.
        name: String,
        /// Flag value.
        value: String,
    },
    /// Ask the server to re-send part of a board (id 130).
    RequestUpdateBoard {
        /// Level name.
        level: String,
        /// Cached modification time, zero when unknown.
        modtime: u64,
        /// Region origin column.
        x: u16,
        /// Region origin row.
        y: u16,
        /// Region width.
        w: u16,
        /// Region height.
        h: u16,
    },
    /// Request a server text value (id 152).
    RequestText(String),
    /// Send a server text value (id 154).
    SendText {
        /// Option key.
        key: String,
        /// Option value.
        value: String,
    },
}

impl ClientPacket {
    /// Wire id of this packet.
    #[must_use]
    pub fn id(&self) -> u8 {
        match self {
            Self::Login { .. } => 2,
            Self::PlayerProps(_) => 9,
            Self::ToAll(_) => 50,
            Self::PrivateMessage { .. } => 51,
            Self::PlayerWarp { .. } => 52,
            Self::BombAdd { .. } => 53,
            Self::ArrowAdd => 54,
            Self::FireSpy => 55,
            Self::WantFile(_) => 56,
            Self::TriggerAction { .. } => 57,
            Self::FlagSet { .. } => 58,
            Self::RequestUpdateBoard { .. } => 130,
            Self::RequestText(_) => 152,
            Self::SendText { .. } => 154,
        }
    }

    /// Encode as `[id + 32][body]`, without the batch separator.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_gchar(&mut buf, self.id());

        match self {
            Self::Login { client_type, key, version, account, password, identity } => {
                write_gchar(&mut buf, *client_type);
                write_gchar(&mut buf, *key);
                buf.put_slice(version.as_bytes());
                buf.put_u8(b'\n');
                buf.put_slice(account.as_bytes());
                buf.put_u8(b'\n');
                buf.put_slice(password.as_bytes());
                buf.put_u8(b'\n');
                buf.put_slice(identity.as_bytes());
                buf.put_u8(b'\n');
            },
            Self::PlayerProps(props) => buf.put_slice(&encode_props(props)),
            Self::ToAll(text) => buf.put_slice(text.as_bytes()),
            Self::PrivateMessage { to, text } => {
                write_gshort(&mut buf, *to);
                buf.put_slice(text.as_bytes());
            },
            Self::PlayerWarp { x, y, level } => {
                write_half_tile(&mut buf, *x);
                write_half_tile(&mut buf, *y);
                buf.put_slice(level.as_bytes());
            },
            Self::BombAdd { x, y, power, timer } => {
                write_half_tile(&mut buf, *x);
                write_half_tile(&mut buf, *y);
                write_gchar(&mut buf, *power);
                write_gchar(&mut buf, *timer);
            },
            Self::ArrowAdd | Self::FireSpy => {},
            Self::WantFile(name) => buf.put_slice(name.as_bytes()),
            Self::TriggerAction { action, args } => {
                buf.put_slice(action.as_bytes());
                for arg in args {
                    buf.put_u8(b',');
                    buf.put_slice(arg.as_bytes());
                }
            },
            Self::FlagSet { name, value } => {
                buf.put_slice(name.as_bytes());
                if !value.is_empty() {
                    buf.put_u8(b'=');
                    buf.put_slice(value.as_bytes());
                }
            },
            Self::RequestUpdateBoard { level, modtime, x, y, w, h } => {
                write_gstring(&mut buf, level);
                write_gint5(&mut buf, *modtime);
                write_gshort(&mut buf, *x);
                write_gshort(&mut buf, *y);
                write_gshort(&mut buf, *w);
                write_gshort(&mut buf, *h);
            },
            Self::RequestText(key) => buf.put_slice(key.as_bytes()),
            Self::SendText { key, value } => {
                buf.put_slice(key.as_bytes());
                buf.put_u8(b',');
                buf.put_slice(value.as_bytes());
            },
        }

        buf
    }
}

/// Join packets into one frame payload, newline-terminating each.
///
/// A packet whose body already ends in a newline (login) is not terminated
/// again.
#[must_use]
pub fn encode_batch(packets: &[ClientPacket]) -> Vec<u8> {
    let mut batch = Vec::new();
    for packet in packets {
        let bytes = packet.encode();
        let terminated = bytes.last() == Some(&b'\n');
        batch.extend_from_slice(&bytes);
        if !terminated {
            batch.push(b'\n');
        }
    }
    batch
}
