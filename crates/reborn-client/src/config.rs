//! Client configuration.

use std::time::Duration;

use reborn_core::SessionConfig;

/// Minimum spacing between outbound frames.
pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_millis(50);

/// Socket read poll interval; drives heartbeat detection granularity.
pub const DEFAULT_READ_POLL: Duration = Duration::from_millis(100);

/// TCP connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Send-queue drain deadline on disconnect.
pub const DEFAULT_DRAIN_DEADLINE: Duration = Duration::from_millis(500);

/// Everything tunable about a client.
///
/// The nested [`SessionConfig`] carries the protocol-visible knobs (version
/// tag, identity, heartbeat bound); the rest shapes the I/O shell.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Protocol-level configuration.
    pub session: SessionConfig,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Socket read poll interval.
    pub read_poll: Duration,
    /// Minimum spacing between outbound frames.
    pub send_interval: Duration,
    /// How long the send queue may drain after a disconnect.
    pub drain_deadline: Duration,
    /// Fixed cipher key instead of a random one. Test rigs use this so the
    /// fake server can seed a matching codec; production leaves it `None`.
    pub encryption_key: Option<u8>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_poll: DEFAULT_READ_POLL,
            send_interval: DEFAULT_SEND_INTERVAL,
            drain_deadline: DEFAULT_DRAIN_DEADLINE,
            encryption_key: None,
        }
    }
}

impl ClientConfig {
    /// Override the protocol version tag.
    #[must_use]
    pub fn with_version(mut self, version: &str) -> Self {
        self.session.version = version.to_string();
        self
    }

    /// Override the heartbeat silence bound.
    #[must_use]
    pub fn with_heartbeat_timeout(mut self, bound: Duration) -> Self {
        self.session.heartbeat_timeout = bound;
        self
    }
}
