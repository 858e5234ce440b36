//! Typed events and the subscription bus.
//!
//! Events are plain values fanned out synchronously: the receive loop
//! publishes, every handler subscribed to that kind runs before the next
//! packet is dispatched. Handlers therefore must not block and must not call
//! back into the session. Per-kind ordering follows the inbound stream.

use std::{
    collections::HashMap,
    sync::Mutex,
};

use bytes::Bytes;

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The caller asked for it.
    Requested,
    /// Socket-level failure (refused, reset, EOF).
    Transport(String),
    /// Frame-level protocol failure; the stream cannot be resynchronized.
    Frame(String),
    /// Heartbeat silence or connect timeout.
    Timeout,
    /// The server rejected the login.
    AuthFailed(String),
    /// The server disconnected us after login.
    Kicked(String),
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Requested => write!(f, "requested by caller"),
            Self::Transport(msg) => write!(f, "transport: {msg}"),
            Self::Frame(msg) => write!(f, "bad frame: {msg}"),
            Self::Timeout => write!(f, "timeout"),
            Self::AuthFailed(msg) => write!(f, "login rejected: {msg}"),
            Self::Kicked(msg) => write!(f, "kicked: {msg}"),
        }
    }
}

/// Everything the core reports to external collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// TCP established, codecs initialized.
    Connected,
    /// Session over.
    Disconnected(DisconnectReason),
    /// Login accepted.
    Authenticated,
    /// A remote player appeared.
    PlayerAdded(u16),
    /// A remote player disappeared.
    PlayerRemoved(u16),
    /// A player's properties changed.
    PlayerUpdated(u16),
    /// Public chat line.
    ChatMessage {
        /// Speaking player id.
        id: u16,
        /// Chat text.
        text: String,
    },
    /// Private message to the local player.
    PrivateMessage {
        /// Sending player id.
        from: u16,
        /// Message text.
        text: String,
    },
    /// The local player entered a level (or gmap).
    LevelEntered(String),
    /// A level's board finished loading.
    LevelBoardLoaded(String),
    /// An item appeared on the current level.
    ItemAdded {
        /// Tile column.
        x: f32,
        /// Tile row.
        y: f32,
        /// Item type id.
        item: u8,
    },
    /// An item disappeared from the current level.
    ItemRemoved {
        /// Tile column.
        x: f32,
        /// Tile row.
        y: f32,
    },
    /// Server-side trigger fired.
    TriggerAction {
        /// Action name.
        action: String,
        /// Action arguments.
        args: Vec<String>,
    },
    /// Explosion on the current level.
    Explosion {
        /// Tile column.
        x: f32,
        /// Tile row.
        y: f32,
        /// Blast power.
        power: u8,
    },
    /// The local player took damage.
    Hurt {
        /// Attacking player id.
        from: u16,
        /// Damage in hearts.
        damage: f32,
    },
    /// A server flag was set.
    FlagSet {
        /// Flag name.
        name: String,
        /// Flag value.
        value: String,
    },
    /// A server flag was deleted.
    FlagDeleted(String),
    /// A file transfer completed.
    FileReceived {
        /// File name.
        name: String,
        /// File content.
        data: Bytes,
    },
    /// A file transfer was aborted by the server.
    FileTransferFailed(String),
    /// A server text value arrived.
    ServerText(String),
    /// The server asked us to move to another server.
    ServerWarp(String),
    /// Inbound packet id missing from the registry.
    UnknownPacket {
        /// Wire packet id.
        id: u8,
        /// Raw body.
        data: Bytes,
    },
    /// Property id missing from the registry; the rest of its stream was
    /// dropped.
    UnknownProperty(u8),
}

/// Discriminant of [`Event`], used as the subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)] // mirrors the Event variants one to one
pub enum EventKind {
    Connected,
    Disconnected,
    Authenticated,
    PlayerAdded,
    PlayerRemoved,
    PlayerUpdated,
    ChatMessage,
    PrivateMessage,
    LevelEntered,
    LevelBoardLoaded,
    ItemAdded,
    ItemRemoved,
    TriggerAction,
    Explosion,
    Hurt,
    FlagSet,
    FlagDeleted,
    FileReceived,
    FileTransferFailed,
    ServerText,
    ServerWarp,
    UnknownPacket,
    UnknownProperty,
}

impl Event {
    /// Subscription key of this event.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connected => EventKind::Connected,
            Self::Disconnected(_) => EventKind::Disconnected,
            Self::Authenticated => EventKind::Authenticated,
            Self::PlayerAdded(_) => EventKind::PlayerAdded,
            Self::PlayerRemoved(_) => EventKind::PlayerRemoved,
            Self::PlayerUpdated(_) => EventKind::PlayerUpdated,
            Self::ChatMessage { .. } => EventKind::ChatMessage,
            Self::PrivateMessage { .. } => EventKind::PrivateMessage,
            Self::LevelEntered(_) => EventKind::LevelEntered,
            Self::LevelBoardLoaded(_) => EventKind::LevelBoardLoaded,
            Self::ItemAdded { .. } => EventKind::ItemAdded,
            Self::ItemRemoved { .. } => EventKind::ItemRemoved,
            Self::TriggerAction { .. } => EventKind::TriggerAction,
            Self::Explosion { .. } => EventKind::Explosion,
            Self::Hurt { .. } => EventKind::Hurt,
            Self::FlagSet { .. } => EventKind::FlagSet,
            Self::FlagDeleted(_) => EventKind::FlagDeleted,
            Self::FileReceived { .. } => EventKind::FileReceived,
            Self::FileTransferFailed(_) => EventKind::FileTransferFailed,
            Self::ServerText(_) => EventKind::ServerText,
            Self::ServerWarp(_) => EventKind::ServerWarp,
            Self::UnknownPacket { .. } => EventKind::UnknownPacket,
            Self::UnknownProperty(_) => EventKind::UnknownProperty,
        }
    }
}

/// Handle returned by [`EventBus::subscribe`]; pass to
/// [`EventBus::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Box<dyn Fn(&Event) + Send>;

#[derive(Default)]
struct BusState {
    handlers: HashMap<EventKind, Vec<(SubscriptionId, Handler)>>,
    next_id: u64,
}

/// Discriminant-keyed publish/subscribe fan-out.
///
/// Publish runs handlers synchronously in subscription order; a handler
/// panicking is the caller's bug (handlers run under the receive loop).
#[derive(Default)]
pub struct EventBus {
    state: Mutex<BusState>,
}

impl EventBus {
    /// Empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one event kind.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + 'static,
    {
        let mut state = lock(&self.state);
        state.next_id += 1;
        let id = SubscriptionId(state.next_id);
        state.handlers.entry(kind).or_default().push((id, Box::new(handler)));
        id
    }

    /// Remove a handler. Returns whether it was still registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = lock(&self.state);
        for handlers in state.handlers.values_mut() {
            if let Some(pos) = handlers.iter().position(|(h, _)| *h == id) {
                handlers.remove(pos);
                return true;
            }
        }
        false
    }

    /// Fan an event out to every handler of its kind.
    pub fn publish(&self, event: &Event) {
        let state = lock(&self.state);
        if let Some(handlers) = state.handlers.get(&event.kind()) {
            for (_, handler) in handlers {
                handler(event);
            }
        }
    }

    /// Number of live subscriptions, across all kinds.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        lock(&self.state).handlers.values().map(Vec::len).sum()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").field("subscriptions", &self.subscription_count()).finish()
    }
}

/// Poison-tolerant lock: a handler that panicked must not wedge the bus.
fn lock(state: &Mutex<BusState>) -> std::sync::MutexGuard<'_, BusState> {
    state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    #[test]
    fn publish_reaches_only_matching_kind() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counted = Arc::clone(&hits);
        bus.subscribe(EventKind::ChatMessage, move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(&Event::ChatMessage { id: 1, text: "hi".into() });
        bus.publish(&Event::Authenticated);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_by_handle() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counted = Arc::clone(&hits);
        let id = bus.subscribe(EventKind::Authenticated, move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(&Event::Authenticated);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(&Event::Authenticated);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn multiple_handlers_run_in_subscription_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            bus.subscribe(EventKind::LevelEntered, move |_| {
                order.lock().unwrap().push(tag);
            });
        }

        bus.publish(&Event::LevelEntered("onlinestartlocal.nw".into()));
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn per_kind_ordering_is_preserved() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        bus.subscribe(EventKind::ChatMessage, move |event| {
            if let Event::ChatMessage { text, .. } = event {
                sink.lock().unwrap().push(text.clone());
            }
        });

        for n in 0..5 {
            bus.publish(&Event::ChatMessage { id: 1, text: n.to_string() });
        }
        assert_eq!(*seen.lock().unwrap(), vec!["0", "1", "2", "3", "4"]);
    }
}
