//! Sans-IO protocol core for the Reborn client.
//!
//! Everything in this crate is pure state: the session state machine
//! ([`Session`]) that drives login, property synchronization, level
//! streaming, and movement; the world model it owns ([`world::World`]); and
//! the typed event bus ([`EventBus`]) collaborators subscribe to.
//!
//! The I/O shell (`reborn-client`) feeds decoded packets and the current
//! time in, executes the returned [`SessionAction`]s, and owns all sockets,
//! clocks, and tasks. This split keeps every protocol rule unit-testable
//! with explicit instants, no runtime required.

#![forbid(unsafe_code)]

pub mod error;
pub mod event;
pub mod session;
pub mod transfer;
pub mod world;

pub use error::SessionError;
pub use event::{DisconnectReason, Event, EventBus, EventKind, SubscriptionId};
pub use session::{Session, SessionAction, SessionConfig, SessionState};
pub use transfer::{ChunkOutcome, FileTransfers};
pub use world::{Direction, Gmap, Item, Level, LevelCache, Npc, Player, World};
