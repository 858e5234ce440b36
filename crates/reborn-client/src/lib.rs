//! Tokio TCP client for the Reborn (GServer-v2 lineage) game protocol.
//!
//! The I/O shell around [`reborn_core`]: a [`Client`] facade owning the
//! session state machine, an event bus for typed subscriptions, and two
//! socket tasks per connection (receive loop and rate-limited send queue).
//!
//! ```no_run
//! use reborn_client::{Client, ClientConfig, EventKind};
//!
//! # async fn run() -> Result<(), reborn_client::ClientError> {
//! let mut client = Client::new(ClientConfig::default());
//! client.connect("server.example", 14900).await?;
//! client.login("account", "password").await?;
//!
//! client.subscribe(EventKind::ChatMessage, |event| {
//!     println!("{event:?}");
//! });
//! client.say("hello world")?;
//! client.move_to(30.0, 30.5, None)?;
//! # Ok(())
//! # }
//! ```
//!
//! The separate [`serverlist`] module speaks the short directory protocol
//! for discovering game servers.

#![forbid(unsafe_code)]

mod client;
mod config;
mod connection;
mod error;
pub mod serverlist;

pub use client::Client;
pub use config::ClientConfig;
pub use error::ClientError;
pub use reborn_core::{
    Direction, DisconnectReason, Event, EventKind, Level, Player, SessionConfig, SessionState,
    SubscriptionId,
};
pub use serverlist::{ServerEntry, ServerListing, fetch_server_list};
