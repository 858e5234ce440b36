//! Client-facing errors.

use std::time::Duration;

use thiserror::Error;

/// Errors returned by [`crate::Client`] methods.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Socket-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// TCP connect did not complete in time.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// The server rejected the login.
    #[error("login rejected: {0}")]
    AuthFailed(String),

    /// The server did not answer the login in time.
    #[error("login timed out after {0:?}")]
    LoginTimeout(Duration),

    /// The session is gone; connect again before acting.
    #[error("connection closed")]
    Closed,

    /// State-machine refusal (wrong state for this action).
    #[error(transparent)]
    Session(#[from] reborn_core::SessionError),

    /// Wire codec failure on an encode path.
    #[error(transparent)]
    Protocol(#[from] reborn_proto::ProtocolError),
}
