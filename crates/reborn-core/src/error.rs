//! Session-level errors.

use thiserror::Error;

use crate::session::SessionState;

/// Errors surfaced by session methods.
///
/// These are caller errors or wrapped protocol failures; inbound-stream
/// problems never travel this path (they become events or disconnects).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A public action was invoked in the wrong session state.
    #[error("{action} requires an authenticated session (state: {state:?})")]
    NotReady {
        /// The action that was attempted.
        action: &'static str,
        /// State the session was in.
        state: SessionState,
    },

    /// A wire codec failure bubbled out of an encode path.
    #[error(transparent)]
    Protocol(#[from] reborn_proto::ProtocolError),
}
