//! Error types for the session layer.

use gridplay_protocol::ProtocolError;

/// Errors from sending on a session's link.
///
/// None of these close the connection by themselves. A broken link is
/// noticed by its reader, which then starts the disconnect path.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// An earlier write, read or ping already failed. The flag is sticky,
    /// so every later send fails the same way without touching the socket.
    #[error("link is broken")]
    Broken,

    /// The outbound message could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
