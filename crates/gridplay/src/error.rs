//! Unified error type for the Gridplay server.

use gridplay_protocol::ProtocolError;
use gridplay_session::SessionError;
use gridplay_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each wrapped variant generates the `From`
/// impl, so `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum GridplayError {
    /// A transport-level error (bind, accept, handshake).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, unknown type).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (the link is broken).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The server configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The server has not been started, or has been stopped.
    #[error("server is not running")]
    NotRunning,

    /// Accepting one more connection would exceed the configured limit.
    #[error("server is at capacity ({0} connections)")]
    AtCapacity(usize),
}

/// A configuration value that could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}
