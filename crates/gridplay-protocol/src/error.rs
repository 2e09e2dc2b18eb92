//! Error types for the protocol layer.
//!
//! Everything in here is a *protocol error*: the bytes that arrived could
//! not be understood. The session that hits one logs it and drops the
//! frame. The connection itself stays open.

/// Errors that can occur while encoding or decoding wire messages.
///
/// `#[derive(thiserror::Error)]` auto-generates the `std::error::Error`
/// trait implementation, and each `#[error("...")]` attribute becomes the
/// `Display` text you see in logs.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, a missing field, or a
    /// payload whose shape does not match its `type`.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The envelope's `type` is not part of this direction's vocabulary.
    #[error("unknown message type {0}")]
    UnknownType(u32),
}
