//! Codec trait and the JSON implementation.
//!
//! A "codec" (coder/decoder) converts between Rust values and raw bytes.
//! The rest of the server only talks to the [`Codec`] trait, so the wire
//! format could change without touching sessions or rooms.

use serde::{Serialize, de::DeserializeOwned};

use crate::{Envelope, ProtocolError, WireMessage};

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// ## Trait bounds explained
///
/// - `Send + Sync` → safe to share between threads. Every session's reader
///   task holds one.
/// - `'static` → the codec owns everything it needs, which is required for
///   values stored in long-lived async tasks.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;

    /// Encodes a message inside its `{type, data}` envelope.
    fn encode_message<M: WireMessage>(
        &self,
        message: &M,
    ) -> Result<Vec<u8>, ProtocolError> {
        self.encode(&message.to_envelope()?)
    }

    /// Decodes an envelope and interprets it as `M`.
    ///
    /// # Errors
    /// Anything [`decode`](Self::decode) or
    /// [`WireMessage::from_envelope`] reports, including
    /// `ProtocolError::UnknownType`.
    fn decode_message<M: WireMessage>(
        &self,
        data: &[u8],
    ) -> Result<M, ProtocolError> {
        let envelope: Envelope = self.decode(data)?;
        M::from_envelope(envelope)
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// JSON is what browsers speak natively, and it keeps frames readable in
/// DevTools.
///
/// ## Example
///
/// ```rust
/// use gridplay_protocol::{ClientMessage, Codec, JsonCodec, Position};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode_message(&ClientMessage::Move(Position::new(1, 1))).unwrap();
/// assert_eq!(bytes, br#"{"type":0,"data":{"x":1,"y":1}}"#);
///
/// let back: ClientMessage = codec.decode_message(&bytes).unwrap();
/// assert_eq!(back, ClientMessage::Move(Position::new(1, 1)));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClientMessage, Position, ServerMessage};

    #[test]
    fn test_decode_garbage_returns_decode_error() {
        let result: Result<ClientMessage, _> = JsonCodec.decode_message(b"not json");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_decode_unknown_type_returns_unknown_type() {
        let result: Result<ClientMessage, _> =
            JsonCodec.decode_message(br#"{"type":9,"data":{}}"#);
        assert!(matches!(result, Err(ProtocolError::UnknownType(9))));
    }

    #[test]
    fn test_encode_server_message_is_compact_json() {
        let bytes = JsonCodec
            .encode_message(&ServerMessage::OpponentMove(Position::new(0, 2)))
            .unwrap();
        assert_eq!(bytes, br#"{"type":2,"data":{"x":0,"y":2}}"#);
    }

    #[test]
    fn test_decode_ignores_unknown_envelope_fields() {
        let msg: ClientMessage = JsonCodec
            .decode_message(br#"{"type":0,"data":{"x":1,"y":2},"seq":4}"#)
            .unwrap();
        assert_eq!(msg, ClientMessage::Move(Position::new(1, 2)));
    }
}
