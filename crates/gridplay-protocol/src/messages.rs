//! The wire envelope and the two closed message vocabularies.
//!
//! Every frame on the wire, in either direction, is one JSON object:
//!
//! ```text
//! { "type": <integer>, "data": <payload> }
//! ```
//!
//! The integer selects a variant from a *closed* set, and the set is
//! different per direction: the client speaks [`ClientMessage`], the
//! server speaks [`ServerMessage`]. Serde's built-in enum tagging only
//! supports string tags, so each enum converts itself to and from a raw
//! [`Envelope`] by hand through the [`WireMessage`] trait.

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use crate::{Position, ProtocolError};

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The raw frame shape, before the payload is interpreted.
///
/// `data` is kept as an untyped JSON value until `type` has been looked
/// at. A missing `data` field decodes as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: u32,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// A message type that can be carried in an [`Envelope`].
pub trait WireMessage: Sized {
    /// The integer written into the envelope's `type` field.
    fn kind(&self) -> u32;

    /// Wraps this message into an envelope.
    fn to_envelope(&self) -> Result<Envelope, ProtocolError>;

    /// Interprets an envelope as this message type.
    ///
    /// # Errors
    /// [`ProtocolError::UnknownType`] when `kind` is not in this
    /// direction's vocabulary, [`ProtocolError::Decode`] when the payload
    /// does not match the shape `kind` promises.
    fn from_envelope(envelope: Envelope) -> Result<Self, ProtocolError>;
}

fn wrap<T: Serialize>(kind: u32, data: &T) -> Result<Envelope, ProtocolError> {
    let data = serde_json::to_value(data).map_err(ProtocolError::Encode)?;
    Ok(Envelope { kind, data })
}

fn unwrap_data<T: DeserializeOwned>(
    envelope: Envelope,
) -> Result<T, ProtocolError> {
    serde_json::from_value(envelope.data).map_err(ProtocolError::Decode)
}

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// Everything a client may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMessage {
    /// "Put my mark at this position." Wire type `0`.
    Move(Position),
}

impl ClientMessage {
    pub const MOVE: u32 = 0;
}

impl WireMessage for ClientMessage {
    fn kind(&self) -> u32 {
        match self {
            Self::Move(_) => Self::MOVE,
        }
    }

    fn to_envelope(&self) -> Result<Envelope, ProtocolError> {
        match self {
            Self::Move(pos) => wrap(Self::MOVE, pos),
        }
    }

    fn from_envelope(envelope: Envelope) -> Result<Self, ProtocolError> {
        match envelope.kind {
            Self::MOVE => Ok(Self::Move(unwrap_data(envelope)?)),
            other => Err(ProtocolError::UnknownType(other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// Sent to each seat once, when its room is created.
///
/// Browsers read the symbols with `String.fromCharCode`, so they travel
/// as Unicode code points: `{"char": 88, "opponentChar": 79}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchStarted {
    #[serde(with = "code_point")]
    pub char: char,
    #[serde(rename = "opponentChar", with = "code_point")]
    pub opponent_char: char,
}

/// The verdict on a move the client just sent.
///
/// `reason` only appears on the wire when the move was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveAnswer {
    pub approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// How the match ended from the receiving seat's point of view.
///
/// `rename_all = "lowercase"` gives the wire strings `"win"`, `"lose"`
/// and `"draw"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WinStatus {
    Win,
    Lose,
    Draw,
}

/// The final result of a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinEvent {
    pub status: WinStatus,
    pub cause: String,
}

/// An action arrived that the connection is not allowed to take yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotAllowed {
    pub reason: String,
}

/// Everything the server may send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    MatchStarted(MatchStarted),
    MoveAnswer(MoveAnswer),
    OpponentMove(Position),
    WinEvent(WinEvent),
    NotAllowed(NotAllowed),
}

impl ServerMessage {
    pub const MATCH_STARTED: u32 = 0;
    pub const MOVE_ANSWER: u32 = 1;
    pub const OPPONENT_MOVE: u32 = 2;
    pub const WIN_EVENT: u32 = 3;
    pub const NOT_ALLOWED_ERROR: u32 = 4;

    pub fn match_started(char: char, opponent_char: char) -> Self {
        Self::MatchStarted(MatchStarted {
            char,
            opponent_char,
        })
    }

    pub fn approved() -> Self {
        Self::MoveAnswer(MoveAnswer {
            approved: true,
            reason: None,
        })
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::MoveAnswer(MoveAnswer {
            approved: false,
            reason: Some(reason.into()),
        })
    }

    pub fn win_event(status: WinStatus, cause: impl Into<String>) -> Self {
        Self::WinEvent(WinEvent {
            status,
            cause: cause.into(),
        })
    }

    pub fn not_allowed(reason: impl Into<String>) -> Self {
        Self::NotAllowed(NotAllowed {
            reason: reason.into(),
        })
    }
}

impl WireMessage for ServerMessage {
    fn kind(&self) -> u32 {
        match self {
            Self::MatchStarted(_) => Self::MATCH_STARTED,
            Self::MoveAnswer(_) => Self::MOVE_ANSWER,
            Self::OpponentMove(_) => Self::OPPONENT_MOVE,
            Self::WinEvent(_) => Self::WIN_EVENT,
            Self::NotAllowed(_) => Self::NOT_ALLOWED_ERROR,
        }
    }

    fn to_envelope(&self) -> Result<Envelope, ProtocolError> {
        let kind = self.kind();
        match self {
            Self::MatchStarted(m) => wrap(kind, m),
            Self::MoveAnswer(m) => wrap(kind, m),
            Self::OpponentMove(pos) => wrap(kind, pos),
            Self::WinEvent(m) => wrap(kind, m),
            Self::NotAllowed(m) => wrap(kind, m),
        }
    }

    fn from_envelope(envelope: Envelope) -> Result<Self, ProtocolError> {
        Ok(match envelope.kind {
            Self::MATCH_STARTED => Self::MatchStarted(unwrap_data(envelope)?),
            Self::MOVE_ANSWER => Self::MoveAnswer(unwrap_data(envelope)?),
            Self::OPPONENT_MOVE => Self::OpponentMove(unwrap_data(envelope)?),
            Self::WIN_EVENT => Self::WinEvent(unwrap_data(envelope)?),
            Self::NOT_ALLOWED_ERROR => Self::NotAllowed(unwrap_data(envelope)?),
            other => return Err(ProtocolError::UnknownType(other)),
        })
    }
}

/// Serde adapter that writes a `char` as its numeric code point.
mod code_point {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(c: &char, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u32(u32::from(*c))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<char, D::Error> {
        let raw = u32::deserialize(d)?;
        char::from_u32(raw)
            .ok_or_else(|| D::Error::custom(format!("{raw} is not a code point")))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn server_json(msg: &ServerMessage) -> serde_json::Value {
        serde_json::to_value(msg.to_envelope().unwrap()).unwrap()
    }

    fn envelope(value: serde_json::Value) -> Envelope {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_client_move_json_format() {
        let env = ClientMessage::Move(Position::new(1, 2)).to_envelope().unwrap();
        assert_eq!(
            serde_json::to_value(env).unwrap(),
            json!({"type": 0, "data": {"x": 1, "y": 2}})
        );
    }

    #[test]
    fn test_client_move_from_envelope() {
        let env = envelope(json!({"type": 0, "data": {"x": 2, "y": 0}}));
        let msg = ClientMessage::from_envelope(env).unwrap();
        assert_eq!(msg, ClientMessage::Move(Position::new(2, 0)));
    }

    #[test]
    fn test_client_unknown_type_is_reported() {
        let env = envelope(json!({"type": 7, "data": {}}));
        let err = ClientMessage::from_envelope(env).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownType(7)));
    }

    #[test]
    fn test_client_move_with_wrong_shape_is_decode_error() {
        let env = envelope(json!({"type": 0, "data": {"x": "one"}}));
        let err = ClientMessage::from_envelope(env).unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }

    #[test]
    fn test_envelope_missing_data_defaults_to_null() {
        let env = envelope(json!({"type": 3}));
        assert_eq!(env.data, serde_json::Value::Null);
    }

    #[test]
    fn test_match_started_uses_code_points() {
        let json = server_json(&ServerMessage::match_started('X', 'O'));
        assert_eq!(json, json!({"type": 0, "data": {"char": 88, "opponentChar": 79}}));
    }

    #[test]
    fn test_match_started_rejects_invalid_code_point() {
        let env = envelope(json!({"type": 0, "data": {"char": 55296, "opponentChar": 79}}));
        assert!(matches!(
            ServerMessage::from_envelope(env),
            Err(ProtocolError::Decode(_))
        ));
    }

    #[test]
    fn test_move_answer_approved_omits_reason() {
        let json = server_json(&ServerMessage::approved());
        assert_eq!(json, json!({"type": 1, "data": {"approved": true}}));
    }

    #[test]
    fn test_move_answer_rejected_carries_reason() {
        let json = server_json(&ServerMessage::rejected("cell is not empty"));
        assert_eq!(
            json,
            json!({"type": 1, "data": {"approved": false, "reason": "cell is not empty"}})
        );
    }

    #[test]
    fn test_opponent_move_json_format() {
        let json = server_json(&ServerMessage::OpponentMove(Position::new(1, 1)));
        assert_eq!(json, json!({"type": 2, "data": {"x": 1, "y": 1}}));
    }

    #[test]
    fn test_win_event_status_is_lowercase() {
        let json = server_json(&ServerMessage::win_event(WinStatus::Lose, "three in a row"));
        assert_eq!(
            json,
            json!({"type": 3, "data": {"status": "lose", "cause": "three in a row"}})
        );
    }

    #[test]
    fn test_not_allowed_json_format() {
        let json = server_json(&ServerMessage::not_allowed("wait"));
        assert_eq!(json, json!({"type": 4, "data": {"reason": "wait"}}));
    }

    #[test]
    fn test_server_message_kinds_match_envelope() {
        let all = [
            ServerMessage::match_started('O', 'X'),
            ServerMessage::rejected("no"),
            ServerMessage::OpponentMove(Position::new(0, 0)),
            ServerMessage::win_event(WinStatus::Draw, "board is full"),
            ServerMessage::not_allowed("no"),
        ];
        for (expected, msg) in all.iter().enumerate() {
            assert_eq!(msg.kind(), expected as u32);
            let back = ServerMessage::from_envelope(msg.to_envelope().unwrap()).unwrap();
            assert_eq!(&back, msg);
        }
    }

    #[test]
    fn test_server_unknown_type_is_reported() {
        let env = envelope(json!({"type": 5, "data": null}));
        assert!(matches!(
            ServerMessage::from_envelope(env),
            Err(ProtocolError::UnknownType(5))
        ));
    }
}
