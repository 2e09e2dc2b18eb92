//! Wire protocol for Gridplay.
//!
//! This crate defines the "language" clients and the server speak:
//!
//! - **Types** ([`ConnectionId`], [`RoomId`], [`Position`]): the
//!   identities and coordinates every other layer passes around.
//! - **Messages** ([`Envelope`], [`ClientMessage`], [`ServerMessage`]):
//!   the `{type, data}` frames and the closed vocabulary per direction.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those frames are
//!   converted to and from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong on the way.
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (ClientMessage) → Session → Room
//! ```

mod codec;
mod error;
mod messages;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use messages::{
    ClientMessage, Envelope, MatchStarted, MoveAnswer, NotAllowed,
    ServerMessage, WinEvent, WinStatus, WireMessage,
};
pub use types::{ConnectionId, Position, RoomId};
