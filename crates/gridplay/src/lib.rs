//! # Gridplay
//!
//! A real-time session server for two-player, turn-based games.
//!
//! Clients connect over WebSocket, are paired by a matchmaker, play one
//! game in an isolated room and are paired again when their opponent
//! leaves a finished game. Every change to room or server state happens
//! on a single logical thread, the periodic tick, no matter how many
//! connection tasks are producing events.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gridplay::prelude::*;
//!
//! # async fn demo() -> Result<(), GridplayError> {
//! let server = GameServerBuilder::<TicTacToe>::from_config(ServerConfig::from_env()?).build();
//! let transport = server.bind_websocket().await?;
//! server.start();
//! server.run(transport).await
//! # }
//! ```

mod config;
mod error;
pub mod matchmaker;
pub mod mediator;
mod server;

pub use config::ServerConfig;
pub use error::{ConfigError, GridplayError};
pub use server::{GameServer, GameServerBuilder};

/// The types most servers and clients of this crate need.
pub mod prelude {
    pub use crate::{ConfigError, GameServer, GameServerBuilder, GridplayError, ServerConfig};
    pub use gridplay_protocol::{
        ClientMessage, Codec, ConnectionId, JsonCodec, Position, RoomId, ServerMessage,
        WinStatus,
    };
    pub use gridplay_room::{Game, MoveError, Outcome, Seat, TicTacToe};
    pub use gridplay_transport::{
        Connection, MemoryConnection, MemoryPeer, Transport, WebSocketTransport,
    };
}
