//! Rooms for Gridplay.
//!
//! A room seats exactly two matched sessions and hosts one game between
//! them. It has no task of its own: the sessions feed its queue and the
//! server applies that queue on every tick.
//!
//! # Key types
//!
//! - [`Game`]: the rules engine a room plays through
//! - [`Seat`]: seat 0 or seat 1, fixed for the room's lifetime
//! - [`Room`]: the `Active → Ended` state machine
//! - [`RoomEffect`]: what a room asks its owner to do
//! - [`TicTacToe`]: the bundled game

mod error;
mod game;
mod room;
mod tictactoe;

pub use error::MoveError;
pub use game::{Game, Outcome, Seat};
pub use room::{
    CAUSE_FORFEIT, CAUSE_FULL, CAUSE_LINE, Room, RoomEffect, RoomEvent, RoomState,
};
pub use tictactoe::TicTacToe;
