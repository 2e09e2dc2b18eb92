//! The `Game` trait, the extension point a room plays through.
//!
//! A room only needs three things from the game it hosts: whose turn it
//! is, a way to apply a move, and the current outcome. Everything else
//! (board shape, symbols, line detection) stays behind this trait.

use std::fmt;

use gridplay_protocol::Position;
use gridplay_sync::invariant;

use crate::MoveError;

/// A room-scoped player slot, fixed for the room's lifetime.
///
/// Rooms always have exactly two seats, so a `Seat` is either 0 or 1.
/// Seat 0 is the connection that reached the matchmaker first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Seat(u8);

impl Seat {
    pub const FIRST: Seat = Seat(0);
    pub const SECOND: Seat = Seat(1);
    pub const BOTH: [Seat; 2] = [Seat::FIRST, Seat::SECOND];

    /// Builds a seat from its index.
    ///
    /// Any index other than 0 or 1 is a bookkeeping bug and is fatal.
    pub fn new(index: u8) -> Self {
        invariant!(index < 2, "seat index out of range", seat = index);
        Seat(index)
    }

    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    /// The other seat in a two-seat room.
    pub fn opponent(self) -> Seat {
        Seat(1 - self.0)
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seat {}", self.0)
    }
}

/// Where a game stands after its last move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No winner yet and moves remain.
    Undecided,
    /// The given seat has won.
    Win(Seat),
    /// No moves remain and nobody has won.
    Draw,
}

impl Outcome {
    pub fn is_decided(self) -> bool {
        !matches!(self, Self::Undecided)
    }
}

/// The rules engine a room hosts.
///
/// The room enforces turn order itself before calling [`Game::apply`], and
/// never calls it again once [`Game::outcome`] is decided. Implementations
/// may still check both and return the matching [`MoveError`].
///
/// A game instance is owned by exactly one room and is only touched during
/// that room's drain, so it needs to be `Send` but not `Sync`.
pub trait Game: Send + 'static {
    /// Creates the state for a freshly matched pair.
    fn new_match() -> Self
    where
        Self: Sized;

    /// The seat whose move the game is waiting on.
    fn current_seat(&self) -> Seat;

    /// Applies the current seat's move.
    ///
    /// On `Err` the game must be left exactly as it was.
    fn apply(&mut self, position: Position) -> Result<(), MoveError>;

    /// The outcome after the last applied move.
    fn outcome(&self) -> Outcome;

    /// The mark shown for `seat`, sent to clients in `match_started`.
    fn symbol(&self, seat: Seat) -> char;
}
