//! The room: a two-seat state machine around one game instance.
//!
//! A room never runs on its own task. Its two sessions push events into
//! the room's [`Synchronizer`] from their own loops, and the server calls
//! [`Room::update`] once per tick to apply them in arrival order. Every
//! message the room wants delivered, and every lifecycle change, leaves as
//! a [`RoomEffect`] through the outbox handler.
//!
//! ```text
//!            move (valid, no outcome)
//!               ┌────────┐
//!               ▼        │
//!   new ──→  Active ─────┘
//!               │  win / draw / disconnect
//!               ▼
//!             Ended ──(last disconnect)──→ Finished effect
//! ```

use std::fmt;
use std::sync::{Arc, Weak};

use gridplay_protocol::{ConnectionId, Position, RoomId, ServerMessage, WinStatus};
use gridplay_session::{SessionEvent, SessionHandler};
use gridplay_sync::{Handler, Synchronizer, fatal};

use crate::{Game, MoveError, Outcome, Seat};

/// Cause sent with a win or loss decided on the board.
pub const CAUSE_LINE: &str = "three in a row";
/// Cause sent with a draw.
pub const CAUSE_FULL: &str = "board is full";
/// Cause sent with a win by forfeit.
pub const CAUSE_FORFEIT: &str = "opponent disconnected";

/// The lifecycle state of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    /// Moves are accepted from the seat whose turn it is.
    Active,
    /// The game is over. Moves are refused and the room waits for its
    /// remaining seats to leave.
    Ended,
}

impl fmt::Display for RoomState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::Ended => write!(f, "Ended"),
        }
    }
}

/// A session event tagged with the seat it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomEvent {
    pub seat: Seat,
    pub event: SessionEvent,
}

/// What a room asks its owner to do.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEffect {
    /// Deliver `message` to `connection`.
    Send {
        connection: ConnectionId,
        message: ServerMessage,
    },
    /// `connection` left its seat. Its session should be torn down.
    Left { connection: ConnectionId },
    /// The room is done and should be removed. `survivor` is the
    /// connection still seated, if any.
    Finished {
        room: RoomId,
        survivor: Option<ConnectionId>,
    },
}

/// A running room.
pub struct Room<G: Game> {
    id: RoomId,
    seats: [Option<ConnectionId>; 2],
    game: G,
    state: RoomState,
    inbox: Arc<Synchronizer<RoomEvent>>,
    outbox: Arc<dyn Handler<RoomEffect>>,
}

impl<G: Game> Room<G> {
    /// Seats `players` (seat 0 first) and announces the match to both.
    pub fn new(
        id: RoomId,
        players: [ConnectionId; 2],
        game: G,
        queue_capacity: usize,
        outbox: Arc<dyn Handler<RoomEffect>>,
    ) -> Self {
        let room = Self {
            id,
            seats: players.map(Some),
            game,
            state: RoomState::Active,
            inbox: Arc::new(Synchronizer::new("room", queue_capacity)),
            outbox,
        };
        tracing::info!(room = %id, seat0 = %players[0], seat1 = %players[1], "room created");

        for seat in Seat::BOTH {
            let mine = room.game.symbol(seat);
            let theirs = room.game.symbol(seat.opponent());
            room.send(players[seat.index()], ServerMessage::match_started(mine, theirs));
        }
        room
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn state(&self) -> RoomState {
        self.state
    }

    pub fn game(&self) -> &G {
        &self.game
    }

    /// The connection in `seat`, or `None` once it has left.
    pub fn occupant(&self, seat: Seat) -> Option<ConnectionId> {
        self.seats[seat.index()]
    }

    /// The handler to bind `seat`'s session to.
    ///
    /// The handler only holds a weak reference to the room's queue. Once
    /// the room is dropped it hands every event back to the session.
    pub fn seat_handler(&self, seat: Seat) -> Arc<dyn SessionHandler> {
        Arc::new(SeatHandler {
            seat,
            inbox: Arc::downgrade(&self.inbox),
        })
    }

    /// Applies every queued event. Returns how many were applied.
    pub fn update(&mut self) -> usize {
        let inbox = Arc::clone(&self.inbox);
        inbox.drain_all(|event| self.apply(event))
    }

    /// Applies one event right away.
    pub fn apply(&mut self, RoomEvent { seat, event }: RoomEvent) {
        let Some(connection) = self.occupant(seat) else {
            fatal!("event from a vacated seat", room = self.id, seat = seat, event = event)
        };
        tracing::debug!(room = %self.id, %seat, ?event, state = %self.state, "room event");

        match (self.state, event) {
            (RoomState::Active, SessionEvent::Move(pos)) => self.play(seat, connection, pos),
            (RoomState::Active, SessionEvent::Disconnect) => self.forfeit(seat, connection),
            (RoomState::Ended, SessionEvent::Move(_)) => {
                self.reject(connection, MoveError::GameEnded);
            }
            (RoomState::Ended, SessionEvent::Disconnect) => {
                self.vacate(seat, connection);
                let survivor = self.occupant(seat.opponent());
                tracing::info!(room = %self.id, ?survivor, "room finished");
                self.outbox.handle(RoomEffect::Finished {
                    room: self.id,
                    survivor,
                });
            }
        }
    }

    fn play(&mut self, seat: Seat, connection: ConnectionId, pos: Position) {
        if self.game.current_seat() != seat {
            self.reject(connection, MoveError::NotYourTurn);
            return;
        }
        if let Err(e) = self.game.apply(pos) {
            self.reject(connection, e);
            return;
        }

        self.send(connection, ServerMessage::approved());
        let opponent = self.seated(seat.opponent());
        self.send(opponent, ServerMessage::OpponentMove(pos));

        match self.game.outcome() {
            Outcome::Undecided => {}
            Outcome::Win(winner) => {
                let loser = self.seated(winner.opponent());
                let winner = self.seated(winner);
                self.send(winner, ServerMessage::win_event(WinStatus::Win, CAUSE_LINE));
                self.send(loser, ServerMessage::win_event(WinStatus::Lose, CAUSE_LINE));
                self.end();
            }
            Outcome::Draw => {
                for seat in Seat::BOTH {
                    let connection = self.seated(seat);
                    self.send(connection, ServerMessage::win_event(WinStatus::Draw, CAUSE_FULL));
                }
                self.end();
            }
        }
    }

    fn forfeit(&mut self, seat: Seat, connection: ConnectionId) {
        let opponent = self.seated(seat.opponent());
        if !self.game.outcome().is_decided() {
            self.send(opponent, ServerMessage::win_event(WinStatus::Win, CAUSE_FORFEIT));
        }
        self.vacate(seat, connection);
        self.end();
    }

    fn end(&mut self) {
        self.state = RoomState::Ended;
        tracing::info!(room = %self.id, outcome = ?self.game.outcome(), "game ended");
    }

    fn vacate(&mut self, seat: Seat, connection: ConnectionId) {
        self.seats[seat.index()] = None;
        tracing::info!(room = %self.id, %seat, %connection, "seat vacated");
        self.outbox.handle(RoomEffect::Left { connection });
    }

    /// The occupant of a seat that must still be occupied.
    fn seated(&self, seat: Seat) -> ConnectionId {
        match self.occupant(seat) {
            Some(connection) => connection,
            None => fatal!("seat unexpectedly vacant", room = self.id, seat = seat, state = self.state),
        }
    }

    fn reject(&self, connection: ConnectionId, reason: MoveError) {
        tracing::debug!(room = %self.id, %connection, %reason, "move rejected");
        self.send(connection, ServerMessage::rejected(reason.to_string()));
    }

    fn send(&self, connection: ConnectionId, message: ServerMessage) {
        self.outbox.handle(RoomEffect::Send {
            connection,
            message,
        });
    }
}

struct SeatHandler {
    seat: Seat,
    inbox: Weak<Synchronizer<RoomEvent>>,
}

impl SessionHandler for SeatHandler {
    fn handle(&self, event: SessionEvent) -> Result<(), SessionEvent> {
        let Some(inbox) = self.inbox.upgrade() else {
            return Err(event);
        };
        inbox.push(RoomEvent {
            seat: self.seat,
            event,
        });
        Ok(())
    }
}
