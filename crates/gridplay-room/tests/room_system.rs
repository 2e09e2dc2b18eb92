//! Integration tests for the room state machine.

use std::sync::{Arc, Mutex};
use std::thread;

use gridplay_protocol::{ConnectionId, Position, RoomId, ServerMessage, WinStatus};
use gridplay_room::{
    CAUSE_FORFEIT, CAUSE_FULL, CAUSE_LINE, Game, MoveError, Outcome, Room, RoomEffect,
    RoomState, Seat, TicTacToe,
};
use gridplay_session::SessionEvent;
use gridplay_sync::Handler;

// =========================================================================
// Helpers
// =========================================================================

/// Records every effect a room emits.
#[derive(Default)]
struct Outbox {
    effects: Mutex<Vec<RoomEffect>>,
}

impl Handler<RoomEffect> for Outbox {
    fn handle(&self, effect: RoomEffect) {
        self.effects.lock().unwrap().push(effect);
    }
}

impl Outbox {
    fn take(&self) -> Vec<RoomEffect> {
        std::mem::take(&mut *self.effects.lock().unwrap())
    }

    /// Messages sent to `connection` since the last take, in order.
    fn messages_for(effects: &[RoomEffect], connection: ConnectionId) -> Vec<ServerMessage> {
        effects
            .iter()
            .filter_map(|e| match e {
                RoomEffect::Send {
                    connection: to,
                    message,
                } if *to == connection => Some(message.clone()),
                _ => None,
            })
            .collect()
    }
}

struct Table<G: Game> {
    room: Room<G>,
    outbox: Arc<Outbox>,
    players: [ConnectionId; 2],
}

impl<G: Game> Table<G> {
    fn new(game: G) -> Self {
        let outbox = Arc::new(Outbox::default());
        let players = [ConnectionId::generate(), ConnectionId::generate()];
        let room = Room::new(RoomId::generate(), players, game, 64, outbox.clone());
        outbox.take();
        Self {
            room,
            outbox,
            players,
        }
    }

    /// Sends `event` through the seat's session handler and runs one drain.
    fn send(&mut self, seat: Seat, event: SessionEvent) -> Vec<RoomEffect> {
        self.room.seat_handler(seat).handle(event).unwrap();
        self.room.update();
        self.outbox.take()
    }

    fn play(&mut self, seat: Seat, x: i32, y: i32) -> Vec<RoomEffect> {
        self.send(seat, SessionEvent::Move(Position::new(x, y)))
    }

    fn seat(&self, seat: Seat) -> ConnectionId {
        self.players[seat.index()]
    }
}

fn tictactoe() -> Table<TicTacToe> {
    Table::new(TicTacToe::with_symbols('X', 'O'))
}

const A: Seat = Seat::FIRST;
const B: Seat = Seat::SECOND;

// =========================================================================
// Moves
// =========================================================================

#[test]
fn test_valid_move_is_approved_and_forwarded() {
    let mut t = tictactoe();
    let effects = t.play(A, 1, 1);

    assert_eq!(
        Outbox::messages_for(&effects, t.seat(A)),
        vec![ServerMessage::approved()]
    );
    assert_eq!(
        Outbox::messages_for(&effects, t.seat(B)),
        vec![ServerMessage::OpponentMove(Position::new(1, 1))]
    );
    assert_eq!(t.room.game().current_seat(), B);
}

#[test]
fn test_move_out_of_turn_is_rejected_without_change() {
    let mut t = tictactoe();
    let effects = t.play(B, 0, 0);

    assert_eq!(
        effects,
        vec![RoomEffect::Send {
            connection: t.seat(B),
            message: ServerMessage::rejected("not your turn"),
        }]
    );
    assert_eq!(t.room.game().moves_played(), 0);
    assert_eq!(t.room.game().current_seat(), A);
}

#[test]
fn test_move_into_occupied_cell_is_rejected() {
    let mut t = tictactoe();
    t.play(A, 1, 1);
    let effects = t.play(B, 1, 1);

    assert_eq!(
        Outbox::messages_for(&effects, t.seat(B)),
        vec![ServerMessage::rejected(MoveError::CellNotEmpty.to_string())]
    );
    assert!(Outbox::messages_for(&effects, t.seat(A)).is_empty());
    assert_eq!(t.room.game().moves_played(), 1);

    // Still seat B's turn, and a legal cell goes through.
    let effects = t.play(B, 0, 0);
    assert_eq!(
        Outbox::messages_for(&effects, t.seat(B)),
        vec![ServerMessage::approved()]
    );
}

// =========================================================================
// Outcomes
// =========================================================================

#[test]
fn test_line_ends_game_with_win_and_lose() {
    let mut t = tictactoe();
    for (seat, x, y) in [(A, 0, 0), (B, 1, 0), (A, 0, 1), (B, 1, 1)] {
        t.play(seat, x, y);
    }
    let effects = t.play(A, 0, 2);

    assert_eq!(
        Outbox::messages_for(&effects, t.seat(A)),
        vec![
            ServerMessage::approved(),
            ServerMessage::win_event(WinStatus::Win, CAUSE_LINE),
        ]
    );
    assert_eq!(
        Outbox::messages_for(&effects, t.seat(B)),
        vec![
            ServerMessage::OpponentMove(Position::new(0, 2)),
            ServerMessage::win_event(WinStatus::Lose, CAUSE_LINE),
        ]
    );
    assert_eq!(t.room.state(), RoomState::Ended);
}

#[test]
fn test_full_board_is_a_draw_for_both() {
    let mut t = tictactoe();
    let moves = [
        (A, 0, 0),
        (B, 1, 0),
        (A, 2, 0),
        (B, 1, 1),
        (A, 0, 1),
        (B, 2, 1),
        (A, 1, 2),
        (B, 0, 2),
    ];
    for (seat, x, y) in moves {
        t.play(seat, x, y);
    }
    let effects = t.play(A, 2, 2);

    let draw = ServerMessage::win_event(WinStatus::Draw, CAUSE_FULL);
    assert_eq!(Outbox::messages_for(&effects, t.seat(A)).last(), Some(&draw));
    assert_eq!(Outbox::messages_for(&effects, t.seat(B)).last(), Some(&draw));
    assert_eq!(t.room.state(), RoomState::Ended);
}

#[test]
fn test_moves_after_end_are_refused_for_both_seats() {
    let mut t = tictactoe();
    for (seat, x, y) in [(A, 0, 0), (B, 1, 0), (A, 0, 1), (B, 1, 1), (A, 0, 2)] {
        t.play(seat, x, y);
    }

    for seat in [A, B] {
        let effects = t.play(seat, 2, 2);
        assert_eq!(
            effects,
            vec![RoomEffect::Send {
                connection: t.seat(seat),
                message: ServerMessage::rejected("game has ended"),
            }]
        );
    }
    assert_eq!(t.room.game().moves_played(), 5);
    assert_eq!(t.room.game().outcome(), Outcome::Win(A));
}

// =========================================================================
// Disconnects
// =========================================================================

#[test]
fn test_forfeit_awards_exactly_one_win() {
    let mut t = tictactoe();
    t.play(A, 1, 1);

    let effects = t.send(A, SessionEvent::Disconnect);
    assert_eq!(
        effects,
        vec![
            RoomEffect::Send {
                connection: t.seat(B),
                message: ServerMessage::win_event(WinStatus::Win, CAUSE_FORFEIT),
            },
            RoomEffect::Left {
                connection: t.seat(A),
            },
        ]
    );
    assert_eq!(t.room.state(), RoomState::Ended);
    assert_eq!(t.room.occupant(A), None);

    // The survivor leaving later removes the room silently.
    let effects = t.send(B, SessionEvent::Disconnect);
    assert_eq!(
        effects,
        vec![
            RoomEffect::Left {
                connection: t.seat(B),
            },
            RoomEffect::Finished {
                room: t.room.id(),
                survivor: None,
            },
        ]
    );
}

#[test]
fn test_leaving_a_decided_game_sends_no_forfeit() {
    let mut t = tictactoe();
    for (seat, x, y) in [(A, 0, 0), (B, 1, 0), (A, 0, 1), (B, 1, 1), (A, 0, 2)] {
        t.play(seat, x, y);
    }

    let effects = t.send(B, SessionEvent::Disconnect);
    assert_eq!(
        effects,
        vec![
            RoomEffect::Left {
                connection: t.seat(B),
            },
            RoomEffect::Finished {
                room: t.room.id(),
                survivor: Some(t.seat(A)),
            },
        ]
    );
}

#[test]
fn test_survivor_in_ended_room_gets_game_has_ended() {
    let mut t = tictactoe();
    t.send(B, SessionEvent::Disconnect);

    let effects = t.play(A, 0, 0);
    assert_eq!(
        Outbox::messages_for(&effects, t.seat(A)),
        vec![ServerMessage::rejected("game has ended")]
    );
}

// =========================================================================
// Ordering and the game seam
// =========================================================================

#[test]
fn test_concurrent_seat_events_apply_in_enqueue_order() {
    let mut t = tictactoe();
    let order = Arc::new(Mutex::new(Vec::new()));

    // Both seats race to play their first move into different cells.
    let handles: Vec<_> = [(A, 0), (B, 2)]
        .into_iter()
        .map(|(seat, x)| {
            let handler = t.room.seat_handler(seat);
            let order = Arc::clone(&order);
            thread::spawn(move || {
                let mut order = order.lock().unwrap();
                handler
                    .handle(SessionEvent::Move(Position::new(x, 0)))
                    .unwrap();
                order.push(seat);
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(t.room.update(), 2);
    let effects = t.outbox.take();
    let order = order.lock().unwrap().clone();

    // Seat A always gets approved. Seat B is approved only if it queued
    // after seat A did.
    let b_answer = Outbox::messages_for(&effects, t.seat(B))
        .into_iter()
        .find(|m| matches!(m, ServerMessage::MoveAnswer(_)));
    let expected = if order == [A, B] {
        ServerMessage::approved()
    } else {
        ServerMessage::rejected("not your turn")
    };
    assert_eq!(b_answer, Some(expected));
}

/// A game that ends in a draw after its first move and counts calls.
struct OneMove {
    applied: usize,
}

impl Game for OneMove {
    fn new_match() -> Self {
        Self { applied: 0 }
    }

    fn current_seat(&self) -> Seat {
        Seat::FIRST
    }

    fn apply(&mut self, _position: Position) -> Result<(), MoveError> {
        self.applied += 1;
        Ok(())
    }

    fn outcome(&self) -> Outcome {
        if self.applied > 0 {
            Outcome::Draw
        } else {
            Outcome::Undecided
        }
    }

    fn symbol(&self, seat: Seat) -> char {
        if seat == Seat::FIRST { '♠' } else { '♥' }
    }
}

#[test]
fn test_room_hosts_any_game() {
    let outbox = Arc::new(Outbox::default());
    let players = [ConnectionId::generate(), ConnectionId::generate()];
    let _room = Room::new(RoomId::generate(), players, OneMove::new_match(), 4, outbox.clone());
    assert_eq!(
        Outbox::messages_for(&outbox.take(), players[1]),
        vec![ServerMessage::match_started('♥', '♠')]
    );

    let mut t = Table::new(OneMove::new_match());
    t.play(A, 9, 9);
    assert_eq!(t.room.state(), RoomState::Ended);

    // An ended room never reaches the game again.
    t.play(A, 9, 9);
    assert_eq!(t.room.game().applied, 1);
}
