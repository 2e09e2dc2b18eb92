//! Tic-tac-toe on a 3×3 board.

use gridplay_protocol::Position;

use crate::{Game, MoveError, Outcome, Seat};

const SIZE: usize = 3;

/// A tic-tac-toe match between two seats.
///
/// The board is addressed as `board[x][y]`. Seat 0 always moves first,
/// but which of `X` and `O` it plays is drawn at random per match.
#[derive(Debug, Clone)]
pub struct TicTacToe {
    board: [[Option<Seat>; SIZE]; SIZE],
    symbols: [char; 2],
    turn: Seat,
    moves: usize,
    outcome: Outcome,
}

impl TicTacToe {
    /// A fresh board where seat 0 plays `first` and seat 1 plays `second`.
    pub fn with_symbols(first: char, second: char) -> Self {
        Self {
            board: [[None; SIZE]; SIZE],
            symbols: [first, second],
            turn: Seat::FIRST,
            moves: 0,
            outcome: Outcome::Undecided,
        }
    }

    /// The seat holding the cell at `position`, if any.
    pub fn cell(&self, position: Position) -> Option<Seat> {
        let (x, y) = index(position)?;
        self.board[x][y]
    }

    pub fn moves_played(&self) -> usize {
        self.moves
    }

    fn completes_line(&self, x: usize, y: usize, seat: Seat) -> bool {
        let mine = |x: usize, y: usize| self.board[x][y] == Some(seat);
        let column = (0..SIZE).all(|i| mine(x, i));
        let row = (0..SIZE).all(|i| mine(i, y));
        let diagonal = x == y && (0..SIZE).all(|i| mine(i, i));
        let anti = x + y == SIZE - 1 && (0..SIZE).all(|i| mine(i, SIZE - 1 - i));
        column || row || diagonal || anti
    }
}

fn index(position: Position) -> Option<(usize, usize)> {
    let x = usize::try_from(position.x).ok().filter(|&x| x < SIZE)?;
    let y = usize::try_from(position.y).ok().filter(|&y| y < SIZE)?;
    Some((x, y))
}

impl Game for TicTacToe {
    fn new_match() -> Self {
        if rand::random::<bool>() {
            Self::with_symbols('X', 'O')
        } else {
            Self::with_symbols('O', 'X')
        }
    }

    fn current_seat(&self) -> Seat {
        self.turn
    }

    fn apply(&mut self, position: Position) -> Result<(), MoveError> {
        if self.outcome.is_decided() {
            return Err(MoveError::GameEnded);
        }
        let (x, y) = index(position).ok_or(MoveError::OutOfRange)?;
        if self.board[x][y].is_some() {
            return Err(MoveError::CellNotEmpty);
        }

        let seat = self.turn;
        self.board[x][y] = Some(seat);
        self.moves += 1;

        if self.completes_line(x, y, seat) {
            self.outcome = Outcome::Win(seat);
        } else if self.moves == SIZE * SIZE {
            self.outcome = Outcome::Draw;
        }
        self.turn = seat.opponent();
        Ok(())
    }

    fn outcome(&self) -> Outcome {
        self.outcome
    }

    fn symbol(&self, seat: Seat) -> char {
        self.symbols[seat.index()]
    }
}
