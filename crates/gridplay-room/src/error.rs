//! Error types for the room layer.

/// Why a move was refused.
///
/// These are domain rejections, not failures: the offending client gets
/// the `Display` text back as the `reason` of a `move_answer` and the
/// connection stays open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    /// The sender's seat is not the one the game is waiting on.
    #[error("not your turn")]
    NotYourTurn,

    /// The target cell already holds a mark.
    #[error("cell is not empty")]
    CellNotEmpty,

    /// The target lies outside the board.
    #[error("position out of range")]
    OutOfRange,

    /// The game already has an outcome.
    #[error("game has ended")]
    GameEnded,
}
