//! Error types for the board layer.

use concentration_protocol::Position;

use crate::GameStatus;

/// A well-formed server event that the board cannot accept.
///
/// Apart from [`GameOver`](Self::GameOver), every variant means the client
/// and the server no longer agree on what the board looks like. The
/// client cannot guess which side is wrong, so the session treats these
/// as fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// A position is not on the board.
    #[error("position {position} outside {dimension}x{dimension} board")]
    OutOfBounds { position: Position, dimension: usize },

    /// A board needs at least one cell.
    #[error("board dimension must be positive")]
    ZeroDimension,

    /// The board would be larger than the client is willing to hold.
    #[error("board dimension {dimension} exceeds the limit of {max}")]
    DimensionTooLarge { dimension: usize, max: usize },

    /// `BOARD_DIM` arrived after the board was already established.
    #[error("board dimension announced again ({0}) after handshake")]
    UnexpectedBoardSize(usize),

    /// `REVEALED_CARD` for a card that is already face up.
    #[error("card at {0} is already revealed")]
    AlreadyRevealed(Position),

    /// `MATCH`/`MISMATCH` referencing a card that is face down.
    #[error("card at {0} is not revealed")]
    NotRevealed(Position),

    /// `MATCH`/`MISMATCH` referencing a card already removed from play.
    #[error("card at {0} is already matched")]
    AlreadyMatched(Position),

    /// `MATCH`/`MISMATCH` naming the same card twice.
    #[error("turn resolves card {0} against itself")]
    SamePosition(Position),

    /// An event arrived after the game ended. Not fatal: logged and ignored.
    #[error("event received after game ended ({0})")]
    GameOver(GameStatus),
}

impl ProtocolError {
    /// Returns `true` if the session must stop after this error.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::GameOver(_))
    }
}
