//! Error types for the protocol layer.
//!
//! Each crate in the workspace defines its own error enum. A
//! `DecodeError` always means "this frame is not something the protocol
//! allows", never a network or game-state problem.

use crate::Position;

/// A server frame could not be turned into a [`ServerEvent`](crate::ServerEvent).
///
/// Every variant is fatal to the session: the stream is line-oriented, and
/// after a bad frame the client has no safe way to tell what the server
/// believes the board looks like.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The frame was empty or only whitespace.
    #[error("empty frame")]
    EmptyFrame,

    /// The leading token is not a known record name.
    #[error("unknown record {0:?}")]
    UnknownRecord(String),

    /// A required field is missing.
    #[error("{record}: missing field `{field}`")]
    MissingField {
        record: &'static str,
        field: &'static str,
    },

    /// The frame has more fields than its record allows.
    #[error("{record}: unexpected trailing field {extra:?}")]
    TrailingField { record: &'static str, extra: String },

    /// A numeric field did not parse as a non-negative integer.
    #[error("{record}: field `{field}` is not a non-negative integer: {value:?}")]
    InvalidNumber {
        record: &'static str,
        field: &'static str,
        value: String,
    },

    /// `BOARD_DIM 0`: a board needs at least one cell.
    #[error("board dimension must be positive")]
    ZeroDimension,

    /// `BOARD_DIM` above [`MAX_DIMENSION`](crate::MAX_DIMENSION).
    #[error("board dimension {dimension} exceeds the limit of {max}")]
    DimensionTooLarge { dimension: usize, max: usize },

    /// A position falls outside the announced board.
    #[error("{record}: position {position} outside {dimension}x{dimension} board")]
    OutOfBounds {
        record: &'static str,
        position: Position,
        dimension: usize,
    },
}
