//! Core protocol types for the Concentration wire format.
//!
//! Every type here is something that either arrives from the server
//! ([`ServerEvent`]) or is sent to it ([`ClientCommand`]). The codec in
//! `codec.rs` turns them into and out of newline-terminated text records.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Record names
// ---------------------------------------------------------------------------

/// Leading token of each wire record.
///
/// Kept as constants so the encoder, decoder, and test fake servers all
/// agree on spelling.
pub mod record {
    /// Server → client: board dimension, sent exactly once as the first frame.
    pub const BOARD_DIM: &str = "BOARD_DIM";
    /// Server → client: a card was turned face up.
    pub const REVEALED_CARD: &str = "REVEALED_CARD";
    /// Server → client: the two face-up cards match.
    pub const MATCH: &str = "MATCH";
    /// Server → client: the two face-up cards differ and go face down.
    pub const MISMATCH: &str = "MISMATCH";
    /// Server → client: every pair was found.
    pub const GAME_WON: &str = "GAME_WON";
    /// Server → client: the game is over without a win.
    pub const GAME_LOST: &str = "GAME_LOST";
    /// Server → client: the server rejected something; rest of line is the reason.
    pub const ERROR: &str = "ERROR";
    /// Client → server: turn the card at `row col` face up.
    pub const REVEAL: &str = "REVEAL";
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A cell coordinate on the board.
///
/// Rows and columns are zero-based. Whether a position is actually on the
/// board depends on the dimension the server announced, so this type does
/// not check bounds by itself. See [`Position::within`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
pub struct Position {
    /// Zero-based row index.
    pub row: usize,
    /// Zero-based column index.
    pub col: usize,
}

impl Position {
    /// Creates a position from a row and column.
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Returns `true` if this position lies on a board of `dimension × dimension`.
    pub const fn within(self, dimension: usize) -> bool {
        self.row < dimension && self.col < dimension
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

impl From<(usize, usize)> for Position {
    fn from((row, col): (usize, usize)) -> Self {
        Self { row, col }
    }
}

// ---------------------------------------------------------------------------
// Symbol
// ---------------------------------------------------------------------------

/// The face of a card, as assigned by the server.
///
/// Symbols are opaque: usually a single letter, but the client makes no
/// assumption beyond "one whitespace-free token". Two cards match when
/// the server says so, not when their symbols compare equal.
///
/// Deserializing goes through [`Symbol::new`], so a symbol read back from
/// JSON obeys the same rules as one read off the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Wraps a token as a symbol.
    ///
    /// Returns `None` for an empty token or one containing whitespace,
    /// since neither could have come off the wire as a single field.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.is_empty() || token.chars().any(char::is_whitespace) {
            return None;
        }
        Some(Self(token))
    }

    /// Returns the symbol as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Symbol {
    type Error = &'static str;

    fn try_from(token: String) -> Result<Self, Self::Error> {
        Self::new(token).ok_or("symbol must be a single non-empty token")
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

// ---------------------------------------------------------------------------
// ServerEvent: everything the server can tell us
// ---------------------------------------------------------------------------

/// A decoded server → client message.
///
/// One variant per record type in the wire table. The server is the sole
/// authority on the game; the client only mirrors what these events say.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// `BOARD_DIM n`: the board is `n × n`. Only valid as the first frame.
    BoardSize { dimension: usize },

    /// `REVEALED_CARD row col symbol`: the card at `position` is face up.
    CardRevealed { position: Position, symbol: Symbol },

    /// `MATCH r1 c1 r2 c2`: the two face-up cards are a pair and stay revealed.
    Matched { first: Position, second: Position },

    /// `MISMATCH r1 c1 r2 c2`: the two face-up cards differ and are hidden again.
    Mismatched { first: Position, second: Position },

    /// `GAME_WON`
    GameWon,

    /// `GAME_LOST`
    GameLost,

    /// `ERROR message`: the server reports a failure. Always terminal.
    Error { message: String },
}

impl ServerEvent {
    /// The wire record name for this event.
    pub fn record_name(&self) -> &'static str {
        match self {
            Self::BoardSize { .. } => record::BOARD_DIM,
            Self::CardRevealed { .. } => record::REVEALED_CARD,
            Self::Matched { .. } => record::MATCH,
            Self::Mismatched { .. } => record::MISMATCH,
            Self::GameWon => record::GAME_WON,
            Self::GameLost => record::GAME_LOST,
            Self::Error { .. } => record::ERROR,
        }
    }

    /// Every board position this event refers to.
    pub fn positions(&self) -> Vec<Position> {
        match self {
            Self::CardRevealed { position, .. } => vec![*position],
            Self::Matched { first, second }
            | Self::Mismatched { first, second } => vec![*first, *second],
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for ServerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BoardSize { dimension } => {
                write!(f, "{} {dimension}", record::BOARD_DIM)
            }
            Self::CardRevealed { position, symbol } => write!(
                f,
                "{} {} {} {symbol}",
                record::REVEALED_CARD,
                position.row,
                position.col
            ),
            Self::Matched { first, second } => write!(
                f,
                "{} {} {} {} {}",
                record::MATCH,
                first.row,
                first.col,
                second.row,
                second.col
            ),
            Self::Mismatched { first, second } => write!(
                f,
                "{} {} {} {} {}",
                record::MISMATCH,
                first.row,
                first.col,
                second.row,
                second.col
            ),
            Self::GameWon => f.write_str(record::GAME_WON),
            Self::GameLost => f.write_str(record::GAME_LOST),
            Self::Error { message } => {
                write!(f, "{} {message}", record::ERROR)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ClientCommand: everything we can tell the server
// ---------------------------------------------------------------------------

/// A client → server message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientCommand {
    /// `REVEAL row col`: ask the server to turn a card face up.
    Reveal { position: Position },
}

impl fmt::Display for ClientCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reveal { position } => write!(
                f,
                "{} {} {}",
                record::REVEAL,
                position.row,
                position.col
            ),
        }
    }
}
