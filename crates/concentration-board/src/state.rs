//! The game state machine: applies server events to the board.
//!
//! ```text
//!                 ┌──(GAME_WON)──→ Won
//!   InProgress ───┼──(GAME_LOST)─→ Lost
//!                 └──(ERROR / desync / disconnect)──→ Error
//! ```
//!
//! All three right-hand states are terminal. Once there, `apply` refuses
//! every event with [`ProtocolError::GameOver`] and leaves the state
//! untouched.

use std::fmt;

use concentration_protocol::{Position, ServerEvent, Symbol};
use serde::Serialize;

use crate::{Board, Cell, ProtocolError};

// ---------------------------------------------------------------------------
// GameStatus
// ---------------------------------------------------------------------------

/// Where the game is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// Cards are still being turned.
    InProgress,
    /// The server reported a win.
    Won,
    /// The server reported a loss.
    Lost,
    /// The session ended abnormally: server error, desync, or lost connection.
    Error,
}

impl GameStatus {
    /// Returns `true` for `Won`, `Lost`, and `Error`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InProgress => "in progress",
            Self::Won => "won",
            Self::Lost => "lost",
            Self::Error => "error",
        })
    }
}

// ---------------------------------------------------------------------------
// CardUpdate
// ---------------------------------------------------------------------------

/// Names the single cell a notification is about.
///
/// Notifications carry `Option<CardUpdate>`: `Some` means "this cell
/// changed", `None` means only the counters or the status changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CardUpdate {
    pub position: Position,
}

impl CardUpdate {
    pub fn new(position: Position) -> Self {
        Self { position }
    }
}

// ---------------------------------------------------------------------------
// GameState
// ---------------------------------------------------------------------------

/// The client's mirror of the server's game.
///
/// Plain data with no locking; [`GameModel`](crate::GameModel) wraps it
/// for sharing across tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    board: Board,
    reveal_count: u64,
    move_count: u32,
    match_count: u32,
    status: GameStatus,
    error_message: Option<String>,
}

impl GameState {
    /// Creates a fresh game on a `dimension × dimension` board.
    pub fn new(dimension: usize) -> Result<Self, ProtocolError> {
        Ok(Self {
            board: Board::new(dimension)?,
            reveal_count: 0,
            move_count: 0,
            match_count: 0,
            status: GameStatus::InProgress,
            error_message: None,
        })
    }

    /// Applies one server event.
    ///
    /// On success, returns the notifications to deliver, in order. On
    /// error, nothing has been modified: every precondition is checked
    /// before the first write.
    pub fn apply(
        &mut self,
        event: &ServerEvent,
    ) -> Result<Vec<Option<CardUpdate>>, ProtocolError> {
        if self.status.is_terminal() {
            return Err(ProtocolError::GameOver(self.status));
        }

        match event {
            ServerEvent::BoardSize { dimension } => {
                Err(ProtocolError::UnexpectedBoardSize(*dimension))
            }

            ServerEvent::CardRevealed { position, symbol } => {
                self.reveal(*position, symbol)
            }

            ServerEvent::Matched { first, second } => {
                self.check_turn(*first, *second)?;
                for position in [*first, *second] {
                    if let Cell::Revealed { matched, .. } =
                        self.board.get_mut(position)?
                    {
                        *matched = true;
                    }
                }
                self.match_count += 1;
                self.move_count += 1;
                Ok(vec![
                    None,
                    Some(CardUpdate::new(*first)),
                    Some(CardUpdate::new(*second)),
                ])
            }

            ServerEvent::Mismatched { first, second } => {
                self.check_turn(*first, *second)?;
                *self.board.get_mut(*first)? = Cell::Hidden;
                *self.board.get_mut(*second)? = Cell::Hidden;
                self.move_count += 1;
                Ok(vec![
                    Some(CardUpdate::new(*first)),
                    Some(CardUpdate::new(*second)),
                ])
            }

            ServerEvent::GameWon => {
                self.status = GameStatus::Won;
                Ok(vec![None])
            }

            ServerEvent::GameLost => {
                self.status = GameStatus::Lost;
                Ok(vec![None])
            }

            ServerEvent::Error { message } => {
                self.status = GameStatus::Error;
                self.error_message = Some(message.clone());
                Ok(vec![None])
            }
        }
    }

    /// Moves to `Error` with the given reason.
    ///
    /// Returns `false` (and changes nothing) if the game had already
    /// reached a terminal status, so the transition happens at most once.
    pub fn fail(&mut self, reason: impl Into<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = GameStatus::Error;
        self.error_message = Some(reason.into());
        true
    }

    fn reveal(
        &mut self,
        position: Position,
        symbol: &Symbol,
    ) -> Result<Vec<Option<CardUpdate>>, ProtocolError> {
        let cell = self.board.get_mut(position)?;
        if !cell.is_hidden() {
            return Err(ProtocolError::AlreadyRevealed(position));
        }
        *cell = Cell::Revealed {
            symbol: symbol.clone(),
            matched: false,
        };
        self.reveal_count += 1;
        Ok(vec![Some(CardUpdate::new(position))])
    }

    /// Both cards of a resolved turn must be distinct, face up, and still in play.
    fn check_turn(
        &self,
        first: Position,
        second: Position,
    ) -> Result<(), ProtocolError> {
        if first == second {
            return Err(ProtocolError::SamePosition(first));
        }
        for position in [first, second] {
            let cell = self.board.get(position)?;
            if cell.is_hidden() {
                return Err(ProtocolError::NotRevealed(position));
            }
            if cell.is_matched() {
                return Err(ProtocolError::AlreadyMatched(position));
            }
        }
        Ok(())
    }

    // -- Queries ----------------------------------------------------------

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn dimension(&self) -> usize {
        self.board.dimension()
    }

    pub fn cell(&self, position: Position) -> Result<&Cell, ProtocolError> {
        self.board.get(position)
    }

    pub fn is_hidden(&self, position: Position) -> Result<bool, ProtocolError> {
        Ok(self.board.get(position)?.is_hidden())
    }

    pub fn is_matched(&self, position: Position) -> Result<bool, ProtocolError> {
        Ok(self.board.get(position)?.is_matched())
    }

    pub fn symbol_at(
        &self,
        position: Position,
    ) -> Result<Option<&Symbol>, ProtocolError> {
        Ok(self.board.get(position)?.symbol())
    }

    /// `REVEALED_CARD` events applied so far. Never decreases, so a
    /// caller can remember it and later tell whether a reveal came in.
    pub fn reveal_count(&self) -> u64 {
        self.reveal_count
    }

    /// Completed turns (one per `MATCH` or `MISMATCH`).
    pub fn move_count(&self) -> u32 {
        self.move_count
    }

    /// Pairs found.
    pub fn match_count(&self) -> u32 {
        self.match_count
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    /// Why the game ended in `Error`, if it did.
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// A serializable copy of everything a front end needs to draw the game.
    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            dimension: self.dimension(),
            cells: self.board.rows().map(<[Cell]>::to_vec).collect(),
            move_count: self.move_count,
            match_count: self.match_count,
            status: self.status,
            error_message: self.error_message.clone(),
        }
    }
}

/// Point-in-time copy of a [`GameState`], taken under one lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardSnapshot {
    pub dimension: usize,
    /// Row-major: `cells[row][col]`.
    pub cells: Vec<Vec<Cell>>,
    pub move_count: u32,
    pub match_count: u32,
    pub status: GameStatus,
    pub error_message: Option<String>,
}

// =========================================================================
// Tests
// =========================================================================
