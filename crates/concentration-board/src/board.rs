//! The grid itself: cells and bounds-checked access.

use concentration_protocol::{MAX_DIMENSION, Position, Symbol};
use serde::Serialize;

use crate::ProtocolError;

/// One card on the board.
///
/// ```text
///   Hidden ──(REVEALED_CARD)──→ Revealed { matched: false }
///     ↑                               │           │
///     └──────────(MISMATCH)───────────┘        (MATCH)
///                                                 ▼
///                                     Revealed { matched: true }
/// ```
///
/// A matched card never goes back to `Hidden`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Cell {
    /// Face down.
    Hidden,
    /// Face up, showing `symbol`. `matched` is set once the server
    /// confirms the card as part of a pair.
    Revealed { symbol: Symbol, matched: bool },
}

impl Cell {
    /// Returns `true` if the card is face down.
    pub fn is_hidden(&self) -> bool {
        matches!(self, Self::Hidden)
    }

    /// Returns `true` if the card has been removed from play as half of a pair.
    pub fn is_matched(&self) -> bool {
        matches!(self, Self::Revealed { matched: true, .. })
    }

    /// The face-up symbol, if any.
    pub fn symbol(&self) -> Option<&Symbol> {
        match self {
            Self::Hidden => None,
            Self::Revealed { symbol, .. } => Some(symbol),
        }
    }
}

/// A square grid of [`Cell`]s, `dimension × dimension`, stored row-major.
///
/// The dimension is fixed at construction; there is no way to resize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    dimension: usize,
    cells: Vec<Cell>,
}

impl Board {
    /// Creates a board with every card face down.
    ///
    /// `dimension` must be between 1 and [`MAX_DIMENSION`].
    pub fn new(dimension: usize) -> Result<Self, ProtocolError> {
        if dimension == 0 {
            return Err(ProtocolError::ZeroDimension);
        }
        let too_large = ProtocolError::DimensionTooLarge {
            dimension,
            max: MAX_DIMENSION,
        };
        if dimension > MAX_DIMENSION {
            return Err(too_large);
        }
        let len = dimension.checked_mul(dimension).ok_or(too_large)?;
        Ok(Self {
            dimension,
            cells: vec![Cell::Hidden; len],
        })
    }

    /// The side length of the board.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Returns the cell at `position`.
    pub fn get(&self, position: Position) -> Result<&Cell, ProtocolError> {
        let index = self.index(position)?;
        Ok(&self.cells[index])
    }

    pub(crate) fn get_mut(
        &mut self,
        position: Position,
    ) -> Result<&mut Cell, ProtocolError> {
        let index = self.index(position)?;
        Ok(&mut self.cells[index])
    }

    /// Iterates the board one row at a time.
    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.cells.chunks(self.dimension)
    }

    /// Number of cards currently face down.
    pub fn hidden_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_hidden()).count()
    }

    fn index(&self, position: Position) -> Result<usize, ProtocolError> {
        if !position.within(self.dimension) {
            return Err(ProtocolError::OutOfBounds {
                position,
                dimension: self.dimension,
            });
        }
        Ok(position.row * self.dimension + position.col)
    }
}
