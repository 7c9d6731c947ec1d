//! The line codec: text records in, typed events out.
//!
//! The wire format is one ASCII record per `\n`-terminated line, fields
//! separated by spaces:
//!
//! ```text
//! BOARD_DIM 4
//! REVEALED_CARD 0 1 A
//! MATCH 0 0 0 1
//! ERROR you broke it
//! ```
//!
//! Framing (finding the newlines) is the transport's job. The codec only
//! ever sees one complete frame at a time and keeps no state between
//! calls except the board dimension it validates positions against.

use std::str::SplitWhitespace;

use crate::types::record;
use crate::{ClientCommand, DecodeError, Position, ServerEvent, Symbol};

/// Largest board side accepted in `BOARD_DIM`.
///
/// A 256x256 board already holds 65536 cards. Anything larger is a broken
/// or hostile server, and trusting it would mean allocating whatever the
/// server asks for.
pub const MAX_DIMENSION: usize = 256;

/// Encodes [`ClientCommand`]s and decodes [`ServerEvent`]s.
///
/// Before the handshake the codec has no dimension and only checks syntax.
/// After it, build one with [`LineCodec::with_dimension`] so that every
/// decoded position is guaranteed to be on the board.
///
/// ```rust
/// use concentration_protocol::{LineCodec, Position, ServerEvent};
///
/// let codec = LineCodec::with_dimension(4);
/// let event = codec.decode("MATCH 0 0 0 1\n").unwrap();
/// assert_eq!(
///     event,
///     ServerEvent::Matched { first: Position::new(0, 0), second: Position::new(0, 1) },
/// );
/// assert!(codec.decode("MATCH 0 0 0 4").is_err());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineCodec {
    dimension: Option<usize>,
}

impl LineCodec {
    /// A codec with no board yet (used for the handshake frame).
    pub const fn new() -> Self {
        Self { dimension: None }
    }

    /// A codec that rejects positions outside a `dimension × dimension` board.
    pub const fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: Some(dimension),
        }
    }

    /// The dimension positions are checked against, if any.
    pub const fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Serializes a command into one newline-terminated frame.
    pub fn encode(&self, command: &ClientCommand) -> String {
        let mut frame = command.to_string();
        frame.push('\n');
        frame
    }

    /// Shorthand for encoding a [`ClientCommand::Reveal`].
    pub fn encode_reveal(&self, position: Position) -> String {
        self.encode(&ClientCommand::Reveal { position })
    }

    /// Parses one frame into a [`ServerEvent`].
    ///
    /// A trailing `\n` or `\r\n` is ignored. Anything else that does not
    /// match the record table exactly is a [`DecodeError`].
    pub fn decode(&self, frame: &str) -> Result<ServerEvent, DecodeError> {
        let line = frame.trim_end_matches(['\n', '\r']);
        let mut fields = line.split_whitespace();
        let name = fields.next().ok_or(DecodeError::EmptyFrame)?;

        let event = match name {
            record::BOARD_DIM => {
                let mut r = Fields::new(record::BOARD_DIM, fields);
                let dimension = r.number("n")?;
                r.finish()?;
                if dimension == 0 {
                    return Err(DecodeError::ZeroDimension);
                }
                if dimension > MAX_DIMENSION {
                    return Err(DecodeError::DimensionTooLarge {
                        dimension,
                        max: MAX_DIMENSION,
                    });
                }
                ServerEvent::BoardSize { dimension }
            }
            record::REVEALED_CARD => {
                let mut r = Fields::new(record::REVEALED_CARD, fields);
                let position = r.position("row", "col")?;
                let token = r.token("symbol")?;
                r.finish()?;
                let symbol = Symbol::new(token).ok_or(
                    DecodeError::MissingField {
                        record: record::REVEALED_CARD,
                        field: "symbol",
                    },
                )?;
                ServerEvent::CardRevealed { position, symbol }
            }
            record::MATCH => {
                let mut r = Fields::new(record::MATCH, fields);
                let first = r.position("row1", "col1")?;
                let second = r.position("row2", "col2")?;
                r.finish()?;
                ServerEvent::Matched { first, second }
            }
            record::MISMATCH => {
                let mut r = Fields::new(record::MISMATCH, fields);
                let first = r.position("row1", "col1")?;
                let second = r.position("row2", "col2")?;
                r.finish()?;
                ServerEvent::Mismatched { first, second }
            }
            record::GAME_WON => {
                Fields::new(record::GAME_WON, fields).finish()?;
                ServerEvent::GameWon
            }
            record::GAME_LOST => {
                Fields::new(record::GAME_LOST, fields).finish()?;
                ServerEvent::GameLost
            }
            record::ERROR => {
                // The message is free text: keep its inner spacing.
                let message = line
                    .trim_start()
                    .strip_prefix(record::ERROR)
                    .unwrap_or_default()
                    .trim();
                ServerEvent::Error {
                    message: message.to_string(),
                }
            }
            other => return Err(DecodeError::UnknownRecord(other.to_string())),
        };

        if let Some(dimension) = self.dimension {
            for position in event.positions() {
                if !position.within(dimension) {
                    return Err(DecodeError::OutOfBounds {
                        record: event.record_name(),
                        position,
                        dimension,
                    });
                }
            }
        }

        Ok(event)
    }
}

/// Cursor over the fields of one record, producing precise errors.
struct Fields<'a> {
    record: &'static str,
    inner: SplitWhitespace<'a>,
}

impl<'a> Fields<'a> {
    fn new(record: &'static str, inner: SplitWhitespace<'a>) -> Self {
        Self { record, inner }
    }

    fn token(&mut self, field: &'static str) -> Result<&'a str, DecodeError> {
        self.inner.next().ok_or(DecodeError::MissingField {
            record: self.record,
            field,
        })
    }

    fn number(&mut self, field: &'static str) -> Result<usize, DecodeError> {
        let value = self.token(field)?;
        let invalid = || DecodeError::InvalidNumber {
            record: self.record,
            field,
            value: value.to_string(),
        };
        // `usize::from_str` accepts a leading `+`; the wire format does not.
        if !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        value.parse().map_err(|_| invalid())
    }

    fn position(
        &mut self,
        row: &'static str,
        col: &'static str,
    ) -> Result<Position, DecodeError> {
        Ok(Position::new(self.number(row)?, self.number(col)?))
    }

    fn finish(mut self) -> Result<(), DecodeError> {
        match self.inner.next() {
            None => Ok(()),
            Some(extra) => Err(DecodeError::TrailingField {
                record: self.record,
                extra: extra.to_string(),
            }),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
