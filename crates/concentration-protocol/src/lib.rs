//! Wire protocol for the Concentration client.
//!
//! This crate defines the "language" the client and the game server speak:
//!
//! - **Types** ([`ServerEvent`], [`ClientCommand`], [`Position`], [`Symbol`]):
//!   the messages that travel on the wire.
//! - **Codec** ([`LineCodec`]): how those messages are converted to and
//!   from newline-terminated text records.
//! - **Errors** ([`DecodeError`]): what can be wrong with an inbound frame.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw lines) and board state
//! (the game mirror). It doesn't know about sockets or observers; it only
//! knows how to read and write records.
//!
//! ```text
//! Transport (lines) → Protocol (ServerEvent) → Board (GameState)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{LineCodec, MAX_DIMENSION};
pub use error::DecodeError;
pub use types::{ClientCommand, Position, ServerEvent, Symbol, record};
