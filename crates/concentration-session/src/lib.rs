//! Connection session for the Concentration client.
//!
//! A session owns one connection to the game server for the lifetime of
//! one game:
//!
//! 1. **Handshake**: the first frame must be `BOARD_DIM n`; only then is
//!    the board created ([`Session::open`], [`Session::start`])
//! 2. **Receive loop**: a spawned task decodes every following frame and
//!    applies it to the board through the single [`ModelWriter`]
//! 3. **Sends and close**: [`Session::send`] writes one command,
//!    [`Session::close`] stops everything from any task
//!
//! Connection loss is terminal. There is no reconnect.
//!
//! # How it fits in the stack
//!
//! ```text
//! Controller (above)  ← validates moves, calls send/close
//!     ↕
//! Session layer (this crate)  ← handshake, receive loop, fault handling
//!     ↕
//! Transport + Protocol + Board (below)  ← lines, records, game state
//! ```
//!
//! [`ModelWriter`]: concentration_board::ModelWriter

mod config;
mod error;
mod receiver;
mod session;

pub use config::SessionConfig;
pub use error::SessionError;
pub use session::Session;
