//! Board state for the Concentration client.
//!
//! This crate is the client's mirror of the server's game: the grid of
//! cards, the move and match counters, and whether the game is still
//! running. It is driven entirely by [`ServerEvent`]s; nothing in here
//! touches the network.
//!
//! # Key types
//!
//! - [`GameState`]: the state machine itself (plain data, `apply` an event)
//! - [`GameModel`] / [`ModelWriter`]: shared read handle and sole writer
//! - [`ObserverRegistry`]: ordered change notification
//! - [`GameStatus`], [`Cell`], [`CardUpdate`]: what observers read
//!
//! # How it fits in the stack
//!
//! ```text
//! Controller / front end (above)  ← reads GameModel, subscribes observers
//!     ↕
//! Board layer (this crate)  ← validates and applies events, notifies
//!     ↕
//! Session layer (beside)  ← owns the ModelWriter, feeds it decoded events
//! ```
//!
//! [`ServerEvent`]: concentration_protocol::ServerEvent

mod board;
mod error;
mod model;
mod observer;
mod state;

pub use board::{Board, Cell};
pub use error::ProtocolError;
pub use model::{GameModel, ModelWriter};
pub use observer::{Observer, ObserverId, ObserverRegistry};
pub use state::{BoardSnapshot, CardUpdate, GameState, GameStatus};
