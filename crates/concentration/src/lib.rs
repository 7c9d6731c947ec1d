//! # Concentration
//!
//! Network client for the Concentration memory-matching game.
//!
//! The server holds the deck; the client mirrors the board, turns the
//! player's clicks into `REVEAL` requests, and tells any number of
//! observers what changed. A front end only needs a [`GameController`]
//! and an observer.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use concentration::prelude::*;
//!
//! # async fn run() -> Result<(), ConcentrationError> {
//! let mut game = GameController::new(ClientConfig::new("127.0.0.1", 4000));
//! game.subscribe_fn(|model, card| {
//!     if let Some(card) = card {
//!         println!("{} changed, status {}", card.position, model.status());
//!     }
//! });
//!
//! game.connect().await?;
//! game.reveal_card(0, 0).await?;
//! game.closed().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Layers
//!
//! | Crate | Role |
//! |---|---|
//! | `concentration-transport` | line-framed TCP |
//! | `concentration-protocol` | wire records and codec |
//! | `concentration-board` | board state, observers |
//! | `concentration-session` | handshake, receive loop |
//! | `concentration` (this crate) | controller, config, unified error |

mod config;
mod controller;
mod error;

pub use config::{ClientConfig, ConfigError};
pub use controller::{GameController, RejectedMove};
pub use error::ConcentrationError;

pub use concentration_board as board;
pub use concentration_protocol as protocol;
pub use concentration_session as session;
pub use concentration_transport as transport;

/// Everything a front end usually needs.
pub mod prelude {
    pub use crate::{ClientConfig, ConcentrationError, ConfigError, GameController, RejectedMove};
    pub use concentration_board::{
        BoardSnapshot, CardUpdate, Cell, GameModel, GameStatus, Observer, ObserverId,
        ObserverRegistry,
    };
    pub use concentration_protocol::{Position, Symbol};
    pub use concentration_session::SessionConfig;
}
