//! Unified error type for the Concentration client.

use concentration_board::ProtocolError;
use concentration_protocol::DecodeError;
use concentration_session::SessionError;
use concentration_transport::TransportError;

use crate::{ConfigError, RejectedMove};

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `concentration` crate you deal with this single error
/// type instead of importing errors from each layer. The `#[from]`
/// attribute on each variant generates the `From` impls, so `?` converts
/// layer errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ConcentrationError {
    /// A malformed frame from the server.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A transport-level error (connect, send, receive).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An event that contradicts the board, or an out-of-bounds query.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (connect, handshake, send, closed).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A move refused locally; nothing was sent.
    #[error(transparent)]
    Rejected(#[from] RejectedMove),

    /// An unusable client configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// `connect` was called on a controller that already opened a session.
    #[error("already connected")]
    AlreadyConnected,
}

impl ConcentrationError {
    /// Whether the caller can simply try another move.
    ///
    /// Everything except a rejected move means the game cannot go on.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}
