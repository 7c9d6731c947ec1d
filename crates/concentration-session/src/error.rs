//! Error types for the session layer.

use std::time::Duration;

use concentration_protocol::DecodeError;
use concentration_transport::TransportError;

/// Errors returned by [`Session`](crate::Session) operations.
///
/// Everything here is fatal for the session it came from. Failures that
/// happen inside the receive loop are not returned to anyone; they move
/// the game to `Error` and are visible through the model instead.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The TCP connection could not be established.
    #[error("connect failed: {0}")]
    Connect(#[source] TransportError),

    /// The TCP connection was not established within `connect_timeout`.
    #[error("connect to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    /// The server did not open with a usable `BOARD_DIM` frame.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The first frame arrived but could not be parsed.
    #[error("handshake failed: {0}")]
    HandshakeDecode(#[from] DecodeError),

    /// Reading the first frame failed at the transport level.
    #[error("handshake failed: {0}")]
    HandshakeReceive(#[source] TransportError),

    /// No frame arrived within `handshake_timeout`.
    #[error("handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    /// Writing a command failed. The session has been closed.
    #[error("send failed: {0}")]
    Send(#[source] TransportError),

    /// The session is already closed.
    #[error("session closed")]
    Closed,
}

impl SessionError {
    /// Whether the error happened before the session became ready.
    pub fn is_handshake(&self) -> bool {
        matches!(
            self,
            Self::Handshake(_)
                | Self::HandshakeDecode(_)
                | Self::HandshakeReceive(_)
                | Self::HandshakeTimeout(_)
        )
    }
}
