//! Transport abstraction layer for the Concentration client.
//!
//! Provides the [`Connection`] trait, a bidirectional stream of text
//! frames, and [`TcpConnection`], its newline-framed TCP implementation.
//!
//! The one non-obvious requirement on a connection is that
//! [`Connection::close`] must be callable from a different task than the
//! one blocked in [`Connection::recv_line`], and must wake that task up.
//! That is how the session's receive loop is cancelled.

mod error;
mod tcp;

pub use error::TransportError;
pub use tcp::{MAX_FRAME_LEN, TcpConnection};

use std::fmt;
use std::future::Future;

/// Opaque identifier for a connection, used to tell sessions apart in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A single connection that carries newline-terminated text frames.
///
/// The futures are required to be `Send` so that a session can drive a
/// connection from a spawned Tokio task.
pub trait Connection: Send + Sync + 'static {
    /// Writes one frame. A missing trailing newline is added.
    fn send_line(
        &self,
        line: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Reads the next frame, without its line terminator.
    ///
    /// Returns `Ok(None)` when the peer closed the stream cleanly or the
    /// connection was closed locally with [`close`](Self::close).
    fn recv_line(
        &self,
    ) -> impl Future<Output = Result<Option<String>, TransportError>> + Send;

    /// Closes the connection. Calling it again is a no-op.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns `true` once [`close`](Self::close) has been called.
    fn is_closed(&self) -> bool;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
