/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The TCP connection could not be established.
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Writing a frame failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Reading a frame failed (I/O error, invalid UTF-8, or truncated frame).
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// The peer sent a line longer than the transport accepts.
    #[error("frame exceeds {limit} bytes")]
    FrameTooLong { limit: usize },

    /// The connection was closed locally.
    #[error("connection closed")]
    Closed,
}
