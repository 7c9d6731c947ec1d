use std::time::Duration;

/// Timeouts applied while a session is being set up.
///
/// Once the handshake is done nothing is timed: the receive loop waits
/// for the server as long as the connection stays open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Upper bound on establishing the TCP connection.
    ///
    /// Default: 5 seconds.
    pub connect_timeout: Duration,

    /// Upper bound on waiting for the server's `BOARD_DIM` frame.
    ///
    /// Default: 5 seconds.
    pub handshake_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            handshake_timeout: Duration::from_secs(5),
        }
    }
}
