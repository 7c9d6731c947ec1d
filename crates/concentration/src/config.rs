//! Client configuration.

use std::time::Duration;

use concentration_session::SessionConfig;

/// Where to connect and how long to wait.
///
/// ```
/// use std::time::Duration;
/// use concentration::ClientConfig;
///
/// let config = ClientConfig::new("127.0.0.1", 4000)
///     .with_handshake_timeout(Duration::from_secs(10));
/// assert_eq!(config.addr(), "127.0.0.1:4000");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub session: SessionConfig,
}

impl ClientConfig {
    /// A config for `host:port` with default timeouts.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            session: SessionConfig::default(),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.session.connect_timeout = timeout;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.session.handshake_timeout = timeout;
        self
    }

    /// Checks the config before any connection attempt.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        if self.session.connect_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("connect_timeout"));
        }
        if self.session.handshake_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("handshake_timeout"));
        }
        Ok(())
    }

    /// `host:port`, as used in log lines and error messages.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A [`ClientConfig`] that can't be used to connect.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("host must not be empty")]
    EmptyHost,

    #[error("port must not be 0")]
    ZeroPort,

    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),
}
