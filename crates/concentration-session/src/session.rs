//! The session handle: open, handshake, send, close.

use std::sync::{Arc, Mutex, PoisonError};

use concentration_board::{GameModel, ObserverRegistry};
use concentration_protocol::{ClientCommand, LineCodec, ServerEvent};
use concentration_transport::{Connection, ConnectionId, TcpConnection, TransportError};
use tokio::sync::watch;
use tokio::time::timeout;

use crate::{SessionConfig, SessionError, receiver};

// ---------------------------------------------------------------------------
// Shared connection state
// ---------------------------------------------------------------------------

/// Why the connection is being closed from our side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CloseReason {
    /// `close()` was called or the last handle was dropped.
    Requested,
    /// A send failed; the receive loop turns this into the `Error` status.
    Fault(String),
}

/// State shared between the session handles and the receive loop.
pub(crate) struct Shared<C> {
    pub(crate) conn: C,
    close_reason: Mutex<Option<CloseReason>>,
}

impl<C: Connection> Shared<C> {
    /// Records why we are closing. The first reason wins.
    pub(crate) fn record_close(&self, reason: CloseReason) {
        let mut slot = self
            .close_reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(reason);
        }
    }

    pub(crate) fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

struct Inner<C: Connection> {
    shared: Arc<Shared<C>>,
    model: GameModel,
    codec: LineCodec,
    finished: watch::Receiver<bool>,
}

/// Drop guard: when the last handle goes away, the connection is closed
/// so the receive loop does not outlive everyone who could observe it.
///
/// `Drop` is synchronous, so the async close runs on a spawned task.
impl<C: Connection> Drop for Inner<C> {
    fn drop(&mut self) {
        if *self.finished.borrow() || self.shared.conn.is_closed() {
            return;
        }
        self.shared.record_close(CloseReason::Requested);
        let shared = Arc::clone(&self.shared);
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                let _ = shared.conn.close().await;
            });
        }
    }
}

/// One connection to the game server, for one game.
///
/// Cloning gives another handle to the same session. Any handle may
/// send or close, from any task, while the receive loop is running.
///
/// ```rust,no_run
/// use concentration_board::ObserverRegistry;
/// use concentration_protocol::{ClientCommand, Position};
/// use concentration_session::{Session, SessionConfig};
///
/// # async fn run() -> Result<(), concentration_session::SessionError> {
/// let session = Session::open(
///     "127.0.0.1",
///     4000,
///     &SessionConfig::default(),
///     ObserverRegistry::new(),
/// )
/// .await?;
/// session
///     .send(&ClientCommand::Reveal { position: Position::new(0, 0) })
///     .await?;
/// session.closed().await;
/// # Ok(())
/// # }
/// ```
pub struct Session<C: Connection = TcpConnection> {
    inner: Arc<Inner<C>>,
}

impl<C: Connection> Clone for Session<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Session<TcpConnection> {
    /// Connects to `host:port` over TCP and performs the handshake.
    ///
    /// Nothing is retried: a refused or timed-out connect is returned as
    /// is, and the caller decides what to tell the user.
    pub async fn open(
        host: &str,
        port: u16,
        config: &SessionConfig,
        observers: ObserverRegistry,
    ) -> Result<Self, SessionError> {
        let addr = format!("{host}:{port}");
        tracing::debug!(%addr, "connecting to game server");

        let conn = match timeout(
            config.connect_timeout,
            TcpConnection::connect(host, port),
        )
        .await
        {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => return Err(SessionError::Connect(e)),
            Err(_) => {
                return Err(SessionError::ConnectTimeout {
                    addr,
                    timeout: config.connect_timeout,
                });
            }
        };

        tracing::info!(%addr, id = %conn.id(), "connected to game server");
        Self::start(conn, config, observers).await
    }
}

impl<C: Connection> Session<C> {
    /// Runs the handshake over an already established connection and
    /// starts the receive loop.
    ///
    /// On any handshake failure the connection is closed before the error
    /// is returned.
    pub async fn start(
        conn: C,
        config: &SessionConfig,
        observers: ObserverRegistry,
    ) -> Result<Self, SessionError> {
        let id = conn.id();

        let dimension = match perform_handshake(&conn, config).await {
            Ok(dimension) => dimension,
            Err(e) => {
                tracing::warn!(%id, error = %e, "handshake failed");
                let _ = conn.close().await;
                return Err(e);
            }
        };

        let (model, writer) = match GameModel::new(dimension, observers) {
            Ok(pair) => pair,
            Err(e) => {
                let _ = conn.close().await;
                return Err(SessionError::Handshake(e.to_string()));
            }
        };
        tracing::info!(%id, dimension, "session ready");

        let shared = Arc::new(Shared {
            conn,
            close_reason: Mutex::new(None),
        });
        let codec = LineCodec::with_dimension(dimension);
        let (finished_tx, finished_rx) = watch::channel(false);

        tokio::spawn(receiver::run(
            Arc::clone(&shared),
            codec,
            writer,
            finished_tx,
        ));

        Ok(Self {
            inner: Arc::new(Inner {
                shared,
                model,
                codec,
                finished: finished_rx,
            }),
        })
    }

    /// Encodes and writes one command.
    ///
    /// A write failure is fatal: the connection is closed and the receive
    /// loop moves the game to `Error` with the failure as its message.
    pub async fn send(&self, command: &ClientCommand) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }

        let frame = self.inner.codec.encode(command);
        let shared = &self.inner.shared;
        match shared.conn.send_line(&frame).await {
            Ok(()) => {
                tracing::debug!(id = %shared.conn.id(), %command, "command sent");
                Ok(())
            }
            Err(TransportError::Closed) => Err(SessionError::Closed),
            Err(e) => {
                tracing::warn!(id = %shared.conn.id(), error = %e, "send failed");
                shared.record_close(CloseReason::Fault(e.to_string()));
                let _ = shared.conn.close().await;
                Err(SessionError::Send(e))
            }
        }
    }

    /// Closes the session.
    ///
    /// Safe to call any number of times, from any task, including while
    /// the receive loop is blocked in a read. The game status is left as
    /// it is; use [`closed`](Self::closed) to wait for the loop to exit.
    pub async fn close(&self) {
        let shared = &self.inner.shared;
        shared.record_close(CloseReason::Requested);
        if let Err(e) = shared.conn.close().await {
            tracing::debug!(id = %shared.conn.id(), error = %e, "error while closing");
        }
    }

    /// Resolves once the receive loop has exited, for whatever reason.
    pub async fn closed(&self) {
        let mut finished = self.inner.finished.clone();
        // An error means the sender is gone, and the loop drops it last.
        let _ = finished.wait_for(|done| *done).await;
    }

    /// Whether the session can no longer send.
    pub fn is_closed(&self) -> bool {
        self.inner.shared.conn.is_closed() || *self.inner.finished.borrow()
    }

    /// Read handle to the game this session is playing.
    pub fn model(&self) -> &GameModel {
        &self.inner.model
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.inner.shared.conn.id()
    }
}

impl<C: Connection> std::fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.connection_id())
            .field("closed", &self.is_closed())
            .field("model", &self.inner.model)
            .finish()
    }
}

/// Waits for the first frame and checks that it is `BOARD_DIM n`.
async fn perform_handshake<C: Connection>(
    conn: &C,
    config: &SessionConfig,
) -> Result<usize, SessionError> {
    let frame = match timeout(config.handshake_timeout, conn.recv_line()).await {
        Ok(Ok(Some(frame))) => frame,
        Ok(Ok(None)) => {
            return Err(SessionError::Handshake(
                "connection closed before BOARD_DIM".into(),
            ));
        }
        Ok(Err(e)) => return Err(SessionError::HandshakeReceive(e)),
        Err(_) => {
            return Err(SessionError::HandshakeTimeout(config.handshake_timeout));
        }
    };

    match LineCodec::new().decode(&frame)? {
        ServerEvent::BoardSize { dimension } => Ok(dimension),
        ServerEvent::Error { message } => Err(SessionError::Handshake(format!(
            "server reported an error: {message}"
        ))),
        other => Err(SessionError::Handshake(format!(
            "expected BOARD_DIM, got {}",
            other.record_name()
        ))),
    }
}
