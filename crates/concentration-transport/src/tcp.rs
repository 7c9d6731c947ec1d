//! Newline-framed TCP transport using `tokio::net::TcpStream`.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, watch};

use crate::{Connection, ConnectionId, TransportError};

/// Longest frame accepted from the peer, excluding the newline.
///
/// The longest legal record is a few dozen bytes; anything near this
/// limit is a broken or hostile server, not a real message.
pub const MAX_FRAME_LEN: usize = 4096;

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// A TCP connection split into independently locked halves.
///
/// Reads and writes never contend: the receive loop holds the read half
/// while callers send on the write half. Closing flips a `watch` flag
/// that any pending [`recv_line`](Connection::recv_line) is selecting on,
/// so a blocked read returns `Ok(None)` immediately.
pub struct TcpConnection {
    id: ConnectionId,
    peer: SocketAddr,
    reader: Mutex<BufReader<OwnedReadHalf>>,
    writer: Mutex<OwnedWriteHalf>,
    closed: watch::Sender<bool>,
}

impl TcpConnection {
    /// Connects to `host:port`.
    ///
    /// No timeout is applied here; wrap the call in
    /// `tokio::time::timeout` to bound it.
    pub async fn connect(host: &str, port: u16) -> Result<Self, TransportError> {
        let stream = TcpStream::connect((host, port)).await.map_err(|source| {
            TransportError::Connect {
                addr: format!("{host}:{port}"),
                source,
            }
        })?;
        Self::from_stream(stream)
    }

    /// Wraps an already connected stream.
    pub fn from_stream(stream: TcpStream) -> Result<Self, TransportError> {
        let peer = stream.peer_addr().map_err(|source| TransportError::Connect {
            addr: "<unknown>".into(),
            source,
        })?;
        // Frames are tiny and latency-sensitive.
        let _ = stream.set_nodelay(true);

        let (read_half, write_half) = stream.into_split();
        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        let (closed, _) = watch::channel(false);
        tracing::debug!(%id, %peer, "TCP connection established");

        Ok(Self {
            id,
            peer,
            reader: Mutex::new(BufReader::new(read_half)),
            writer: Mutex::new(write_half),
            closed,
        })
    }

    /// The address of the remote peer.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

/// Resolves once the close flag is set (or its sender is gone).
async fn wait_closed(mut closed: watch::Receiver<bool>) {
    loop {
        if *closed.borrow_and_update() {
            return;
        }
        if closed.changed().await.is_err() {
            return;
        }
    }
}

impl Connection for TcpConnection {
    async fn send_line(&self, line: &str) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let mut frame = String::with_capacity(line.len() + 1);
        frame.push_str(line);
        if !frame.ends_with('\n') {
            frame.push('\n');
        }

        let mut writer = self.writer.lock().await;
        writer
            .write_all(frame.as_bytes())
            .await
            .map_err(TransportError::SendFailed)?;
        writer.flush().await.map_err(TransportError::SendFailed)?;
        tracing::trace!(id = %self.id, frame = frame.trim_end(), "frame sent");
        Ok(())
    }

    async fn recv_line(&self) -> Result<Option<String>, TransportError> {
        let closed = self.closed.subscribe();
        if *closed.borrow() {
            return Ok(None);
        }

        let mut reader = self.reader.lock().await;
        let read = async {
            let mut line = String::new();
            // One byte past the limit tells "too long" apart from "exactly at it".
            let n = (&mut *reader)
                .take(MAX_FRAME_LEN as u64 + 2)
                .read_line(&mut line)
                .await?;
            Ok::<_, io::Error>((n, line))
        };

        tokio::select! {
            biased;

            () = wait_closed(closed) => Ok(None),

            result = read => {
                let (n, mut line) = result.map_err(TransportError::ReceiveFailed)?;
                if n == 0 {
                    return Ok(None);
                }
                if !line.ends_with('\n') {
                    if line.len() > MAX_FRAME_LEN {
                        return Err(TransportError::FrameTooLong {
                            limit: MAX_FRAME_LEN,
                        });
                    }
                    // Stream ended in the middle of a record.
                    return Err(TransportError::ReceiveFailed(
                        io::ErrorKind::UnexpectedEof.into(),
                    ));
                }
                line.pop();
                if line.ends_with('\r') {
                    line.pop();
                }
                if line.len() > MAX_FRAME_LEN {
                    return Err(TransportError::FrameTooLong {
                        limit: MAX_FRAME_LEN,
                    });
                }
                Ok(Some(line))
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.send_replace(true) {
            return Ok(());
        }
        tracing::debug!(id = %self.id, peer = %self.peer, "closing TCP connection");

        let mut writer = self.writer.lock().await;
        match writer.shutdown().await {
            Ok(()) => Ok(()),
            // The peer may already be gone; that is what we wanted anyway.
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(TransportError::SendFailed(e)),
        }
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
