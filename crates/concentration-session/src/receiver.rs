//! The receive loop: one spawned task per session.
//!
//! The loop is the only code that holds the [`ModelWriter`], so every
//! change to the game, including the final move to `Error`, happens
//! here. It runs until one of:
//!
//! - the connection ends (EOF or read error)
//! - a frame fails to decode, or an event contradicts the board
//! - the server sends `ERROR`
//! - the session is closed locally
//!
//! `GAME_WON` and `GAME_LOST` do not stop the loop. The server decides
//! when to hang up; anything it sends after the game ended is logged and
//! ignored.

use std::sync::Arc;

use concentration_board::{GameStatus, ModelWriter};
use concentration_protocol::LineCodec;
use concentration_transport::Connection;
use tokio::sync::watch;

use crate::session::{CloseReason, Shared};

/// How the loop ended.
#[derive(Debug)]
enum Exit {
    /// Closed from our side on purpose; the status is left alone.
    Requested,
    /// The server sent `ERROR`; the status is already `Error`.
    ServerError,
    /// Anything else that ends the session.
    Fault(String),
}

pub(crate) async fn run<C: Connection>(
    shared: Arc<Shared<C>>,
    codec: LineCodec,
    mut writer: ModelWriter,
    finished: watch::Sender<bool>,
) {
    let id = shared.conn.id();
    tracing::debug!(%id, "receive loop started");

    match read_events(&shared, &codec, &mut writer).await {
        Exit::Requested => {
            tracing::info!(%id, "session closed by client");
        }
        Exit::ServerError => {
            tracing::warn!(
                %id,
                server_message = writer.model().error_message().as_deref().unwrap_or(""),
                "server reported an error"
            );
        }
        Exit::Fault(reason) => {
            if writer.fail(reason.as_str()) {
                tracing::warn!(%id, %reason, "session failed");
            } else {
                // Already won or lost; the server just hung up afterwards.
                tracing::debug!(%id, %reason, "connection ended after game over");
            }
        }
    }

    if let Err(e) = shared.conn.close().await {
        tracing::debug!(%id, error = %e, "error while closing");
    }
    finished.send_replace(true);
    tracing::debug!(%id, "receive loop exited");
}

async fn read_events<C: Connection>(
    shared: &Shared<C>,
    codec: &LineCodec,
    writer: &mut ModelWriter,
) -> Exit {
    let id = shared.conn.id();

    loop {
        let frame = match shared.conn.recv_line().await {
            Ok(Some(frame)) => frame,
            Ok(None) => return exit_after_close(shared, "connection closed by server"),
            Err(e) => return exit_after_close(shared, format!("receive failed: {e}")),
        };

        let event = match codec.decode(&frame) {
            Ok(event) => event,
            Err(e) => return Exit::Fault(format!("malformed frame {frame:?}: {e}")),
        };
        tracing::debug!(%id, %event, "event received");

        match writer.apply(&event) {
            Ok(()) => match writer.model().status() {
                GameStatus::Error => return Exit::ServerError,
                GameStatus::InProgress => {}
                status => tracing::info!(%id, %status, "game over"),
            },
            Err(e) if e.is_fatal() => {
                return Exit::Fault(format!("out of sync with server: {e}"));
            }
            Err(e) => {
                tracing::warn!(%id, %event, error = %e, "ignoring event");
            }
        }
    }
}

/// The read side ended. If we closed it ourselves, say why; otherwise the
/// server went away.
fn exit_after_close<C: Connection>(
    shared: &Shared<C>,
    otherwise: impl Into<String>,
) -> Exit {
    match shared.close_reason() {
        Some(CloseReason::Requested) => Exit::Requested,
        Some(CloseReason::Fault(reason)) => Exit::Fault(reason),
        None => Exit::Fault(otherwise.into()),
    }
}
