//! The game controller: the command surface a front end talks to.
//!
//! A controller plays one game. It owns the observer registry from the
//! start, so a front end can subscribe before connecting and receive
//! every notification. Moves are checked against the local board before
//! anything goes on the wire; a move the server would refuse anyway is
//! returned as a [`RejectedMove`] and never sent.
//!
//! At most one reveal is outstanding at a time. A second request is
//! refused until the server has answered the first with `REVEALED_CARD`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use concentration_board::{
    CardUpdate, Cell, GameModel, GameState, GameStatus, Observer, ObserverId,
    ObserverRegistry, ProtocolError,
};
use concentration_protocol::{ClientCommand, Position};
use concentration_session::{Session, SessionError};

use crate::{ClientConfig, ConcentrationError};

/// Why a move was refused without contacting the server.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectedMove {
    #[error("not connected to a game server")]
    NotConnected,

    #[error("session closed")]
    SessionClosed,

    #[error("game is over ({0})")]
    GameOver(GameStatus),

    #[error("position {position} is outside the {dimension}x{dimension} board")]
    OutOfBounds { position: Position, dimension: usize },

    #[error("card at {0} is already face up")]
    NotHidden(Position),

    #[error("still waiting for the server to reveal {0}")]
    RevealPending(Position),
}

/// A reveal that has been sent but not yet answered.
#[derive(Debug, Clone, Copy)]
struct PendingReveal {
    position: Position,
    /// The model's reveal count when the request went out.
    reveals_before: u64,
}

/// Connects to a server and relays the player's moves.
#[derive(Debug)]
pub struct GameController {
    config: ClientConfig,
    observers: ObserverRegistry,
    session: Option<Session>,
    pending: Mutex<Option<PendingReveal>>,
}

impl GameController {
    /// Creates an unconnected controller with no observers.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            observers: ObserverRegistry::new(),
            session: None,
            pending: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // -- Observers --------------------------------------------------------

    pub fn subscribe(&self, observer: Arc<dyn Observer>) -> ObserverId {
        self.observers.subscribe(observer)
    }

    pub fn subscribe_fn<F>(&self, f: F) -> ObserverId
    where
        F: Fn(&GameModel, Option<CardUpdate>) + Send + Sync + 'static,
    {
        self.observers.subscribe_fn(f)
    }

    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.observers.unsubscribe(id)
    }

    pub fn observers(&self) -> &ObserverRegistry {
        &self.observers
    }

    // -- Lifecycle --------------------------------------------------------

    /// Validates the config, connects, and waits for the handshake.
    ///
    /// A controller connects at most once; connection loss ends the game
    /// for good.
    pub async fn connect(&mut self) -> Result<(), ConcentrationError> {
        if self.session.is_some() {
            return Err(ConcentrationError::AlreadyConnected);
        }
        self.config.validate()?;

        let session = Session::open(
            &self.config.host,
            self.config.port,
            &self.config.session,
            self.observers.clone(),
        )
        .await?;

        tracing::info!(
            addr = %self.config.addr(),
            id = %session.connection_id(),
            dimension = session.model().dimension(),
            "game started"
        );
        self.session = Some(session);
        Ok(())
    }

    /// Asks the server to turn over the card at `(row, col)`.
    ///
    /// The move is checked locally first: the game must be running, the
    /// card must exist and be face down, and no earlier reveal may still
    /// be waiting for its answer. The answer arrives later as a
    /// notification; this returns as soon as the request is written.
    pub async fn reveal_card(&self, row: usize, col: usize) -> Result<(), ConcentrationError> {
        let position = Position::new(row, col);
        let session = self.session.as_ref().ok_or(RejectedMove::NotConnected)?;

        if let Err(reason) = self.claim_reveal(session, position) {
            tracing::debug!(%position, %reason, "move rejected");
            return Err(reason.into());
        }

        match session.send(&ClientCommand::Reveal { position }).await {
            Ok(()) => Ok(()),
            Err(e) => {
                *self.lock_pending() = None;
                match e {
                    // Lost a race with the receive loop shutting down.
                    SessionError::Closed => Err(RejectedMove::SessionClosed.into()),
                    e => Err(e.into()),
                }
            }
        }
    }

    /// Closes the session. Does nothing if the controller never connected.
    pub async fn close(&self) -> Result<(), ConcentrationError> {
        if let Some(session) = &self.session {
            session.close().await;
        }
        Ok(())
    }

    /// Resolves once the session has ended. Returns immediately if the
    /// controller never connected.
    pub async fn closed(&self) {
        if let Some(session) = &self.session {
            session.closed().await;
        }
    }

    // -- Queries ----------------------------------------------------------

    pub fn is_connected(&self) -> bool {
        self.session.as_ref().is_some_and(|s| !s.is_closed())
    }

    /// The game model, once connected.
    pub fn model(&self) -> Option<&GameModel> {
        self.session.as_ref().map(Session::model)
    }

    /// The game status, once connected.
    pub fn status(&self) -> Option<GameStatus> {
        self.model().map(GameModel::status)
    }
}

impl GameController {
    /// Validates a reveal and records it as the outstanding one.
    ///
    /// The pending slot and the board are checked together, so a reveal
    /// that lands between the two checks cannot be missed.
    fn claim_reveal(&self, session: &Session, position: Position) -> Result<(), RejectedMove> {
        let mut pending = self.lock_pending();
        session.model().read(|state| {
            check_move(session, state, position)?;
            if let Some(waiting) = *pending {
                if state.reveal_count() == waiting.reveals_before {
                    return Err(RejectedMove::RevealPending(waiting.position));
                }
            }
            *pending = Some(PendingReveal {
                position,
                reveals_before: state.reveal_count(),
            });
            Ok(())
        })
    }

    fn lock_pending(&self) -> MutexGuard<'_, Option<PendingReveal>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Checks a reveal against the board and the session state.
fn check_move(
    session: &Session,
    state: &GameState,
    position: Position,
) -> Result<(), RejectedMove> {
    let status = state.status();
    if status.is_terminal() {
        return Err(RejectedMove::GameOver(status));
    }
    if session.is_closed() {
        return Err(RejectedMove::SessionClosed);
    }
    match state.cell(position) {
        Ok(Cell::Hidden) => Ok(()),
        Ok(Cell::Revealed { .. }) => Err(RejectedMove::NotHidden(position)),
        Err(ProtocolError::OutOfBounds { dimension, .. }) => {
            Err(RejectedMove::OutOfBounds { position, dimension })
        }
        Err(_) => Err(RejectedMove::OutOfBounds {
            position,
            dimension: state.dimension(),
        }),
    }
}
