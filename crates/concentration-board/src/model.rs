//! Shared, lock-protected access to the game state.
//!
//! The state is split into two capabilities:
//!
//! - [`GameModel`]: cloneable, read-only. Front ends, the controller,
//!   and observers all hold one of these.
//! - [`ModelWriter`]: the only way to mutate. Not `Clone`; the session's
//!   receive loop owns the single instance.
//!
//! Both point at the same `Mutex<GameState>`. The lock is held only while
//! a query runs or one event is applied, and always released before
//! observers are called, so an observer may query the model freely.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use concentration_protocol::{Position, ServerEvent, Symbol};

use crate::{
    BoardSnapshot, CardUpdate, GameState, GameStatus, Observer, ObserverId,
    ObserverRegistry, ProtocolError,
};

struct Shared {
    state: Mutex<GameState>,
    observers: ObserverRegistry,
}

/// Read-only handle to the game.
///
/// Every query takes the lock independently. To read several values
/// consistently (e.g. validate a move), use [`read`](Self::read) or
/// [`snapshot`](Self::snapshot).
#[derive(Clone)]
pub struct GameModel {
    shared: Arc<Shared>,
}

impl GameModel {
    /// Creates the model for a freshly established `dimension × dimension`
    /// board, returning the read handle and the single writer.
    ///
    /// `observers` may already contain subscribers; they will receive
    /// every notification from the first event on.
    pub fn new(
        dimension: usize,
        observers: ObserverRegistry,
    ) -> Result<(Self, ModelWriter), ProtocolError> {
        let model = Self {
            shared: Arc::new(Shared {
                state: Mutex::new(GameState::new(dimension)?),
                observers,
            }),
        };
        let writer = ModelWriter {
            model: model.clone(),
        };
        Ok((model, writer))
    }

    /// Runs `f` with the state locked.
    ///
    /// Keep `f` short and never block inside it; the receive loop waits
    /// on the same lock.
    pub fn read<R>(&self, f: impl FnOnce(&GameState) -> R) -> R {
        f(&self.lock())
    }

    pub fn dimension(&self) -> usize {
        self.lock().dimension()
    }

    pub fn is_hidden(&self, position: Position) -> Result<bool, ProtocolError> {
        self.lock().is_hidden(position)
    }

    pub fn is_matched(&self, position: Position) -> Result<bool, ProtocolError> {
        self.lock().is_matched(position)
    }

    /// The symbol showing at `position`, or `None` if the card is face down.
    pub fn symbol_at(
        &self,
        position: Position,
    ) -> Result<Option<Symbol>, ProtocolError> {
        Ok(self.lock().symbol_at(position)?.cloned())
    }

    pub fn reveal_count(&self) -> u64 {
        self.lock().reveal_count()
    }

    pub fn move_count(&self) -> u32 {
        self.lock().move_count()
    }

    pub fn match_count(&self) -> u32 {
        self.lock().match_count()
    }

    pub fn status(&self) -> GameStatus {
        self.lock().status()
    }

    pub fn error_message(&self) -> Option<String> {
        self.lock().error_message().map(str::to_owned)
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        self.lock().snapshot()
    }

    // -- Observers --------------------------------------------------------

    pub fn subscribe(&self, observer: Arc<dyn Observer>) -> ObserverId {
        self.shared.observers.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.shared.observers.unsubscribe(id)
    }

    pub fn observers(&self) -> &ObserverRegistry {
        &self.shared.observers
    }

    fn lock(&self) -> MutexGuard<'_, GameState> {
        // `GameState::apply` checks before it writes, so even a state
        // recovered from a poisoned lock is internally consistent.
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, card: Option<CardUpdate>) {
        self.shared.observers.notify_all(self, card);
    }
}

impl std::fmt::Debug for GameModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("GameModel")
            .field("dimension", &state.dimension())
            .field("status", &state.status())
            .field("move_count", &state.move_count())
            .field("match_count", &state.match_count())
            .finish_non_exhaustive()
    }
}

/// Exclusive write access to a [`GameModel`].
pub struct ModelWriter {
    model: GameModel,
}

impl ModelWriter {
    /// Applies a server event, then notifies observers.
    ///
    /// The lock is released between the mutation and the first
    /// notification, so observers always see the post-event counters.
    /// On error nothing changed and nobody is notified.
    pub fn apply(&mut self, event: &ServerEvent) -> Result<(), ProtocolError> {
        let updates = {
            let mut state = self.model.lock();
            state.apply(event)?
        };
        for card in updates {
            self.model.notify(card);
        }
        Ok(())
    }

    /// Moves the game to `Error` and sends the final notification.
    ///
    /// Returns `false` without notifying if the game had already ended.
    pub fn fail(&mut self, reason: impl Into<String>) -> bool {
        let changed = self.model.lock().fail(reason);
        if changed {
            self.model.notify(None);
        }
        changed
    }

    /// A read handle to the model this writer mutates.
    pub fn model(&self) -> &GameModel {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::thread;

    use super::*;

    fn pos(row: usize, col: usize) -> Position {
        Position::new(row, col)
    }

    fn revealed(row: usize, col: usize, symbol: &str) -> ServerEvent {
        ServerEvent::CardRevealed {
            position: pos(row, col),
            symbol: Symbol::new(symbol).unwrap(),
        }
    }

    #[test]
    fn test_new_zero_dimension_is_rejected() {
        let result = GameModel::new(0, ObserverRegistry::new());
        assert!(matches!(result, Err(ProtocolError::ZeroDimension)));
    }

    #[test]
    fn test_apply_notifies_after_state_is_updated() {
        let registry = ObserverRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            registry.subscribe_fn(move |model, card| {
                // Querying from inside the callback must not deadlock.
                seen.lock().unwrap().push((
                    card,
                    model.move_count(),
                    model.match_count(),
                    model.status(),
                ));
            });
        }
        let (model, mut writer) = GameModel::new(4, registry).unwrap();

        writer.apply(&revealed(0, 0, "A")).unwrap();
        writer.apply(&revealed(0, 1, "A")).unwrap();
        writer
            .apply(&ServerEvent::Matched {
                first: pos(0, 0),
                second: pos(0, 1),
            })
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 5);
        // Every notification for the match already sees the new counters.
        for (_, moves, matches, _) in &seen[2..] {
            assert_eq!((*moves, *matches), (1, 1));
        }
        assert_eq!(seen[2].0, None);
        assert_eq!(seen[3].0, Some(CardUpdate::new(pos(0, 0))));
        assert_eq!(model.match_count(), 1);
    }

    #[test]
    fn test_apply_error_does_not_notify() {
        let registry = ObserverRegistry::new();
        let count = Arc::new(Mutex::new(0));
        {
            let count = Arc::clone(&count);
            registry.subscribe_fn(move |_, _| *count.lock().unwrap() += 1);
        }
        let (_model, mut writer) = GameModel::new(2, registry).unwrap();

        let result = writer.apply(&ServerEvent::Matched {
            first: pos(0, 0),
            second: pos(1, 1),
        });

        assert!(result.is_err());
        assert_eq!(*count.lock().unwrap(), 0);
    }

    #[test]
    fn test_fail_sends_one_final_notification() {
        let registry = ObserverRegistry::new();
        let statuses = Arc::new(Mutex::new(Vec::new()));
        {
            let statuses = Arc::clone(&statuses);
            registry.subscribe_fn(move |model, card| {
                statuses.lock().unwrap().push((card, model.status()));
            });
        }
        let (model, mut writer) = GameModel::new(2, registry).unwrap();

        assert!(writer.fail("server hung up"));
        assert!(!writer.fail("again"));

        assert_eq!(
            *statuses.lock().unwrap(),
            vec![(None, GameStatus::Error)]
        );
        assert_eq!(model.error_message().as_deref(), Some("server hung up"));
    }

    #[test]
    fn test_queries_check_bounds() {
        let (model, _writer) = GameModel::new(2, ObserverRegistry::new()).unwrap();
        assert!(model.is_hidden(pos(1, 1)).unwrap());
        assert!(matches!(
            model.is_hidden(pos(2, 0)),
            Err(ProtocolError::OutOfBounds { .. })
        ));
        assert!(model.symbol_at(pos(0, 5)).is_err());
        assert_eq!(model.symbol_at(pos(0, 0)).unwrap(), None);
    }

    #[test]
    fn test_read_gives_consistent_view_across_threads() {
        let (model, mut writer) = GameModel::new(4, ObserverRegistry::new()).unwrap();

        let reader = {
            let model = model.clone();
            thread::spawn(move || {
                for _ in 0..1000 {
                    // The script never has more than two cards face up.
                    model.read(|state| {
                        assert!(state.board().hidden_count() >= 14);
                    });
                }
            })
        };

        for _ in 0..200 {
            writer.apply(&revealed(3, 3, "A")).unwrap();
            writer.apply(&revealed(3, 2, "B")).unwrap();
            writer
                .apply(&ServerEvent::Mismatched {
                    first: pos(3, 3),
                    second: pos(3, 2),
                })
                .unwrap();
        }

        reader.join().unwrap();
        assert_eq!(model.move_count(), 200);
        assert!(format!("{model:?}").contains("move_count: 200"));
    }
}
