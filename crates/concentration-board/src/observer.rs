//! Observer registry: who gets told when the board changes.
//!
//! Observers are anything that implements [`Observer`], including plain
//! closures. The registry keeps them in registration order and delivers
//! each notification to all of them, one after another, on whatever task
//! applied the event. If an observer needs to hop to a UI thread, it does
//! that itself inside `update`.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{CardUpdate, GameModel};

/// Something that wants to hear about board changes.
///
/// `update` receives a read-only handle to the model rather than owning
/// one, so observers can query anything they need (status, counters,
/// the changed cell) at the moment of the notification.
///
/// `card` is `Some` when a single cell changed and `None` when only the
/// counters or status changed. An observer tells "game ended" apart from
/// "board changed" by reading `model.status()`.
pub trait Observer: Send + Sync {
    fn update(&self, model: &GameModel, card: Option<CardUpdate>);
}

impl<F> Observer for F
where
    F: Fn(&GameModel, Option<CardUpdate>) + Send + Sync,
{
    fn update(&self, model: &GameModel, card: Option<CardUpdate>) {
        self(model, card)
    }
}

/// Handle returned by [`ObserverRegistry::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obs-{}", self.0)
    }
}

type Entry = (ObserverId, Arc<dyn Observer>);

#[derive(Default)]
struct RegistryInner {
    next_id: AtomicU64,
    entries: Mutex<Vec<Entry>>,
}

/// An ordered, shareable set of observers.
///
/// Cloning is cheap and yields a handle to the same set, so a front end
/// can keep one clone for subscribing while the model holds another for
/// delivery.
///
/// # Mutation during delivery
///
/// [`notify_all`](Self::notify_all) copies the list under the lock, then
/// releases it before calling anyone. Observers may therefore subscribe,
/// unsubscribe, or query the model from inside `update` without
/// deadlocking. An observer removed mid-round is skipped for the rest of
/// that round; one added mid-round first hears the next notification.
///
/// # Panicking observers
///
/// A panic inside `update` is caught and logged. The remaining observers
/// still hear the notification, and the panicking one stays subscribed.
///
/// Observers that capture a [`GameModel`] clone create a reference cycle
/// through the registry; capture a `Weak` or rely on the `model` argument
/// instead.
#[derive(Clone, Default)]
pub struct ObserverRegistry {
    inner: Arc<RegistryInner>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an observer at the end of the delivery order.
    pub fn subscribe(&self, observer: Arc<dyn Observer>) -> ObserverId {
        let id = ObserverId(self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.lock().push((id, observer));
        tracing::trace!(%id, "observer subscribed");
        id
    }

    /// Convenience for subscribing a closure.
    pub fn subscribe_fn<F>(&self, f: F) -> ObserverId
    where
        F: Fn(&GameModel, Option<CardUpdate>) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(f))
    }

    /// Removes an observer. Returns `false` if it was not subscribed,
    /// which makes repeated calls harmless.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        let removed = entries.len() != before;
        if removed {
            tracing::trace!(%id, "observer unsubscribed");
        }
        removed
    }

    /// Delivers one notification to every observer, in registration order.
    pub fn notify_all(&self, model: &GameModel, card: Option<CardUpdate>) {
        let snapshot: Vec<Entry> = self.lock().clone();
        for (id, observer) in snapshot {
            if !self.contains(id) {
                continue;
            }
            tracing::trace!(%id, ?card, "delivering notification");
            let delivered =
                panic::catch_unwind(AssertUnwindSafe(|| observer.update(model, card)));
            if delivered.is_err() {
                tracing::error!(%id, ?card, "observer panicked; notification skipped");
            }
        }
    }

    pub fn contains(&self, id: ObserverId) -> bool {
        self.lock().iter().any(|(entry_id, _)| *entry_id == id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Entry>> {
        // Observers run without this lock held. The critical sections
        // below cannot leave the list half-updated, so a poisoned lock
        // still holds a valid list.
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("observers", &self.len())
            .finish()
    }
}
