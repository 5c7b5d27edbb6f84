use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{ReentrantMutex, RwLock};

use crate::error::PublishingError;
use crate::message::Batch;

/// Receives the outcome of every batch a [`Publisher`](super::Publisher)
/// handles.
pub trait Observer: Send + Sync {
    /// These messages were published and confirmed.
    fn on_next(&self, batch: &Batch);

    /// These messages were not published.
    fn on_error(&self, error: &PublishingError);

    /// The publisher was disposed. Sent once.
    fn on_completed(&self) {}
}

struct Entry {
    id: u64,
    observer: Arc<dyn Observer>,
    active: AtomicBool,
}

/// Registered observers. Notifications iterate over a snapshot, and an entry
/// deactivated mid-notification is skipped for the rest of it.
///
/// Notifications from different threads are delivered one at a time through
/// `gate`, and nothing is delivered once `completed` has been sent. The gate
/// is reentrant so an observer may dispose the publisher from its callback.
#[derive(Default)]
pub(crate) struct ObserverSet {
    entries: RwLock<Vec<Arc<Entry>>>,
    next_id: AtomicU64,
    gate: ReentrantMutex<()>,
    completed: AtomicBool,
}

impl ObserverSet {
    pub(crate) fn subscribe(self: &Arc<Self>, observer: Arc<dyn Observer>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.write().push(Arc::new(Entry {
            id,
            observer,
            active: AtomicBool::new(true),
        }));
        Subscription {
            set: Arc::downgrade(self),
            id,
            armed: true,
        }
    }

    fn unsubscribe(&self, id: u64) {
        let mut entries = self.entries.write();
        if let Some(position) = entries.iter().position(|entry| entry.id == id) {
            let entry = entries.remove(position);
            entry.active.store(false, Ordering::SeqCst);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub(crate) fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    /// Callers hold `gate`.
    fn each(&self, mut notify: impl FnMut(&dyn Observer)) {
        let snapshot = self.entries.read().clone();
        for entry in snapshot {
            if self.is_completed() {
                return;
            }
            if entry.active.load(Ordering::SeqCst) {
                notify(entry.observer.as_ref());
            }
        }
    }

    pub(crate) fn next(&self, batch: &Batch) {
        let _gate = self.gate.lock();
        self.each(|observer| observer.on_next(batch));
    }

    pub(crate) fn error(&self, error: &PublishingError) {
        let _gate = self.gate.lock();
        self.each(|observer| observer.on_error(error));
    }

    /// Send `on_completed` to every observer. Only the first call has an
    /// effect.
    pub(crate) fn completed(&self) {
        let _gate = self.gate.lock();
        if self.completed.swap(true, Ordering::SeqCst) {
            return;
        }
        let snapshot = self.entries.read().clone();
        for entry in snapshot {
            if entry.active.load(Ordering::SeqCst) {
                entry.observer.on_completed();
            }
        }
    }
}

/// Handle returned by [`Publisher::subscribe`](super::Publisher::subscribe).
///
/// Dropping it unsubscribes the observer. Call [`detach`](Self::detach) to
/// keep the observer registered for the publisher's lifetime instead.
#[must_use = "dropping a Subscription unsubscribes the observer"]
pub struct Subscription {
    set: Weak<ObserverSet>,
    id: u64,
    armed: bool,
}

impl Subscription {
    /// Remove the observer. Notifications that start afterwards skip it; one
    /// that already passed it on another thread may still deliver.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    pub fn detach(mut self) {
        self.armed = false;
    }

    fn release(&mut self) {
        if !std::mem::replace(&mut self.armed, false) {
            return;
        }
        if let Some(set) = self.set.upgrade() {
            set.unsubscribe(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

type NextFn = Box<dyn Fn(&Batch) + Send + Sync>;
type ErrorFn = Box<dyn Fn(&PublishingError) + Send + Sync>;
type CompletedFn = Box<dyn Fn() + Send + Sync>;

/// An [`Observer`] assembled from closures. Unset callbacks do nothing.
///
/// ```
/// use confirm_relay::CallbackObserver;
///
/// let observer = CallbackObserver::new()
///     .with_next(|batch| println!("published {}", batch.len()))
///     .with_error(|error| eprintln!("failed: {}", error));
/// ```
#[derive(Default)]
pub struct CallbackObserver {
    next: Option<NextFn>,
    error: Option<ErrorFn>,
    completed: Option<CompletedFn>,
}

impl CallbackObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_next(mut self, callback: impl Fn(&Batch) + Send + Sync + 'static) -> Self {
        self.next = Some(Box::new(callback));
        self
    }

    pub fn with_error(mut self, callback: impl Fn(&PublishingError) + Send + Sync + 'static) -> Self {
        self.error = Some(Box::new(callback));
        self
    }

    pub fn with_completed(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.completed = Some(Box::new(callback));
        self
    }
}

impl Observer for CallbackObserver {
    fn on_next(&self, batch: &Batch) {
        if let Some(callback) = &self.next {
            callback(batch);
        }
    }

    fn on_error(&self, error: &PublishingError) {
        if let Some(callback) = &self.error {
            callback(error);
        }
    }

    fn on_completed(&self) {
        if let Some(callback) = &self.completed {
            callback();
        }
    }
}
