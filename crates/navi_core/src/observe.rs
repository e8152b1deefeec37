//! Observer primitives shared by stores, backends and platform hooks.
//!
//! # Responsibility
//! - Fan out values to registered listeners (`Signal`).
//! - Hold a current value that notifies on change (`Observable`).
//! - Represent an attached listener as an owned handle (`Subscription`).
//!
//! # Invariants
//! - No internal lock is held while a listener runs, so listeners may
//!   subscribe, unsubscribe or emit re-entrantly.
//! - A `Subscription` detaches at most once, on `unsubscribe()` or drop.

use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Locks a mutex, recovering the guard if a listener panicked while holding it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owned handle for an attached listener.
#[must_use = "dropping a Subscription detaches its listener"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wraps a cleanup closure that runs once on detach.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A handle with nothing to detach.
    pub fn detached() -> Self {
        Self { cancel: None }
    }

    /// Detaches the listener now.
    pub fn unsubscribe(mut self) {
        self.run_cancel();
    }

    /// Whether the cleanup has not run yet.
    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl Debug for Subscription {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct SignalInner<T> {
    listeners: Mutex<BTreeMap<u64, Callback<T>>>,
    next_id: AtomicU64,
}

/// Multi-listener notification channel. Cloning shares the listener set.
pub struct Signal<T> {
    inner: Arc<SignalInner<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Signal<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SignalInner {
                listeners: Mutex::new(BTreeMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Registers a listener; it receives every value emitted afterwards.
    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.listeners).insert(id, Arc::new(listener));

        let weak = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner.listeners).remove(&id);
            }
        })
    }

    /// Delivers `value` to every listener registered at call time.
    pub fn emit(&self, value: &T) {
        let callbacks: Vec<Callback<T>> = lock(&self.inner.listeners).values().cloned().collect();
        for callback in callbacks {
            callback(value);
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.inner.listeners).len()
    }
}

/// A current value plus change notification.
pub struct Observable<T> {
    value: Mutex<T>,
    changed: Signal<T>,
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    pub fn new(initial: T) -> Self {
        Self {
            value: Mutex::new(initial),
            changed: Signal::new(),
        }
    }

    pub fn get(&self) -> T {
        lock(&self.value).clone()
    }

    /// Stores `value`; listeners run only when it differs from the current one.
    ///
    /// Returns whether the value changed.
    pub fn set(&self, value: T) -> bool {
        {
            let mut current = lock(&self.value);
            if *current == value {
                return false;
            }
            *current = value.clone();
        }
        self.changed.emit(&value);
        true
    }

    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        self.changed.subscribe(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::{Observable, Signal, Subscription};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn signal_delivers_until_unsubscribed() {
        let signal = Signal::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = signal.subscribe(move |value| sink.lock().unwrap().push(*value));

        signal.emit(&1);
        signal.emit(&2);
        sub.unsubscribe();
        signal.emit(&3);

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        assert_eq!(signal.listener_count(), 0);
    }

    #[test]
    fn dropping_subscription_detaches() {
        let signal = Signal::<()>::new();
        let hits = Arc::new(AtomicUsize::new(0));
        {
            let hits = Arc::clone(&hits);
            let _sub = signal.subscribe(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            });
            signal.emit(&());
        }
        signal.emit(&());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_may_emit_reentrantly() {
        let signal = Signal::<u32>::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let inner_signal = signal.clone();
        let counter = Arc::clone(&hits);
        let _sub = signal.subscribe(move |value| {
            counter.fetch_add(1, Ordering::SeqCst);
            if *value == 0 {
                inner_signal.emit(&1);
            }
        });

        signal.emit(&0);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn observable_skips_unchanged_values() {
        let online = Observable::new(true);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let _sub = online.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!online.set(true));
        assert!(online.set(false));
        assert!(!online.get());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn detached_subscription_is_inactive() {
        let sub = Subscription::detached();
        assert!(!sub.is_active());
        sub.unsubscribe();
    }
}
