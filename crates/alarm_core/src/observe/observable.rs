//! Current-value cell with change broadcast.

use crate::observe::broadcast::{Broadcast, CallbackSubscription, Subscription};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::Arc;

struct ObservableShared<T> {
    current: ArcSwap<T>,
    write_gate: Mutex<()>,
    changes: Broadcast<T>,
}

/// Shared value whose readers never block and whose writers are serialized.
///
/// Reads load a snapshot from an `ArcSwap`. Writes take the write gate,
/// store the new value and notify observers before releasing the gate, so
/// no observer can see two updates out of order.
pub struct Observable<T> {
    shared: Arc<ObservableShared<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Observable<T> {
    pub fn new(initial: T) -> Self {
        Self {
            shared: Arc::new(ObservableShared {
                current: ArcSwap::from_pointee(initial),
                write_gate: Mutex::new(()),
                changes: Broadcast::new(),
            }),
        }
    }

    /// Returns a copy of the current value.
    pub fn get(&self) -> T {
        (**self.shared.current.load()).clone()
    }

    /// Returns the current value without copying it.
    pub fn snapshot(&self) -> Arc<T> {
        self.shared.current.load_full()
    }

    /// Replaces the current value and notifies observers.
    pub fn set(&self, value: T) {
        let _gate = self.shared.write_gate.lock();
        self.shared.current.store(Arc::new(value.clone()));
        self.shared.changes.emit(value);
    }

    /// Read-modify-write: stores `f(current)` and notifies observers.
    ///
    /// Returns the stored value.
    pub fn modify<F>(&self, f: F) -> T
    where
        F: FnOnce(&T) -> T,
    {
        self.update(|current| Some(f(current)))
            .unwrap_or_else(|| self.get())
    }

    /// Read-modify-write where `f` also returns a by-product computed under
    /// the write gate; stores the new value, notifies observers and returns
    /// the by-product.
    pub fn modify_with<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> (T, R),
    {
        let _gate = self.shared.write_gate.lock();
        let current = self.shared.current.load_full();
        let (next, output) = f(&current);
        self.shared.current.store(Arc::new(next.clone()));
        self.shared.changes.emit(next);
        output
    }

    /// Like [`modify`](Self::modify) but `f` may decline by returning `None`,
    /// in which case nothing is stored or emitted.
    ///
    /// Returns the stored value, or `None` when `f` declined.
    pub fn update<F>(&self, f: F) -> Option<T>
    where
        F: FnOnce(&T) -> Option<T>,
    {
        let _gate = self.shared.write_gate.lock();
        let current = self.shared.current.load_full();
        let next = f(&current)?;
        self.shared.current.store(Arc::new(next.clone()));
        self.shared.changes.emit(next.clone());
        Some(next)
    }

    /// Subscribes to the current value followed by every later value.
    pub fn observe(&self) -> Subscription<T> {
        let _gate = self.shared.write_gate.lock();
        self.shared.changes.subscribe_seeded(Some(self.get()))
    }

    /// Subscribes to later values only.
    pub fn changes(&self) -> Subscription<T> {
        self.shared.changes.subscribe()
    }

    /// Invokes `callback` with the current value now and on every update.
    pub fn observe_fn<F>(&self, callback: F) -> CallbackSubscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let _gate = self.shared.write_gate.lock();
        callback(&**self.shared.current.load());
        self.shared.changes.subscribe_fn(callback)
    }

    pub fn observer_count(&self) -> usize {
        self.shared.changes.observer_count()
    }
}
