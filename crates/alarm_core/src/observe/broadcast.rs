//! Multicast observer list.

use crate::observe::disposable::Disposable;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

enum Sink<T> {
    Channel(Sender<T>),
    Callback {
        callback: Callback<T>,
        active: Arc<AtomicBool>,
    },
}

impl<T> Clone for Sink<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Channel(sender) => Self::Channel(sender.clone()),
            Self::Callback { callback, active } => Self::Callback {
                callback: Arc::clone(callback),
                active: Arc::clone(active),
            },
        }
    }
}

struct ObserverList<T> {
    next_id: u64,
    entries: Vec<(u64, Sink<T>)>,
}

struct BroadcastShared<T> {
    observers: Mutex<ObserverList<T>>,
    emit_gate: Mutex<()>,
}

impl<T> BroadcastShared<T> {
    fn register(&self, sink: Sink<T>) -> u64 {
        let mut observers = self.observers.lock();
        let id = observers.next_id;
        observers.next_id += 1;
        observers.entries.push((id, sink));
        id
    }

    fn unregister(&self, id: u64) {
        self.observers
            .lock()
            .entries
            .retain(|(entry_id, _)| *entry_id != id);
    }
}

/// Multicast channel of values without replay.
///
/// Cloning yields another handle to the same observer list.
pub struct Broadcast<T> {
    shared: Arc<BroadcastShared<T>>,
}

impl<T> Clone for Broadcast<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone + Send + 'static> Default for Broadcast<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> Broadcast<T> {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(BroadcastShared {
                observers: Mutex::new(ObserverList {
                    next_id: 0,
                    entries: Vec::new(),
                }),
                emit_gate: Mutex::new(()),
            }),
        }
    }

    /// Registers a channel observer that sees every later emission.
    pub fn subscribe(&self) -> Subscription<T> {
        self.subscribe_seeded(None)
    }

    /// Registers a channel observer whose first item is `initial`.
    ///
    /// The seed is queued before registration completes, so no emission can
    /// overtake it.
    pub(crate) fn subscribe_seeded(&self, initial: Option<T>) -> Subscription<T> {
        let (sender, receiver) = channel::unbounded();
        if let Some(value) = initial {
            // The receiver is alive in this scope; sending cannot fail.
            let _ = sender.send(value);
        }
        let id = self.shared.register(Sink::Channel(sender));
        Subscription {
            id,
            receiver,
            source: Arc::downgrade(&self.shared),
            disposed: AtomicBool::new(false),
        }
    }

    /// Registers an inline callback invoked on the emitting thread.
    pub fn subscribe_fn<F>(&self, callback: F) -> CallbackSubscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let active = Arc::new(AtomicBool::new(true));
        let id = self.shared.register(Sink::Callback {
            callback: Arc::new(callback),
            active: Arc::clone(&active),
        });
        let source: Weak<BroadcastShared<T>> = Arc::downgrade(&self.shared);
        CallbackSubscription {
            active,
            unregister: Mutex::new(Some(Box::new(move || {
                if let Some(shared) = source.upgrade() {
                    shared.unregister(id);
                }
            }))),
        }
    }

    /// Delivers `value` to every current observer.
    ///
    /// Concurrent emitters are serialized so all observers see one order.
    pub fn emit(&self, value: T) {
        let _gate = self.shared.emit_gate.lock();
        let snapshot: Vec<(u64, Sink<T>)> = self.shared.observers.lock().entries.clone();

        let mut dead = Vec::new();
        for (id, sink) in &snapshot {
            match sink {
                Sink::Channel(sender) => {
                    if sender.send(value.clone()).is_err() {
                        dead.push(*id);
                    }
                }
                Sink::Callback { callback, active } => {
                    if active.load(Ordering::Acquire) {
                        callback(&value);
                    }
                }
            }
        }

        if !dead.is_empty() {
            self.shared
                .observers
                .lock()
                .entries
                .retain(|(id, _)| !dead.contains(id));
        }
    }

    /// Number of registered observers, including not-yet-pruned dead ones.
    pub fn observer_count(&self) -> usize {
        self.shared.observers.lock().entries.len()
    }
}

/// Channel-backed subscription.
///
/// Values queue up until read, so the consumer may live on any thread.
/// Dropping the subscription disposes it.
pub struct Subscription<T> {
    id: u64,
    receiver: Receiver<T>,
    source: Weak<BroadcastShared<T>>,
    disposed: AtomicBool,
}

impl<T> Subscription<T> {
    fn closed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Blocks until the next value; `None` once disposed or the source is gone.
    pub fn recv(&self) -> Option<T> {
        if self.closed() {
            return None;
        }
        self.receiver.recv().ok()
    }

    /// Like [`recv`](Self::recv) but gives up after `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        if self.closed() {
            return None;
        }
        match self.receiver.recv_timeout(timeout) {
            Ok(value) => Some(value),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn try_recv(&self) -> Option<T> {
        if self.closed() {
            return None;
        }
        self.receiver.try_recv().ok()
    }

    /// Takes every value queued so far, oldest first.
    pub fn drain(&self) -> Vec<T> {
        let mut values = Vec::new();
        while let Some(value) = self.try_recv() {
            values.push(value);
        }
        values
    }

    /// Drops queued values except the newest one, which is returned.
    pub fn latest(&self) -> Option<T> {
        self.drain().pop()
    }
}

impl<T> Disposable for Subscription<T>
where
    T: Send,
{
    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(shared) = self.source.upgrade() {
            shared.unregister(self.id);
        }
    }

    fn is_disposed(&self) -> bool {
        self.closed()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if !self.disposed.swap(true, Ordering::AcqRel) {
            if let Some(shared) = self.source.upgrade() {
                shared.unregister(self.id);
            }
        }
    }
}

type Unregister = Box<dyn FnOnce() + Send>;

/// Handle for an inline callback observer.
///
/// Unlike [`Subscription`], dropping this handle does NOT unregister the
/// callback; call [`dispose`](Disposable::dispose) or hand it to a
/// [`DisposableGroup`](crate::observe::DisposableGroup).
#[must_use = "dropping a CallbackSubscription leaves the callback registered; dispose it or add it to a DisposableGroup"]
pub struct CallbackSubscription {
    active: Arc<AtomicBool>,
    unregister: Mutex<Option<Unregister>>,
}

impl Disposable for CallbackSubscription {
    fn dispose(&self) {
        self.active.store(false, Ordering::Release);
        if let Some(unregister) = self.unregister.lock().take() {
            unregister();
        }
    }

    fn is_disposed(&self) -> bool {
        !self.active.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::Broadcast;
    use crate::observe::Disposable;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn every_subscriber_sees_every_emission_in_order() {
        let broadcast = Broadcast::new();
        let first = broadcast.subscribe();
        let second = broadcast.subscribe();

        broadcast.emit(1);
        broadcast.emit(2);

        assert_eq!(first.drain(), vec![1, 2]);
        assert_eq!(second.drain(), vec![1, 2]);
    }

    #[test]
    fn no_replay_for_late_subscribers() {
        let broadcast = Broadcast::new();
        broadcast.emit("early".to_string());
        let late = broadcast.subscribe();
        assert_eq!(late.try_recv(), None);
    }

    #[test]
    fn dispose_is_idempotent_and_stops_delivery() {
        let broadcast = Broadcast::new();
        let subscription = broadcast.subscribe();
        broadcast.emit(1);

        subscription.dispose();
        subscription.dispose();
        broadcast.emit(2);

        assert!(subscription.is_disposed());
        assert_eq!(subscription.try_recv(), None);
        assert_eq!(broadcast.observer_count(), 0);
    }

    #[test]
    fn dropped_subscription_is_unregistered() {
        let broadcast: Broadcast<u8> = Broadcast::new();
        {
            let _subscription = broadcast.subscribe();
            assert_eq!(broadcast.observer_count(), 1);
        }
        assert_eq!(broadcast.observer_count(), 0);
    }

    #[test]
    fn disposed_callback_is_skipped_while_others_keep_receiving() {
        let broadcast = Broadcast::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let first = broadcast.subscribe_fn(move |_: &u32| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let tail = broadcast.subscribe();

        broadcast.emit(1);
        first.dispose();
        broadcast.emit(2);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(tail.drain(), vec![1, 2]);
    }

    #[test]
    fn subscribing_from_a_callback_takes_effect_on_next_emission() {
        let broadcast: Broadcast<u32> = Broadcast::new();
        let late = Arc::new(parking_lot::Mutex::new(None));

        let source = broadcast.clone();
        let slot = Arc::clone(&late);
        let _hook = broadcast.subscribe_fn(move |_| {
            let mut slot = slot.lock();
            if slot.is_none() {
                *slot = Some(source.subscribe());
            }
        });

        broadcast.emit(1);
        broadcast.emit(2);

        let late = late.lock().take().expect("callback should subscribe");
        assert_eq!(late.drain(), vec![2]);
    }

    #[test]
    fn receive_calls_return_none_after_dispose() {
        let broadcast = Broadcast::new();
        let subscription = broadcast.subscribe();
        broadcast.emit(7u16);
        subscription.dispose();

        assert_eq!(subscription.try_recv(), None);
        assert_eq!(subscription.recv(), None);
        assert_eq!(
            subscription.recv_timeout(std::time::Duration::from_millis(5)),
            None
        );
    }

    #[test]
    fn callback_handle_must_be_disposed_to_unregister() {
        let broadcast: Broadcast<u8> = Broadcast::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handle = broadcast.subscribe_fn(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        broadcast.emit(1);
        assert_eq!(broadcast.observer_count(), 1);
        handle.dispose();
        broadcast.emit(2);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(broadcast.observer_count(), 0);
    }

    #[test]
    fn latest_keeps_only_newest_value() {
        let broadcast = Broadcast::new();
        let subscription = broadcast.subscribe();
        for value in 0..5 {
            broadcast.emit(value);
        }
        assert_eq!(subscription.latest(), Some(4));
        assert_eq!(subscription.try_recv(), None);
    }
}
