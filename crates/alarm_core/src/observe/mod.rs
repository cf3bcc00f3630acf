//! Push-based change notification for core state.
//!
//! # Responsibility
//! - [`Broadcast`]: multicast observer list without a current value.
//! - [`Observable`]: a current value plus a broadcast of every later value.
//! - [`Subscription`] / [`CallbackSubscription`]: idempotent disposal handles.
//! - [`DisposableGroup`]: all-or-nothing cancellation of many subscriptions.
//!
//! # Invariants
//! - Emission iterates a snapshot of the observer list, so subscribing or
//!   disposing during a notification never corrupts delivery.
//! - Emissions on one source are delivered to every observer in the same
//!   order; correctness never depends on which thread consumes them.
//! - A disposed subscription receives nothing further.
//! - Inline callbacks run on the emitting thread while the source's emit gate
//!   is held; they must not emit into the same source.

mod broadcast;
mod disposable;
mod observable;

pub use broadcast::{Broadcast, CallbackSubscription, Subscription};
pub use disposable::{Disposable, DisposableGroup};
pub use observable::Observable;
