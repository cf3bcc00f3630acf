//! Disposal contract and cancellation groups.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Something that can stop delivering notifications.
///
/// `dispose` must be idempotent.
pub trait Disposable: Send {
    fn dispose(&self);
    fn is_disposed(&self) -> bool;
}

/// Aggregates subscriptions of a component that lacks its own lifetime and
/// disposes all of them together.
///
/// Dropping the group disposes it. Members added after disposal are disposed
/// immediately.
#[derive(Default)]
pub struct DisposableGroup {
    members: Mutex<Vec<Box<dyn Disposable>>>,
    disposed: AtomicBool,
}

impl DisposableGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, member: impl Disposable + 'static) {
        let mut members = self.members.lock();
        if self.disposed.load(Ordering::Acquire) {
            drop(members);
            member.dispose();
            return;
        }
        members.push(Box::new(member));
    }

    pub fn len(&self) -> usize {
        self.members.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.lock().is_empty()
    }
}

impl Disposable for DisposableGroup {
    fn dispose(&self) {
        let members = {
            let mut members = self.members.lock();
            self.disposed.store(true, Ordering::Release);
            std::mem::take(&mut *members)
        };
        for member in members {
            member.dispose();
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl Drop for DisposableGroup {
    fn drop(&mut self) {
        self.dispose();
    }
}
