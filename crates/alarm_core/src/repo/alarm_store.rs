//! Reactive handle for one alarm.
//!
//! # Responsibility
//! - Hold the current durable value of one alarm and publish its changes.
//! - Forward every accepted mutation to the persistence writer.
//!
//! # Invariants
//! - Mutations of one handle are serialized; reads never block.
//! - The persisted write for a mutation is queued before the mutation is
//!   published, and in the same order as mutations are applied.
//! - The alarm id inside the value always equals the handle id.
//! - After `delete`, the handle accepts no further mutations.

use crate::model::alarm::{Alarm, AlarmId};
use crate::observe::{CallbackSubscription, Observable, Subscription};
use crate::repo::alarms::{RepoInner, ToneChange, ToneChangeOrigin};
use log::{debug, warn};
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Individually addressable, observable alarm cell.
///
/// Clones refer to the same cell. Only [`AlarmRepository`](crate::AlarmRepository)
/// creates handles.
#[derive(Clone)]
pub struct AlarmStore {
    id: AlarmId,
    value: Observable<Alarm>,
    deleted: Arc<AtomicBool>,
    repo: Weak<RepoInner>,
}

impl AlarmStore {
    pub(crate) fn new(alarm: Alarm, repo: Weak<RepoInner>) -> Self {
        Self {
            id: alarm.id,
            value: Observable::new(alarm),
            deleted: Arc::new(AtomicBool::new(false)),
            repo,
        }
    }

    pub fn id(&self) -> AlarmId {
        self.id
    }

    /// Current value.
    pub fn read(&self) -> Alarm {
        self.value.get()
    }

    /// Current value first, then every later value.
    pub fn observe(&self) -> Subscription<Alarm> {
        self.value.observe()
    }

    /// Callback flavour of [`observe`](Self::observe).
    pub fn observe_fn<F>(&self, callback: F) -> CallbackSubscription
    where
        F: Fn(&Alarm) + Send + Sync + 'static,
    {
        self.value.observe_fn(callback)
    }

    /// Stores `f(current)` as the new value, persists it asynchronously and
    /// notifies observers.
    ///
    /// Ignored (with a warning) once the handle was deleted.
    pub fn modify<F>(&self, f: F)
    where
        F: FnOnce(&Alarm) -> Alarm,
    {
        let Some(repo) = self.repo.upgrade() else {
            warn!(
                "event=alarm_modify module=repo status=skip alarm_id={} reason=repository_dropped",
                self.id
            );
            return;
        };

        let mut previous_tone = None;
        let stored = self.value.update(|current| {
            if self.deleted.load(Ordering::Acquire) {
                return None;
            }
            let mut next = f(current);
            if next.id != self.id {
                debug!(
                    "event=alarm_modify module=repo status=ok alarm_id={} foreign_id={} action=id_restored",
                    self.id, next.id
                );
                next.id = self.id;
            }
            previous_tone = Some(current.alarmtone.clone());
            repo.writer.upsert(next.clone());
            Some(next)
        });

        let Some(stored) = stored else {
            warn!(
                "event=alarm_modify module=repo status=skip alarm_id={} reason=deleted",
                self.id
            );
            return;
        };

        if previous_tone.as_ref() != Some(&stored.alarmtone) {
            repo.tone_changes.emit(ToneChange {
                alarm_id: self.id,
                alarmtone: stored.alarmtone,
                origin: ToneChangeOrigin::Stored,
            });
        }
    }

    /// Removes this handle from the repository and deletes it from storage.
    ///
    /// Idempotent.
    pub fn delete(&self) {
        let repo = self.repo.upgrade();
        let mut newly_deleted = false;
        // Runs under the handle's write gate so no modify can interleave.
        self.value.update(|_| {
            if !self.deleted.swap(true, Ordering::AcqRel) {
                newly_deleted = true;
                if let Some(repo) = repo.as_ref() {
                    repo.writer.delete(self.id);
                }
            }
            None
        });

        if newly_deleted {
            if let Some(repo) = repo {
                repo.remove(self.id);
            }
            debug!("event=alarm_delete module=repo status=ok alarm_id={}", self.id);
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }
}

impl Debug for AlarmStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlarmStore")
            .field("id", &self.id)
            .field("deleted", &self.is_deleted())
            .finish_non_exhaustive()
    }
}
