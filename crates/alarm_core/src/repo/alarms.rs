//! In-memory alarm repository backed by asynchronous persistence.
//!
//! # Responsibility
//! - Issue alarm identities and own the live set of [`AlarmStore`] handles.
//! - Persist every create/modify/delete through the background writer.
//! - Offer a barrier that waits for all queued persistence.
//! - Publish tone changes for the platform permission collaborator.
//!
//! # Invariants
//! - Ids are issued monotonically and never reused while the process runs.
//! - `query()` lists live handles oldest first.
//! - Only `AlarmStore::delete` removes a handle from the enumeration.

use crate::config::RetryPolicy;
use crate::model::alarm::{Alarm, AlarmId, Alarmtone};
use crate::observe::{Broadcast, CallbackSubscription, Observable, Subscription};
use crate::repo::alarm_store::AlarmStore;
use crate::repo::storage::{AlarmStorage, RepoError, RepoResult, SqliteAlarmStorage};
use crate::repo::writer::{PersistError, PersistWriter};
use log::{debug, error, info};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Where a tone change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToneChangeOrigin {
    /// A new alarm was created with its default tone.
    Created,
    /// A handle's durable value changed tone (e.g. an edit was committed).
    Stored,
    /// The edit overlay changed tone (e.g. picker selection).
    Edited,
    /// The user's default tone changed; affects alarms using `Alarmtone::Default`.
    DefaultTone,
}

/// Notification that an alarm's tone reference changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToneChange {
    pub alarm_id: AlarmId,
    pub alarmtone: Alarmtone,
    pub origin: ToneChangeOrigin,
}

pub(crate) struct RepoInner {
    stores: Observable<Vec<AlarmStore>>,
    next_id: AtomicI64,
    pub(crate) writer: PersistWriter,
    pub(crate) tone_changes: Broadcast<ToneChange>,
}

impl RepoInner {
    pub(crate) fn remove(&self, id: AlarmId) {
        self.stores.update(|stores| {
            if !stores.iter().any(|store| store.id() == id) {
                return None;
            }
            Some(
                stores
                    .iter()
                    .filter(|store| store.id() != id)
                    .cloned()
                    .collect(),
            )
        });
    }
}

/// Durable collection of alarm handles.
///
/// Cheap to clone; clones share the same collection and writer.
#[derive(Clone)]
pub struct AlarmRepository {
    inner: Arc<RepoInner>,
}

impl AlarmRepository {
    /// Loads every stored alarm and starts the persistence writer.
    ///
    /// # Errors
    /// - Storage errors while loading persisted alarms.
    /// - `WriterSpawn` when the writer thread cannot be started.
    pub fn open(storage: impl AlarmStorage + 'static, retry: RetryPolicy) -> RepoResult<Self> {
        let started_at = Instant::now();
        let persisted = storage.load_all()?;
        let next_id = persisted
            .iter()
            .map(|alarm| alarm.id)
            .max()
            .map_or(1, |max| max + 1);
        let writer =
            PersistWriter::spawn(Box::new(storage), retry).map_err(RepoError::WriterSpawn)?;

        let inner = Arc::new_cyclic(|weak| {
            let stores = persisted
                .into_iter()
                .map(|alarm| AlarmStore::new(alarm, weak.clone()))
                .collect();
            RepoInner {
                stores: Observable::new(stores),
                next_id: AtomicI64::new(next_id),
                writer,
                tone_changes: Broadcast::new(),
            }
        });

        info!(
            "event=repo_open module=repo status=ok alarms={} next_id={} duration_ms={}",
            inner.stores.snapshot().len(),
            next_id,
            started_at.elapsed().as_millis()
        );
        Ok(Self { inner })
    }

    /// Repository over a private in-memory database.
    pub fn in_memory() -> RepoResult<Self> {
        Self::open(SqliteAlarmStorage::in_memory()?, RetryPolicy::default())
    }

    /// Issues a new id, adds a handle seeded with the default alarm and
    /// queues it for persistence.
    pub fn create(&self) -> AlarmStore {
        // Id issue and list append share the list's write gate, so the list
        // stays in id order under concurrent creators.
        let (store, alarmtone) = self.inner.stores.modify_with(|stores| {
            let id = self.inner.next_id.fetch_add(1, Ordering::AcqRel);
            let alarm = Alarm::new(id);
            let alarmtone = alarm.alarmtone.clone();
            let store = AlarmStore::new(alarm.clone(), Arc::downgrade(&self.inner));
            self.inner.writer.upsert(alarm);

            let mut next = stores.clone();
            next.push(store.clone());
            (next, (store, alarmtone))
        });

        let id = store.id();
        debug!("event=alarm_create module=repo status=ok alarm_id={id}");
        self.inner.tone_changes.emit(ToneChange {
            alarm_id: id,
            alarmtone,
            origin: ToneChangeOrigin::Created,
        });
        store
    }

    /// Snapshot of live handles, oldest first.
    pub fn query(&self) -> Vec<AlarmStore> {
        self.inner.stores.get()
    }

    /// Live handle with `id`, if any.
    pub fn get(&self, id: AlarmId) -> Option<AlarmStore> {
        self.inner
            .stores
            .snapshot()
            .iter()
            .find(|store| store.id() == id)
            .cloned()
    }

    pub fn contains(&self, id: AlarmId) -> bool {
        self.inner
            .stores
            .snapshot()
            .iter()
            .any(|store| store.id() == id)
    }

    pub fn len(&self) -> usize {
        self.inner.stores.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current handle list first, then the list after every create/delete.
    pub fn observe(&self) -> Subscription<Vec<AlarmStore>> {
        self.inner.stores.observe()
    }

    /// Tone changes of stored, created and edited alarms (no replay).
    pub fn tone_changes(&self) -> Subscription<ToneChange> {
        self.inner.tone_changes.subscribe()
    }

    /// Callback flavour of [`tone_changes`](Self::tone_changes).
    pub fn on_tone_change<F>(&self, callback: F) -> CallbackSubscription
    where
        F: Fn(&ToneChange) + Send + Sync + 'static,
    {
        self.inner.tone_changes.subscribe_fn(callback)
    }

    pub(crate) fn publish_tone_change(&self, change: ToneChange) {
        self.inner.tone_changes.emit(change);
    }

    /// Reports a new default tone for every live alarm that plays the default.
    ///
    /// The default-tone preference lives outside the core; its owner calls
    /// this after a change. Returns how many tone changes were emitted.
    pub fn publish_default_tone_change(&self, default_tone: &Alarmtone) -> usize {
        let affected: Vec<AlarmId> = self
            .inner
            .stores
            .snapshot()
            .iter()
            .filter(|store| store.read().alarmtone == Alarmtone::Default)
            .map(AlarmStore::id)
            .collect();

        for &alarm_id in &affected {
            self.inner.tone_changes.emit(ToneChange {
                alarm_id,
                alarmtone: default_tone.clone(),
                origin: ToneChangeOrigin::DefaultTone,
            });
        }
        debug!(
            "event=default_tone_change module=repo status=ok affected={}",
            affected.len()
        );
        affected.len()
    }

    /// Blocks until every write queued by earlier create/modify/delete calls
    /// has been applied to storage.
    ///
    /// # Errors
    /// - `WriteFailed` when some write since the previous barrier could not
    ///   be made durable after retries.
    /// - `WriterStopped` when persistence is no longer running.
    pub fn await_stored(&self) -> Result<(), PersistError> {
        let started_at = Instant::now();
        let result = self.inner.writer.barrier();
        match &result {
            Ok(()) => debug!(
                "event=await_stored module=repo status=ok duration_ms={}",
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=await_stored module=repo status=error duration_ms={} error={err}",
                started_at.elapsed().as_millis()
            ),
        }
        result
    }
}
