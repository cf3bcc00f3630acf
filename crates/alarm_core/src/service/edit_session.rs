//! Single-editor session over the alarm repository.
//!
//! # Responsibility
//! - Hold at most one edit overlay on top of one repository handle.
//! - Commit the overlay into the handle wholesale, or discard it.
//! - Expose back-press and new-alarm-transition signals for presentation.
//!
//! # Invariants
//! - Transitions (`create_new_alarm`, `edit`, `modify_overlay`, `commit`,
//!   `cancel`, `restore`) are serialized by one mutation gate.
//! - The overlay never writes through to its handle before `commit`.
//! - Cancelling a new, never-committed alarm deletes its handle.
//! - Starting an edit replaces any open overlay; requests are not queued.
//! - A missing handle id is a silent no-op, never an error.
//!
//! Observer callbacks run while the gate is held; a callback must not call
//! back into the session. Channel subscriptions have no such restriction.

use crate::model::alarm::{Alarm, AlarmId};
use crate::model::edited::{EditedAlarm, RowHolder};
use crate::observe::{Broadcast, CallbackSubscription, Observable, Subscription};
use crate::repo::alarms::{AlarmRepository, ToneChange, ToneChangeOrigin};
use crate::service::saved_state::{SavedSession, SavedStateError};
use chrono::NaiveDateTime;
use log::{debug, info};
use parking_lot::Mutex;

/// Process-wide edit coordinator.
///
/// Construct once per process and share it (e.g. via `Arc`); it survives
/// presentation shell recreation.
pub struct EditSession {
    repository: AlarmRepository,
    gate: Mutex<()>,
    editing: Observable<EditedAlarm>,
    back_pressed: Broadcast<String>,
    transition_to_new_alarm: Observable<bool>,
}

impl EditSession {
    /// Creates an idle session over `repository`.
    pub fn new(repository: AlarmRepository) -> Self {
        Self {
            repository,
            gate: Mutex::new(()),
            editing: Observable::new(EditedAlarm::idle()),
            back_pressed: Broadcast::new(),
            transition_to_new_alarm: Observable::new(false),
        }
    }

    pub fn repository(&self) -> &AlarmRepository {
        &self.repository
    }

    /// Current overlay; `value` is absent when idle.
    pub fn edited_alarm(&self) -> EditedAlarm {
        self.editing.get()
    }

    pub fn observe_edited_alarm(&self) -> Subscription<EditedAlarm> {
        self.editing.observe()
    }

    pub fn observe_edited_alarm_fn<F>(&self, callback: F) -> CallbackSubscription
    where
        F: Fn(&EditedAlarm) + Send + Sync + 'static,
    {
        self.editing.observe_fn(callback)
    }

    /// Creates a fresh alarm and opens it for editing.
    ///
    /// The new alarm defaults to delete-after-dismiss in the overlay only;
    /// the handle keeps repository defaults until commit.
    pub fn create_new_alarm(&self) -> AlarmId {
        let _gate = self.gate.lock();
        let store = self.repository.create();
        let id = store.id();

        self.transition_to_new_alarm.set(true);

        let mut value = store.read();
        value.is_delete_after_dismiss = true;
        self.editing.set(EditedAlarm {
            is_new: true,
            id,
            value: Some(value),
            holder: None,
        });

        info!("event=edit_start module=service status=ok alarm_id={id} is_new=true");
        id
    }

    /// Opens the existing alarm `id` for editing.
    ///
    /// Returns `false` (and emits nothing) when no such alarm exists.
    pub fn edit(&self, id: AlarmId, holder: Option<RowHolder>) -> bool {
        let _gate = self.gate.lock();
        let Some(store) = self.repository.get(id) else {
            debug!("event=edit_start module=service status=skip alarm_id={id} reason=missing");
            return false;
        };

        self.editing.set(EditedAlarm {
            is_new: false,
            id,
            value: Some(store.read()),
            holder,
        });

        info!("event=edit_start module=service status=ok alarm_id={id} is_new=false");
        true
    }

    /// Applies `f` to the buffered alarm and republishes the overlay.
    ///
    /// Buffer-local: the repository handle is not touched. Returns `false`
    /// when nothing is being edited.
    pub fn modify_overlay<F>(&self, f: F) -> bool
    where
        F: FnOnce(&Alarm) -> Alarm,
    {
        let _gate = self.gate.lock();
        let mut tone_change = None;
        let updated = self.editing.update(|edited| {
            let current = edited.value.as_ref()?;
            let mut next = f(current);
            next.id = edited.id;
            if next.alarmtone != current.alarmtone {
                tone_change = Some(ToneChange {
                    alarm_id: edited.id,
                    alarmtone: next.alarmtone.clone(),
                    origin: ToneChangeOrigin::Edited,
                });
            }
            Some(EditedAlarm {
                value: Some(next),
                ..edited.clone()
            })
        });

        if updated.is_none() {
            debug!("event=overlay_modify module=service status=skip reason=idle");
            return false;
        }
        if let Some(change) = tone_change {
            self.repository.publish_tone_change(change);
        }
        true
    }

    /// Writes the buffered alarm into its handle and closes the overlay.
    ///
    /// Never validates. If the handle vanished meanwhile, only the overlay
    /// is closed. Idle sessions are left untouched.
    pub fn commit(&self) {
        let _gate = self.gate.lock();
        self.commit_locked();
    }

    /// Commits only when an overlay is open and valid at `now`.
    ///
    /// Returns whether a commit happened. This is the usual back-press
    /// policy: an invalid overlay stays open for the user to fix.
    pub fn commit_if_valid(&self, now: NaiveDateTime) -> bool {
        let _gate = self.gate.lock();
        let valid = self
            .editing
            .snapshot()
            .value
            .as_ref()
            .is_some_and(|alarm| alarm.is_valid_at(now));
        if valid {
            self.commit_locked();
        }
        valid
    }

    /// Discards the overlay; a new, never-committed alarm is deleted.
    pub fn cancel(&self) {
        let _gate = self.gate.lock();
        let edited = self.editing.get();
        if !edited.is_edited() {
            return;
        }

        if edited.is_new {
            match self.repository.get(edited.id) {
                Some(store) => store.delete(),
                None => debug!(
                    "event=edit_cancel module=service status=ok alarm_id={} handle=missing",
                    edited.id
                ),
            }
        }
        self.editing.set(edited.cleared());
        info!(
            "event=edit_cancel module=service status=ok alarm_id={} is_new={}",
            edited.id, edited.is_new
        );
    }

    /// Publishes a back-press request tagged with `source`.
    ///
    /// The session does not change state; subscribers decide what back means.
    pub fn on_back_pressed(&self, source: impl Into<String>) {
        self.back_pressed.emit(source.into());
    }

    pub fn observe_back_pressed(&self) -> Subscription<String> {
        self.back_pressed.subscribe()
    }

    pub fn observe_back_pressed_fn<F>(&self, callback: F) -> CallbackSubscription
    where
        F: Fn(&String) + Send + Sync + 'static,
    {
        self.back_pressed.subscribe_fn(callback)
    }

    /// Whether a transition into a freshly created alarm is in progress.
    pub fn transitioning_to_new_alarm(&self) -> bool {
        self.transition_to_new_alarm.get()
    }

    pub fn observe_transition_to_new_alarm(&self) -> Subscription<bool> {
        self.transition_to_new_alarm.observe()
    }

    /// Called by presentation once the new-alarm transition has finished.
    pub fn transition_to_new_alarm_finished(&self) {
        self.transition_to_new_alarm.update(|active| active.then_some(false));
    }

    /// Captures the overlay for shell recreation.
    pub fn save_state(&self) -> Result<SavedSession, SavedStateError> {
        SavedSession::capture(&self.editing.snapshot())
    }

    /// Resumes an overlay saved by [`save_state`](Self::save_state).
    ///
    /// State from another process generation, an undecodable value or a
    /// handle that no longer exists resets the session to idle. An open,
    /// never-committed alarm that the restored overlay does not continue is
    /// deleted. Returns whether an edit was resumed.
    pub fn restore(&self, saved: &SavedSession) -> bool {
        let _gate = self.gate.lock();
        if !saved.is_current() {
            info!("event=session_restore module=service status=skip reason=stale_generation");
            self.reset_locked(EditedAlarm::idle());
            return false;
        }

        let decoded = saved.state.decode();
        if decoded.is_edited() && !self.repository.contains(decoded.id) {
            info!(
                "event=session_restore module=service status=skip alarm_id={} reason=missing",
                decoded.id
            );
            self.reset_locked(decoded.cleared());
            return false;
        }

        let resumed = decoded.is_edited();
        info!(
            "event=session_restore module=service status=ok alarm_id={} resumed={resumed}",
            decoded.id
        );
        self.reset_locked(decoded);
        resumed
    }

    /// Byte flavour of [`restore`](Self::restore); unreadable bytes reset to idle.
    pub fn restore_bytes(&self, bytes: &[u8]) -> bool {
        match SavedSession::from_bytes(bytes) {
            Ok(saved) => self.restore(&saved),
            Err(err) => {
                info!("event=session_restore module=service status=skip error={err}");
                let _gate = self.gate.lock();
                self.reset_locked(EditedAlarm::idle());
                false
            }
        }
    }

    /// Replaces the overlay on restore. An open new alarm that the restored
    /// overlay does not continue is deleted, as `cancel` would.
    fn reset_locked(&self, next: EditedAlarm) {
        let current = self.editing.get();
        let continued = next.is_edited() && next.id == current.id;
        if current.is_new && current.is_edited() && !continued {
            if let Some(store) = self.repository.get(current.id) {
                store.delete();
                debug!(
                    "event=session_restore module=service status=ok alarm_id={} action=discard_new",
                    current.id
                );
            }
        }
        self.editing.set(next);
    }

    fn commit_locked(&self) {
        let edited = self.editing.get();
        let Some(value) = edited.value.clone() else {
            return;
        };

        match self.repository.get(edited.id) {
            Some(store) => store.modify(|_| value),
            None => debug!(
                "event=edit_commit module=service status=ok alarm_id={} handle=missing",
                edited.id
            ),
        }
        self.editing.set(edited.cleared());
        info!(
            "event=edit_commit module=service status=ok alarm_id={} is_new={}",
            edited.id, edited.is_new
        );
    }
}
