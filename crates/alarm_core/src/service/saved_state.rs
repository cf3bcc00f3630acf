//! Flat, serializable form of the edit overlay.
//!
//! # Responsibility
//! - Encode the overlay so a recreated presentation shell can resume an edit.
//! - Tag saved state with the process generation that wrote it.
//!
//! # Invariants
//! - `is_edited == false` decodes to an absent value whatever `value` holds.
//! - An undecodable value decodes to an absent value, never to an error.
//! - The holder anchor is never saved.

use crate::model::alarm::{Alarm, AlarmId};
use crate::model::edited::EditedAlarm;
use log::warn;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static CURRENT_GENERATION: Lazy<ProcessGeneration> =
    Lazy::new(|| ProcessGeneration(Uuid::new_v4()));

/// Identity of one process lifetime.
///
/// Saved state from another generation refers to alarm ids and handles that
/// may no longer exist and must be discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessGeneration(Uuid);

impl ProcessGeneration {
    /// Generation of the running process; stable for its whole lifetime.
    pub fn current() -> Self {
        *CURRENT_GENERATION
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

/// Error for saved-state encoding and decoding.
#[derive(Debug)]
pub enum SavedStateError {
    Encode(postcard::Error),
    Decode(postcard::Error),
}

impl Display for SavedStateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Encode(err) => write!(f, "failed to encode saved edit state: {err}"),
            Self::Decode(err) => write!(f, "failed to decode saved edit state: {err}"),
        }
    }
}

impl Error for SavedStateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Encode(err) | Self::Decode(err) => Some(err),
        }
    }
}

/// Flat record of one overlay; `value` is the postcard-encoded alarm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedEditState {
    pub is_new: bool,
    pub id: AlarmId,
    pub is_edited: bool,
    pub value: Option<Vec<u8>>,
}

impl SavedEditState {
    pub fn encode(edited: &EditedAlarm) -> Result<Self, SavedStateError> {
        let value = edited
            .value
            .as_ref()
            .map(postcard::to_stdvec)
            .transpose()
            .map_err(SavedStateError::Encode)?;
        Ok(Self {
            is_new: edited.is_new,
            id: edited.id,
            is_edited: edited.is_edited(),
            value,
        })
    }

    /// Strict decode: fails when an edited value cannot be read back.
    pub fn try_decode(&self) -> Result<EditedAlarm, SavedStateError> {
        let value = match (&self.value, self.is_edited) {
            (Some(bytes), true) => Some(
                postcard::from_bytes::<Alarm>(bytes).map_err(SavedStateError::Decode)?,
            ),
            _ => None,
        };
        Ok(EditedAlarm {
            is_new: self.is_new,
            id: self.id,
            value,
            holder: None,
        })
    }

    /// Lenient decode: an unreadable value is treated as absent.
    pub fn decode(&self) -> EditedAlarm {
        self.try_decode().unwrap_or_else(|err| {
            warn!(
                "event=saved_state_decode module=service status=skip alarm_id={} error={err}",
                self.id
            );
            EditedAlarm {
                is_new: self.is_new,
                id: self.id,
                value: None,
                holder: None,
            }
        })
    }
}

/// Saved overlay plus the generation tag the caller must check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedSession {
    pub generation: ProcessGeneration,
    pub state: SavedEditState,
}

impl SavedSession {
    /// Captures `edited` tagged with the current generation.
    pub fn capture(edited: &EditedAlarm) -> Result<Self, SavedStateError> {
        Ok(Self {
            generation: ProcessGeneration::current(),
            state: SavedEditState::encode(edited)?,
        })
    }

    /// Whether this state was written by the running process.
    pub fn is_current(&self) -> bool {
        self.generation == ProcessGeneration::current()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SavedStateError> {
        postcard::to_stdvec(self).map_err(SavedStateError::Encode)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SavedStateError> {
        postcard::from_bytes(bytes).map_err(SavedStateError::Decode)
    }
}
