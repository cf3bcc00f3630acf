//! Edit-buffer overlay model.
//!
//! # Responsibility
//! - Describe the single in-flight edit on top of one repository handle.
//!
//! # Invariants
//! - `is_edited()` is true iff `value` is present.
//! - `value` is a copy of the handle's alarm, never a live reference into it.
//! - `holder` is opaque to the core and is returned unmodified.

use crate::model::alarm::{Alarm, AlarmId};

/// Opaque anchor supplied by the presentation layer (e.g. a list row token).
///
/// The core stores and returns it; it never interprets the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowHolder(pub u64);

/// The overlay ("edited alarm") published by the edit session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditedAlarm {
    /// The handle behind this edit was created for it and never committed.
    pub is_new: bool,
    pub id: AlarmId,
    pub value: Option<Alarm>,
    pub holder: Option<RowHolder>,
}

impl EditedAlarm {
    /// Overlay state when nothing is being edited.
    pub fn idle() -> Self {
        Self {
            is_new: false,
            id: -1,
            value: None,
            holder: None,
        }
    }

    pub fn is_edited(&self) -> bool {
        self.value.is_some()
    }

    /// Same overlay with its buffered value dropped; `id` is preserved.
    #[must_use]
    pub fn cleared(&self) -> Self {
        Self {
            is_new: self.is_new,
            id: self.id,
            value: None,
            holder: None,
        }
    }
}

impl Default for EditedAlarm {
    fn default() -> Self {
        Self::idle()
    }
}

#[cfg(test)]
mod tests {
    use super::{EditedAlarm, RowHolder};
    use crate::model::alarm::Alarm;

    #[test]
    fn is_edited_follows_value_presence() {
        assert!(!EditedAlarm::idle().is_edited());

        let edited = EditedAlarm {
            is_new: false,
            id: 4,
            value: Some(Alarm::new(4)),
            holder: Some(RowHolder(11)),
        };
        assert!(edited.is_edited());

        let cleared = edited.cleared();
        assert!(!cleared.is_edited());
        assert_eq!(cleared.id, 4);
        assert_eq!(cleared.holder, None);
    }
}
