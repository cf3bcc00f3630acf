//! Alarm domain model.
//!
//! # Responsibility
//! - Define the immutable alarm record shared by repository, session and UI.
//! - Provide structural validation and the presentation-level validity check.
//!
//! # Invariants
//! - `id` is issued by the repository and never reused while the process runs.
//! - `hour` is in `0..=23`, `minute` is in `0..=59`.
//! - `days_of_week` only uses the low seven bits (Monday..Sunday).
//! - A one-shot `date` in the past is NOT a structural error; only
//!   `is_valid_at` looks at wall-clock time.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Repository-issued alarm identity.
pub type AlarmId = i64;

const DEFAULT_HOUR: u8 = 8;
const DEFAULT_MINUTE: u8 = 30;
const ALL_DAYS_MASK: u8 = 0b0111_1111;

/// Set of weekdays an alarm repeats on.
///
/// Bit 0 is Monday, bit 6 is Sunday.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DaysOfWeek(u8);

impl DaysOfWeek {
    pub const NONE: Self = Self(0);
    pub const WORKDAYS: Self = Self(0b0001_1111);
    pub const EVERY_DAY: Self = Self(ALL_DAYS_MASK);

    /// Builds a set from a raw bitmask, keeping only weekday bits.
    pub fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & ALL_DAYS_MASK)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, day: Weekday) -> bool {
        self.0 & day_bit(day) != 0
    }

    #[must_use]
    pub fn with(self, day: Weekday) -> Self {
        Self(self.0 | day_bit(day))
    }

    #[must_use]
    pub fn without(self, day: Weekday) -> Self {
        Self(self.0 & !day_bit(day))
    }

    /// Returns whether the alarm fires on at least one weekday.
    pub fn is_repeating(self) -> bool {
        self.0 != 0
    }

    /// Returns whether `date` falls on one of the selected weekdays.
    pub fn matches(self, date: NaiveDate) -> bool {
        self.contains(date.weekday())
    }
}

impl FromIterator<Weekday> for DaysOfWeek {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        iter.into_iter().fold(Self::NONE, Self::with)
    }
}

fn day_bit(day: Weekday) -> u8 {
    1 << day.num_days_from_monday()
}

/// Tone reference played when the alarm fires.
///
/// The core stores the reference only; resolving and permission-checking a
/// `Sound` uri belongs to the platform layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alarmtone {
    /// Whatever the user configured as the default tone.
    #[default]
    Default,
    /// No sound at all.
    Silent,
    /// Explicit sound uri.
    Sound(String),
}

impl Alarmtone {
    /// Returns the uri that needs an OS-level permission check, if any.
    pub fn sound_uri(&self) -> Option<&str> {
        match self {
            Self::Sound(uri) => Some(uri.as_str()),
            Self::Default | Self::Silent => None,
        }
    }
}

/// Canonical alarm record.
///
/// Values are copied freely; a handle in the repository owns the durable one
/// and the edit session owns at most one diverging copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    pub id: AlarmId,
    pub is_enabled: bool,
    pub hour: u8,
    pub minute: u8,
    pub days_of_week: DaysOfWeek,
    /// One-shot date. When set the alarm fires once at `date hour:minute`.
    pub date: Option<NaiveDate>,
    pub alarmtone: Alarmtone,
    pub label: String,
    pub is_prealarm: bool,
    pub is_vibrate: bool,
    /// Remove the alarm after it is dismissed once.
    pub is_delete_after_dismiss: bool,
}

impl Alarm {
    /// Creates the default alarm for a freshly issued id.
    pub fn new(id: AlarmId) -> Self {
        Self {
            id,
            is_enabled: false,
            hour: DEFAULT_HOUR,
            minute: DEFAULT_MINUTE,
            days_of_week: DaysOfWeek::NONE,
            date: None,
            alarmtone: Alarmtone::Default,
            label: String::new(),
            is_prealarm: false,
            is_vibrate: true,
            is_delete_after_dismiss: false,
        }
    }

    /// Returns whether this alarm fires once instead of repeating weekly.
    pub fn is_one_shot(&self) -> bool {
        self.date.is_some() || !self.days_of_week.is_repeating()
    }

    /// Validates structural ranges before persistence.
    ///
    /// # Errors
    /// - `HourOutOfRange` / `MinuteOutOfRange` for impossible clock values.
    /// - `InvalidDaysOfWeek` when bits above Sunday are set.
    pub fn validate(&self) -> Result<(), AlarmValidationError> {
        if self.hour > 23 {
            return Err(AlarmValidationError::HourOutOfRange(self.hour));
        }
        if self.minute > 59 {
            return Err(AlarmValidationError::MinuteOutOfRange(self.minute));
        }
        if self.days_of_week.bits() & !ALL_DAYS_MASK != 0 {
            return Err(AlarmValidationError::InvalidDaysOfWeek(
                self.days_of_week.bits(),
            ));
        }
        Ok(())
    }

    /// Presentation-level validity: a one-shot date must lie in the future.
    ///
    /// Alarms without a `date` are always valid. The core never calls this
    /// from `commit`; callers use it to decide whether to commit at all.
    pub fn is_valid_at(&self, now: NaiveDateTime) -> bool {
        let Some(date) = self.date else {
            return true;
        };
        date.and_hms_opt(u32::from(self.hour), u32::from(self.minute), 0)
            .is_some_and(|fires_at| fires_at > now)
    }
}

/// Structural validation errors for `Alarm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmValidationError {
    HourOutOfRange(u8),
    MinuteOutOfRange(u8),
    InvalidDaysOfWeek(u8),
}

impl Display for AlarmValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HourOutOfRange(hour) => write!(f, "hour out of range: {hour}"),
            Self::MinuteOutOfRange(minute) => write!(f, "minute out of range: {minute}"),
            Self::InvalidDaysOfWeek(bits) => write!(f, "invalid days-of-week mask: {bits:#010b}"),
        }
    }
}

impl Error for AlarmValidationError {}

#[cfg(test)]
mod tests {
    use super::{Alarm, AlarmValidationError, Alarmtone, DaysOfWeek};
    use chrono::{NaiveDate, Weekday};

    fn at(y: i32, m: u32, d: u32, hh: u32, mm: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(hh, mm, 0))
            .expect("valid test timestamp")
    }

    #[test]
    fn new_alarm_uses_defaults() {
        let alarm = Alarm::new(3);
        assert_eq!(alarm.id, 3);
        assert!(!alarm.is_enabled);
        assert_eq!((alarm.hour, alarm.minute), (8, 30));
        assert_eq!(alarm.alarmtone, Alarmtone::Default);
        assert!(alarm.is_one_shot());
        assert!(alarm.validate().is_ok());
    }

    #[test]
    fn days_of_week_set_operations() {
        let days: DaysOfWeek = [Weekday::Mon, Weekday::Fri].into_iter().collect();
        assert!(days.contains(Weekday::Mon));
        assert!(days.contains(Weekday::Fri));
        assert!(!days.contains(Weekday::Sun));
        assert!(!days.without(Weekday::Mon).contains(Weekday::Mon));
        assert_eq!(DaysOfWeek::from_bits_truncate(0xFF), DaysOfWeek::EVERY_DAY);
        assert!(DaysOfWeek::WORKDAYS.matches(
            NaiveDate::from_ymd_opt(2026, 10, 19).expect("valid date")
        ));
    }

    #[test]
    fn validate_rejects_impossible_clock_values() {
        let mut alarm = Alarm::new(1);
        alarm.hour = 24;
        assert_eq!(
            alarm.validate(),
            Err(AlarmValidationError::HourOutOfRange(24))
        );

        alarm.hour = 23;
        alarm.minute = 60;
        assert_eq!(
            alarm.validate(),
            Err(AlarmValidationError::MinuteOutOfRange(60))
        );
    }

    #[test]
    fn one_shot_date_must_be_in_the_future() {
        let mut alarm = Alarm::new(1);
        let now = at(2026, 10, 18, 12, 0);
        assert!(alarm.is_valid_at(now));

        alarm.date = NaiveDate::from_ymd_opt(2026, 10, 18);
        alarm.hour = 12;
        alarm.minute = 0;
        assert!(!alarm.is_valid_at(now));

        alarm.minute = 1;
        assert!(alarm.is_valid_at(now));

        alarm.date = NaiveDate::from_ymd_opt(2026, 10, 17);
        assert!(!alarm.is_valid_at(now));
    }

    #[test]
    fn sound_uri_only_for_explicit_sounds() {
        assert_eq!(Alarmtone::Default.sound_uri(), None);
        assert_eq!(Alarmtone::Silent.sound_uri(), None);
        assert_eq!(
            Alarmtone::Sound("content://tones/7".to_string()).sound_uri(),
            Some("content://tones/7")
        );
    }
}
