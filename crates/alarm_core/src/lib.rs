//! Core alarm state for the alarm clock app.
//! This crate is the single source of truth for alarm invariants: the
//! durable alarm collection, the single active edit, and change propagation
//! to every observer.

pub mod config;
pub mod context;
pub mod db;
pub mod logging;
pub mod model;
pub mod observe;
pub mod repo;
pub mod service;

pub use config::{CoreConfig, RetryPolicy};
pub use context::{AlarmContext, ContextError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::alarm::{Alarm, AlarmId, AlarmValidationError, Alarmtone, DaysOfWeek};
pub use model::edited::{EditedAlarm, RowHolder};
pub use observe::{
    Broadcast, CallbackSubscription, Disposable, DisposableGroup, Observable, Subscription,
};
pub use repo::alarm_store::AlarmStore;
pub use repo::alarms::{AlarmRepository, ToneChange, ToneChangeOrigin};
pub use repo::storage::{AlarmStorage, RepoError, RepoResult, SqliteAlarmStorage};
pub use repo::writer::{PersistError, PersistFailure};
pub use service::edit_session::EditSession;
pub use service::saved_state::{ProcessGeneration, SavedEditState, SavedSession, SavedStateError};

/// Minimal health-check API for host integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
