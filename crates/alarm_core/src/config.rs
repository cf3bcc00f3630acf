//! Core configuration.
//!
//! # Responsibility
//! - Collect the knobs a host passes once at process start.
//!
//! # Invariants
//! - `Default` values are usable without any host input except `db_path`
//!   (in-memory storage when `None`).

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(20);

/// Bounded retry schedule for one persistence write.
///
/// Total time spent on one write is at most
/// `initial_backoff * (2^(max_attempts - 1) - 1)` plus the attempts
/// themselves, so a barrier can never wait forever on a failing write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per write, including the first one. Values below 1 act as 1.
    pub max_attempts: u32,
    /// Pause after the first failed attempt; doubled after every failure.
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    /// Single attempt, no sleeping.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
        }
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
        }
    }
}

/// Process-level configuration consumed by [`AlarmContext`](crate::AlarmContext).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoreConfig {
    /// SQLite file; `None` keeps alarms in memory for this process only.
    pub db_path: Option<PathBuf>,
    pub retry: RetryPolicy,
    /// Log level passed to `init_logging`; `None` leaves logging untouched.
    pub log_level: Option<String>,
    /// Absolute directory for rolling log files.
    pub log_dir: Option<PathBuf>,
}

impl CoreConfig {
    pub fn with_db_path(path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: Some(path.into()),
            ..Self::default()
        }
    }
}
