//! Alarm repository: reactive handles over asynchronous durable storage.
//!
//! # Responsibility
//! - Own the live set of alarm handles and their identities.
//! - Keep storage details behind the `AlarmStorage` seam.
//!
//! # Invariants
//! - Callers never see persistence failures per mutation; they surface only
//!   at `AlarmRepository::await_stored`.
//! - Operations on a missing handle are silent no-ops for callers.

pub mod alarm_store;
pub mod alarms;
pub mod storage;
pub mod writer;
