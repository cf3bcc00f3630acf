//! Alarm domain model.
//!
//! # Responsibility
//! - Define the plain-data alarm record and the edit overlay shape.
//!
//! # Invariants
//! - Model types are values: sharing happens through repository handles,
//!   never through references into a model instance.

pub mod alarm;
pub mod edited;
