//! Core use-case services.
//!
//! # Responsibility
//! - Coordinate the single active alarm edit on top of the repository.
//! - Keep presentation shells decoupled from handle and storage details.

pub mod edit_session;
pub mod saved_state;
