//! Explicit process context.
//!
//! # Responsibility
//! - Build the repository and the edit session once at process start.
//! - Hand both to presentation shells by reference instead of via globals.
//!
//! # Invariants
//! - One context owns exactly one repository and one session over it.

use crate::config::CoreConfig;
use crate::logging::init_logging;
use crate::repo::alarms::AlarmRepository;
use crate::repo::storage::{RepoError, SqliteAlarmStorage};
use crate::repo::writer::PersistError;
use crate::service::edit_session::EditSession;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Error raised while building the context.
#[derive(Debug)]
pub enum ContextError {
    Logging(String),
    Repo(RepoError),
}

impl Display for ContextError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Logging(message) => write!(f, "logging init failed: {message}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ContextError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Logging(_) => None,
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for ContextError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Repository plus edit session, shared by every presentation shell.
#[derive(Clone)]
pub struct AlarmContext {
    repository: AlarmRepository,
    session: Arc<EditSession>,
}

impl AlarmContext {
    /// Starts logging (when configured), opens storage and builds the session.
    pub fn open(config: &CoreConfig) -> Result<Self, ContextError> {
        if let (Some(level), Some(log_dir)) = (&config.log_level, &config.log_dir) {
            init_logging(level, log_dir).map_err(ContextError::Logging)?;
        }

        let storage = match &config.db_path {
            Some(path) => SqliteAlarmStorage::open(path)?,
            None => SqliteAlarmStorage::in_memory()?,
        };
        let repository = AlarmRepository::open(storage, config.retry)?;
        info!(
            "event=context_open module=core status=ok storage={} alarms={}",
            if config.db_path.is_some() { "file" } else { "memory" },
            repository.len()
        );
        Ok(Self::with_repository(repository))
    }

    /// Wraps an already opened repository.
    pub fn with_repository(repository: AlarmRepository) -> Self {
        let session = Arc::new(EditSession::new(repository.clone()));
        Self {
            repository,
            session,
        }
    }

    pub fn repository(&self) -> &AlarmRepository {
        &self.repository
    }

    pub fn session(&self) -> &Arc<EditSession> {
        &self.session
    }

    /// Checkpoint for the host when the UI becomes invisible.
    pub fn on_hidden(&self) -> Result<(), PersistError> {
        self.repository.await_stored()
    }
}
