//! Background persistence writer.
//!
//! # Responsibility
//! - Own the durable storage on a dedicated thread.
//! - Apply upserts/deletes in submission order with bounded retries.
//! - Answer barriers once every earlier command has been applied.
//!
//! # Invariants
//! - Commands are applied in the order they were submitted.
//! - A barrier reply is sent only after every command queued before it.
//! - A write that exhausted its retries is reported by the next barrier
//!   exactly once.

use crate::config::RetryPolicy;
use crate::model::alarm::{Alarm, AlarmId};
use crate::repo::storage::{AlarmStorage, RepoError, RepoResult};
use crossbeam::channel::{self, Receiver, Sender};
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::thread::{self, JoinHandle};

const WRITER_THREAD_NAME: &str = "alarm-persist";

/// One write that still failed after all retry attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistFailure {
    pub operation: &'static str,
    pub alarm_id: AlarmId,
    pub message: String,
}

/// Error reported by [`PersistWriter::barrier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistError {
    /// Writes since the previous barrier that could not be made durable.
    WriteFailed(Vec<PersistFailure>),
    /// The writer thread is gone; nothing queued can become durable.
    WriterStopped,
}

impl Display for PersistError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WriteFailed(failures) => {
                write!(f, "{} alarm write(s) failed", failures.len())?;
                if let Some(first) = failures.first() {
                    write!(
                        f,
                        "; first: {} of alarm {}: {}",
                        first.operation, first.alarm_id, first.message
                    )?;
                }
                Ok(())
            }
            Self::WriterStopped => write!(f, "persistence writer is not running"),
        }
    }
}

impl Error for PersistError {}

enum PersistCommand {
    Upsert(Alarm),
    Delete(AlarmId),
    Barrier(Sender<Result<(), PersistError>>),
    Shutdown,
}

impl PersistCommand {
    fn target(&self) -> Option<AlarmId> {
        match self {
            Self::Upsert(alarm) => Some(alarm.id),
            Self::Delete(id) => Some(*id),
            Self::Barrier(_) | Self::Shutdown => None,
        }
    }
}

/// Handle to the persistence thread. Dropping it drains the queue and joins.
pub struct PersistWriter {
    commands: Sender<PersistCommand>,
    thread: Option<JoinHandle<()>>,
}

impl PersistWriter {
    /// Moves `storage` onto a new writer thread.
    pub fn spawn(storage: Box<dyn AlarmStorage>, retry: RetryPolicy) -> std::io::Result<Self> {
        let (commands, receiver) = channel::unbounded();
        let thread = thread::Builder::new()
            .name(WRITER_THREAD_NAME.to_string())
            .spawn(move || run_writer(storage, retry, receiver))?;
        Ok(Self {
            commands,
            thread: Some(thread),
        })
    }

    /// Queues a full replacement of `alarm`. Never blocks.
    pub fn upsert(&self, alarm: Alarm) {
        let alarm_id = alarm.id;
        self.submit(PersistCommand::Upsert(alarm), "upsert", alarm_id);
    }

    /// Queues removal of `alarm_id`. Never blocks.
    pub fn delete(&self, alarm_id: AlarmId) {
        self.submit(PersistCommand::Delete(alarm_id), "delete", alarm_id);
    }

    /// Blocks until every previously queued write has been applied.
    ///
    /// # Errors
    /// - `WriteFailed` listing writes that exhausted their retries since the
    ///   previous barrier.
    /// - `WriterStopped` when the writer thread is no longer running.
    pub fn barrier(&self) -> Result<(), PersistError> {
        let (reply_tx, reply_rx) = channel::bounded(1);
        self.commands
            .send(PersistCommand::Barrier(reply_tx))
            .map_err(|_| PersistError::WriterStopped)?;
        reply_rx.recv().map_err(|_| PersistError::WriterStopped)?
    }

    fn submit(&self, command: PersistCommand, operation: &'static str, alarm_id: AlarmId) {
        if self.commands.send(command).is_err() {
            error!(
                "event=persist_submit module=repo status=error operation={operation} alarm_id={alarm_id} error_code=writer_stopped"
            );
        }
    }
}

impl Drop for PersistWriter {
    fn drop(&mut self) {
        let _ = self.commands.send(PersistCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("event=persist_stop module=repo status=error error_code=writer_panicked");
            }
        }
    }
}

fn run_writer(
    mut storage: Box<dyn AlarmStorage>,
    retry: RetryPolicy,
    receiver: Receiver<PersistCommand>,
) {
    info!("event=persist_start module=repo status=ok");
    let mut failures: Vec<PersistFailure> = Vec::new();

    while let Ok(first) = receiver.recv() {
        let mut batch = vec![first];
        batch.extend(receiver.try_iter());

        for command in coalesce(batch) {
            match command {
                PersistCommand::Upsert(alarm) => {
                    let result = with_retry(retry, "upsert", alarm.id, || storage.upsert(&alarm));
                    if let Err(failure) = result {
                        failures.push(failure);
                    }
                }
                PersistCommand::Delete(alarm_id) => {
                    let result = with_retry(retry, "delete", alarm_id, || storage.delete(alarm_id));
                    if let Err(failure) = result {
                        failures.push(failure);
                    }
                }
                PersistCommand::Barrier(reply) => {
                    let outcome = if failures.is_empty() {
                        Ok(())
                    } else {
                        Err(PersistError::WriteFailed(std::mem::take(&mut failures)))
                    };
                    // The caller may have given up waiting; nothing to do then.
                    let _ = reply.send(outcome);
                }
                PersistCommand::Shutdown => {
                    info!(
                        "event=persist_stop module=repo status=ok unreported_failures={}",
                        failures.len()
                    );
                    return;
                }
            }
        }
    }
    info!("event=persist_stop module=repo status=ok reason=disconnected");
}

/// Drops upserts superseded by a later write to the same alarm within the
/// batch. Barriers fence coalescing so their ordering guarantee holds.
fn coalesce(batch: Vec<PersistCommand>) -> Vec<PersistCommand> {
    let mut superseded: HashSet<AlarmId> = HashSet::new();
    let mut kept = Vec::with_capacity(batch.len());

    for command in batch.into_iter().rev() {
        match (&command, command.target()) {
            (PersistCommand::Barrier(_) | PersistCommand::Shutdown, _) => superseded.clear(),
            (PersistCommand::Upsert(_), Some(id)) if !superseded.insert(id) => continue,
            (_, Some(id)) => {
                superseded.insert(id);
            }
            (_, None) => {}
        }
        kept.push(command);
    }

    kept.reverse();
    kept
}

fn with_retry(
    retry: RetryPolicy,
    operation: &'static str,
    alarm_id: AlarmId,
    mut write: impl FnMut() -> RepoResult<()>,
) -> Result<(), PersistFailure> {
    let attempts = retry.attempts();
    let mut backoff = retry.initial_backoff;
    let mut attempt = 1;

    loop {
        let err = match write() {
            Ok(()) => {
                debug!(
                    "event=persist_write module=repo status=ok operation={operation} alarm_id={alarm_id} attempt={attempt}"
                );
                return Ok(());
            }
            Err(err) => err,
        };

        // Validation and decode failures are deterministic; only the
        // database layer gets another chance.
        let retryable = matches!(err, RepoError::Db(_));
        if !retryable || attempt >= attempts {
            error!(
                "event=persist_write module=repo status=error operation={operation} alarm_id={alarm_id} attempt={attempt} error={err}"
            );
            return Err(PersistFailure {
                operation,
                alarm_id,
                message: err.to_string(),
            });
        }

        warn!(
            "event=persist_write module=repo status=retry operation={operation} alarm_id={alarm_id} attempt={attempt} backoff_ms={} error={err}",
            backoff.as_millis()
        );
        thread::sleep(backoff);
        backoff = backoff.saturating_mul(2);
        attempt += 1;
    }
}
