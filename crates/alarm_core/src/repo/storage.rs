//! Durable alarm storage contract and SQLite implementation.
//!
//! # Responsibility
//! - Load every persisted alarm at startup.
//! - Apply single-alarm upserts and deletes issued by the persistence writer.
//!
//! # Invariants
//! - Write paths call `Alarm::validate()` before SQL mutations.
//! - Read paths reject invalid persisted rows instead of masking them.
//! - `delete` of an id that was never stored succeeds.

use crate::db::{open_db, open_db_in_memory, DbError};
use crate::model::alarm::{Alarm, AlarmId, AlarmValidationError, Alarmtone, DaysOfWeek};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

const DATE_FORMAT: &str = "%Y-%m-%d";

const ALARM_SELECT_SQL: &str = "SELECT
    id,
    is_enabled,
    hour,
    minute,
    days_of_week,
    date,
    alarmtone_kind,
    alarmtone_uri,
    label,
    is_prealarm,
    is_vibrate,
    is_delete_after_dismiss
FROM alarms";

pub type RepoResult<T> = Result<T, RepoError>;

/// Storage-level error for alarm persistence.
#[derive(Debug)]
pub enum RepoError {
    Validation(AlarmValidationError),
    Db(DbError),
    InvalidData(String),
    /// The persistence writer thread could not be started.
    WriterSpawn(std::io::Error),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted alarm data: {message}"),
            Self::WriterSpawn(err) => write!(f, "failed to start persistence writer: {err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
            Self::WriterSpawn(err) => Some(err),
        }
    }
}

impl From<AlarmValidationError> for RepoError {
    fn from(value: AlarmValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Durable backing store behind the in-memory repository.
///
/// Implementations are moved onto the persistence writer thread, so they
/// must be `Send` but never need to be `Sync`.
pub trait AlarmStorage: Send {
    /// Returns every stored alarm ordered by id.
    fn load_all(&self) -> RepoResult<Vec<Alarm>>;
    /// Inserts or fully replaces the alarm with `alarm.id`.
    fn upsert(&mut self, alarm: &Alarm) -> RepoResult<()>;
    fn delete(&mut self, id: AlarmId) -> RepoResult<()>;
}

/// SQLite-backed alarm storage owning its connection.
pub struct SqliteAlarmStorage {
    conn: Connection,
}

impl SqliteAlarmStorage {
    /// Wraps an already migrated connection.
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Opens and migrates the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> RepoResult<Self> {
        Ok(Self::new(open_db(path)?))
    }

    pub fn in_memory() -> RepoResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl AlarmStorage for SqliteAlarmStorage {
    fn load_all(&self) -> RepoResult<Vec<Alarm>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ALARM_SELECT_SQL} ORDER BY id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut alarms = Vec::new();
        while let Some(row) = rows.next()? {
            alarms.push(parse_alarm_row(row)?);
        }
        Ok(alarms)
    }

    fn upsert(&mut self, alarm: &Alarm) -> RepoResult<()> {
        alarm.validate()?;

        let (tone_kind, tone_uri) = alarmtone_to_db(&alarm.alarmtone);
        self.conn.execute(
            "INSERT INTO alarms (
                id,
                is_enabled,
                hour,
                minute,
                days_of_week,
                date,
                alarmtone_kind,
                alarmtone_uri,
                label,
                is_prealarm,
                is_vibrate,
                is_delete_after_dismiss
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(id) DO UPDATE SET
                is_enabled = excluded.is_enabled,
                hour = excluded.hour,
                minute = excluded.minute,
                days_of_week = excluded.days_of_week,
                date = excluded.date,
                alarmtone_kind = excluded.alarmtone_kind,
                alarmtone_uri = excluded.alarmtone_uri,
                label = excluded.label,
                is_prealarm = excluded.is_prealarm,
                is_vibrate = excluded.is_vibrate,
                is_delete_after_dismiss = excluded.is_delete_after_dismiss,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                alarm.id,
                alarm.is_enabled,
                alarm.hour,
                alarm.minute,
                alarm.days_of_week.bits(),
                alarm
                    .date
                    .map(|date| date.format(DATE_FORMAT).to_string()),
                tone_kind,
                tone_uri,
                alarm.label.as_str(),
                alarm.is_prealarm,
                alarm.is_vibrate,
                alarm.is_delete_after_dismiss,
            ],
        )?;
        Ok(())
    }

    fn delete(&mut self, id: AlarmId) -> RepoResult<()> {
        self.conn
            .execute("DELETE FROM alarms WHERE id = ?1;", params![id])?;
        Ok(())
    }
}

fn parse_alarm_row(row: &Row<'_>) -> RepoResult<Alarm> {
    let id: AlarmId = row.get("id")?;

    let date = match row.get::<_, Option<String>>("date")? {
        Some(text) => Some(NaiveDate::parse_from_str(&text, DATE_FORMAT).map_err(|_| {
            RepoError::InvalidData(format!("invalid date `{text}` in alarms.date for id {id}"))
        })?),
        None => None,
    };

    let tone_kind: String = row.get("alarmtone_kind")?;
    let tone_uri: Option<String> = row.get("alarmtone_uri")?;
    let alarmtone = parse_alarmtone(&tone_kind, tone_uri).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid alarmtone `{tone_kind}` in alarms.alarmtone_kind for id {id}"
        ))
    })?;

    let alarm = Alarm {
        id,
        is_enabled: row.get("is_enabled")?,
        hour: row.get("hour")?,
        minute: row.get("minute")?,
        days_of_week: DaysOfWeek::from_bits_truncate(row.get("days_of_week")?),
        date,
        alarmtone,
        label: row.get("label")?,
        is_prealarm: row.get("is_prealarm")?,
        is_vibrate: row.get("is_vibrate")?,
        is_delete_after_dismiss: row.get("is_delete_after_dismiss")?,
    };
    alarm.validate()?;
    Ok(alarm)
}

fn alarmtone_to_db(tone: &Alarmtone) -> (&'static str, Option<&str>) {
    match tone {
        Alarmtone::Default => ("default", None),
        Alarmtone::Silent => ("silent", None),
        Alarmtone::Sound(uri) => ("sound", Some(uri.as_str())),
    }
}

fn parse_alarmtone(kind: &str, uri: Option<String>) -> Option<Alarmtone> {
    match (kind, uri) {
        ("default", _) => Some(Alarmtone::Default),
        ("silent", _) => Some(Alarmtone::Silent),
        ("sound", Some(uri)) => Some(Alarmtone::Sound(uri)),
        _ => None,
    }
}
