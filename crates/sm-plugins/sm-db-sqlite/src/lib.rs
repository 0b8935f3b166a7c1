//! # sm-db-sqlite
//!
//! Maps the `sm-core` domain onto SQLite through sqlx. Each port trait lives
//! in its own module; they all share one [`SqliteRepo`] and the column
//! helpers below.
//!
//! Identifiers are stored as 16-byte blobs, timestamps as fixed-width
//! RFC 3339 UTC text and money as decimal text.

mod catalog;
mod orders;
mod support;
mod users;

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use sm_core::error::{AppError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

/// All six repository ports over one connection pool.
#[derive(Clone)]
pub struct SqliteRepo {
    pool: SqlitePool,
}

impl SqliteRepo {
    /// Opens (creating if needed) the database at `url` and applies migrations.
    ///
    /// In-memory databases are pinned to a single connection that never
    /// recycles, otherwise each new connection would see an empty database.
    pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");

        let mut options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(max_connections.max(1))
                .connect_with(options)
                .await?
        };

        sqlx::migrate!("./migrations").run(&pool).await?;
        log::info!("sqlite store ready at {url}");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

// ── error mapping ───────────────────────────────────────────────────────────

pub(crate) fn db_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict("record already exists".into())
        }
        _ => {
            log::error!("sqlite: {err}");
            AppError::Internal(format!("database error: {err}"))
        }
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

pub(crate) trait DbExt<T> {
    fn db(self) -> Result<T>;
}

impl<T> DbExt<T> for std::result::Result<T, sqlx::Error> {
    fn db(self) -> Result<T> {
        self.map_err(db_error)
    }
}

fn corrupt(column: &str, detail: impl std::fmt::Display) -> AppError {
    AppError::Internal(format!("corrupt value in column '{column}': {detail}"))
}

// ── value encoding ──────────────────────────────────────────────────────────

pub(crate) fn uuid_to_blob(id: Uuid) -> Vec<u8> {
    id.as_bytes().to_vec()
}

pub(crate) fn blob_to_uuid(blob: &[u8]) -> Result<Uuid> {
    Uuid::from_slice(blob).map_err(|err| corrupt("id", err))
}

pub(crate) fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses a stored timestamp. Offset-less values (written by hand or by
/// older tooling) are taken to be UTC.
pub fn parse_utc(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| corrupt("timestamp", raw))
}

// ── column readers ──────────────────────────────────────────────────────────

pub(crate) fn id_col(row: &SqliteRow, column: &str) -> Result<Uuid> {
    let blob: Vec<u8> = row.try_get(column).db()?;
    blob_to_uuid(&blob)
}

pub(crate) fn opt_id_col(row: &SqliteRow, column: &str) -> Result<Option<Uuid>> {
    let blob: Option<Vec<u8>> = row.try_get(column).db()?;
    blob.as_deref().map(blob_to_uuid).transpose()
}

pub(crate) fn ts_col(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>> {
    let raw: String = row.try_get(column).db()?;
    parse_utc(&raw)
}

pub(crate) fn decimal_col(row: &SqliteRow, column: &str) -> Result<Decimal> {
    let raw: String = row.try_get(column).db()?;
    Decimal::from_str(&raw).map_err(|err| corrupt(column, err))
}

pub(crate) fn json_col<T: DeserializeOwned>(row: &SqliteRow, column: &str) -> Result<T> {
    let raw: String = row.try_get(column).db()?;
    serde_json::from_str(&raw).map_err(|err| corrupt(column, err))
}

pub(crate) fn parse_col<T>(row: &SqliteRow, column: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw: String = row.try_get(column).db()?;
    raw.parse().map_err(|err| corrupt(column, err))
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|err| AppError::Internal(format!("encode failed: {err}")))
}
