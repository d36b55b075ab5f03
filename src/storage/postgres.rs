//! Shared sequence store on PostgreSQL.
//!
//! Every process and host pointing at the same database shares one counter
//! per day. The increment is a single `INSERT ... ON CONFLICT DO UPDATE ...
//! RETURNING` statement: Postgres takes the row lock, applies `counter + 1`
//! against the latest committed value, and hands the result back in the same
//! round trip. Concurrent callers for today's row queue on that lock.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::contracts::env::parse_or_default;
use crate::contracts::{DateKey, DaySequence, DaySequenceStore, StorageError, StoreInfo};

const CREATE_TABLE: &str = "\
CREATE TABLE IF NOT EXISTS day_sequences (
    date TEXT PRIMARY KEY,
    counter BIGINT NOT NULL DEFAULT 0 CHECK (counter >= 0),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
)";

const UPSERT_INCREMENT: &str = "\
INSERT INTO day_sequences (date, counter, updated_at)
VALUES ($1, 1, now())
ON CONFLICT (date) DO UPDATE
    SET counter = day_sequences.counter + 1,
        updated_at = now()
RETURNING counter, updated_at";

const SELECT_DAY: &str = "SELECT counter, updated_at FROM day_sequences WHERE date = $1";

/// SQLSTATE serialization_failure
const SERIALIZATION_FAILURE: &str = "40001";
/// SQLSTATE deadlock_detected
const DEADLOCK_DETECTED: &str = "40P01";
/// SQLSTATE lock_not_available
const LOCK_NOT_AVAILABLE: &str = "55P03";

/// Connection pool settings.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            acquire_timeout: Duration::from_millis(2_000),
        }
    }

    /// Reads pool settings from the environment.
    ///
    /// - `TRACKSEQ_DB_MAX_CONNECTIONS`: pool size (default: 10)
    /// - `TRACKSEQ_DB_ACQUIRE_TIMEOUT_MS`: pool acquire timeout (default: 2000)
    pub fn from_env(url: impl Into<String>) -> Self {
        let default = Self::new(url);
        let acquire_ms = parse_or_default(
            "TRACKSEQ_DB_ACQUIRE_TIMEOUT_MS",
            std::env::var("TRACKSEQ_DB_ACQUIRE_TIMEOUT_MS").ok(),
            default.acquire_timeout.as_millis() as u64,
        );
        Self {
            max_connections: parse_or_default(
                "TRACKSEQ_DB_MAX_CONNECTIONS",
                std::env::var("TRACKSEQ_DB_MAX_CONNECTIONS").ok(),
                default.max_connections,
            ),
            acquire_timeout: Duration::from_millis(acquire_ms),
            ..default
        }
    }

    fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
    }
}

/// PostgreSQL-backed `DaySequenceStore`.
pub struct PostgresSequenceStore {
    pool: PgPool,
    location: String,
}

impl PostgresSequenceStore {
    /// Connects and makes sure the `day_sequences` table exists.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, StorageError> {
        let pool = config
            .pool_options()
            .connect(&config.url)
            .await
            .map_err(map_connect_err)?;
        let store = Self {
            pool,
            location: redact_url(&config.url),
        };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Builds the pool without connecting. Failures surface on first use.
    pub fn connect_lazy(config: &PostgresConfig) -> Result<Self, StorageError> {
        let pool = config
            .pool_options()
            .connect_lazy(&config.url)
            .map_err(map_connect_err)?;
        Ok(Self {
            pool,
            location: redact_url(&config.url),
        })
    }

    /// Creates the `day_sequences` table if it is missing.
    pub async fn ensure_schema(&self) -> Result<(), StorageError> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }

    fn to_row(
        date: DateKey,
        counter: i64,
        updated_at: DateTime<Utc>,
    ) -> Result<DaySequence, StorageError> {
        let counter = u64::try_from(counter).map_err(|_| StorageError::Corrupt {
            date,
            detail: format!("negative counter {}", counter),
        })?;
        Ok(DaySequence {
            date,
            counter,
            updated_at: Some(updated_at),
        })
    }
}

impl DaySequenceStore for PostgresSequenceStore {
    async fn increment(&self, date: DateKey) -> Result<DaySequence, StorageError> {
        let (counter, updated_at): (i64, DateTime<Utc>) = sqlx::query_as(UPSERT_INCREMENT)
            .bind(date.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_row_err(date, e))?;
        Self::to_row(date, counter, updated_at)
    }

    async fn get(&self, date: DateKey) -> Result<Option<DaySequence>, StorageError> {
        let row: Option<(i64, DateTime<Utc>)> = sqlx::query_as(SELECT_DAY)
            .bind(date.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_row_err(date, e))?;
        row.map(|(counter, updated_at)| Self::to_row(date, counter, updated_at))
            .transpose()
    }

    async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }

    fn store_info(&self) -> StoreInfo {
        StoreInfo {
            storage_type: "postgres".into(),
            location: self.location.clone(),
        }
    }
}

fn map_connect_err(e: sqlx::Error) -> StorageError {
    StorageError::Unavailable(format!("failed to connect: {}", e))
}

/// Decode failures on a day row mean the stored value is not a counter.
fn map_row_err(date: DateKey, e: sqlx::Error) -> StorageError {
    match e {
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => StorageError::Corrupt {
            date,
            detail: e.to_string(),
        },
        other => map_sqlx_err(other),
    }
}

fn map_sqlx_err(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some(SERIALIZATION_FAILURE | DEADLOCK_DETECTED | LOCK_NOT_AVAILABLE) => {
                StorageError::Conflict(e.to_string())
            }
            _ => StorageError::Unavailable(e.to_string()),
        },
        sqlx::Error::Io(_) => StorageError::Io(e.to_string()),
        _ => StorageError::Unavailable(e.to_string()),
    }
}

/// Strips the password from a connection URL for logs and `/stats`.
fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    match rest.rsplit_once('@') {
        Some((userinfo, host)) => {
            let user = userinfo.split(':').next().unwrap_or_default();
            format!("{}://{}:***@{}", scheme, user, host)
        }
        None => url.to_string(),
    }
}
