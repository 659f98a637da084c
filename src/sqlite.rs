//! SQLite key-value store implementation.
//!
//! A persistent string store in a single file:
//! - WAL mode for concurrent readers
//! - Optional byte quota, checked and written under one `BEGIN IMMEDIATE`
//!   transaction

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::store::{validate_key, KeyValueStore};

/// SQLite implementation of KeyValueStore.
pub struct SqliteStore {
    pool: SqlitePool,
    quota: Option<usize>,
}

impl SqliteStore {
    /// Open or create a SQLite store at the given path.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening SQLite store at {:?}", path);

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        let store = Self { pool, quota: None };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        let store = Self { pool, quota: None };
        store.init_schema().await?;
        Ok(store)
    }

    /// Limit the total bytes of keys plus values.
    pub fn with_quota(mut self, quota: usize) -> Self {
        self.quota = Some(quota);
        self
    }

    /// Initialize the database schema.
    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        debug!("SQLite schema initialized");
        Ok(())
    }

    /// Bytes currently used by keys and values.
    pub async fn used_bytes(&self) -> Result<usize> {
        let (used,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0) FROM kv_store",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(used as usize)
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;

        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(value,)| value))
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        validate_key(key)?;

        // Runs detached so a dropped caller cannot strand an open transaction
        // on a pooled connection.
        let pool = self.pool.clone();
        let quota = self.quota;
        let key = key.to_string();
        tokio::spawn(async move { write_entry(&pool, quota, &key, &value).await })
            .await
            .map_err(|e| StoreError::ConnectionError(format!("write task failed: {}", e)))?
    }

    async fn remove(&self, key: &str) -> Result<()> {
        validate_key(key)?;

        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

/// Check the quota and upsert under one write lock.
///
/// `BEGIN IMMEDIATE` takes the lock before the quota read, so concurrent
/// writers queue on `busy_timeout` instead of failing the lock upgrade.
async fn write_entry(
    pool: &SqlitePool,
    quota: Option<usize>,
    key: &str,
    value: &str,
) -> Result<()> {
    let mut conn = pool.acquire().await?;
    sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

    let mut result = upsert_within_quota(&mut *conn, quota, key, value).await;
    if result.is_ok() {
        result = sqlx::query("COMMIT")
            .execute(&mut *conn)
            .await
            .map(|_| ())
            .map_err(StoreError::from);
    }

    if result.is_err() {
        if let Err(e) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
            debug!("rollback after failed write to {:?}: {}", key, e);
        }
    }
    result
}

async fn upsert_within_quota(
    conn: &mut SqliteConnection,
    quota: Option<usize>,
    key: &str,
    value: &str,
) -> Result<()> {
    if let Some(quota) = quota {
        let (others,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0) FROM kv_store WHERE key != ?",
        )
        .bind(key)
        .fetch_one(&mut *conn)
        .await?;

        let needed = others as usize + key.len() + value.len();
        if needed > quota {
            return Err(StoreError::StorageFull(format!(
                "writing {} bytes to {:?} needs {} of {} bytes",
                value.len(),
                key,
                needed,
                quota
            )));
        }
    }

    sqlx::query(
        r#"
        INSERT INTO kv_store (key, value) VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
