// SPDX-License-Identifier: Apache-2.0

//! SQLite record store using sqlx.
//!
//! Useful for single-host deployments and for tests, where `:memory:` gives a
//! throwaway database.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::ingest::parser::LogRecord;
use crate::store::config::BackendType;
use crate::store::error::StoreError;
use crate::store::schema::{INSERT_SQLITE, TABLE_NAME, schema_statements};
use crate::store::traits::RecordStore;

/// SQLite record store
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open a SQLite database at `path`, or an in-memory one for `:memory:`.
    ///
    /// File databases are created if missing.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Connection` if the database cannot be opened.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let memory = path == ":memory:";

        let options = if memory {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| StoreError::connection("invalid SQLite URL", e))?
        } else {
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        };

        // An in-memory database lives and dies with its single connection
        let pool_options = if memory {
            SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(1)
        };

        let pool = pool_options
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await
            .map_err(|e| StoreError::connection("failed to create SQLite pool", e))?;

        debug!(path, "Opened SQLite store.");
        Ok(Self { pool })
    }

    /// In-memory database for testing
    pub async fn memory() -> Result<Self, StoreError> {
        Self::new(":memory:").await
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    fn backend_name(&self) -> &'static str {
        BackendType::Sqlite.as_str()
    }

    async fn initialize(&self) -> Result<(), StoreError> {
        for stmt in schema_statements(BackendType::Sqlite) {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::migration("failed to provision nginx_logs", e))?;
        }
        Ok(())
    }

    async fn write_batch(&self, records: &[LogRecord]) -> Result<u64, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::query("failed to begin transaction", e))?;

        let mut inserted = 0;
        for record in records {
            let result = sqlx::query(INSERT_SQLITE)
                .bind(&record.id)
                .bind(record.timestamp.map(|ts| ts.with_timezone(&Utc)))
                .bind(&record.host)
                .bind(&record.remote_addr)
                .bind(&record.remote_user)
                .bind(&record.request)
                .bind(record.status)
                .bind(record.body_bytes_sent)
                .bind(&record.http_referer)
                .bind(&record.http_user_agent)
                .bind(record.request_time)
                .bind(record.upstream_response_time)
                .bind(record.gzip_ratio)
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::query("failed to insert record", e))?;
            inserted += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::query("failed to commit batch", e))?;

        Ok(inserted)
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {}", TABLE_NAME);
        sqlx::query_scalar(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::query("failed to count records", e))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
