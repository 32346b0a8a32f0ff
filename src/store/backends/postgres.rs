// SPDX-License-Identifier: Apache-2.0

//! PostgreSQL record store using sqlx.
//!
//! A pass is short-lived and writes sequentially, so the pool stays small.
//! Pool size can be raised with the `pool_size` query parameter.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::ingest::parser::LogRecord;
use crate::store::config::BackendType;
use crate::store::error::StoreError;
use crate::store::schema::{INSERT_POSTGRES, TABLE_NAME, schema_statements};
use crate::store::traits::RecordStore;

const DEFAULT_POOL_SIZE: u32 = 2;

/// PostgreSQL record store
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect to PostgreSQL.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidConnectionString` if `url` is not a
    /// PostgreSQL URL and `StoreError::Connection` if the connection fails.
    pub async fn new(url: &str, pool_size: Option<u32>) -> Result<Self, StoreError> {
        if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
            return Err(StoreError::InvalidConnectionString(
                "URL must start with postgres:// or postgresql://".into(),
            ));
        }

        let pool = PgPoolOptions::new()
            .max_connections(pool_size.unwrap_or(DEFAULT_POOL_SIZE).max(1))
            .acquire_timeout(Duration::from_secs(30))
            .connect(url)
            .await
            .map_err(|e| StoreError::connection("failed to connect to PostgreSQL", e))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl RecordStore for PostgresStore {
    fn backend_name(&self) -> &'static str {
        BackendType::Postgres.as_str()
    }

    async fn initialize(&self) -> Result<(), StoreError> {
        for stmt in schema_statements(BackendType::Postgres) {
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
            let result = sqlx::query(INSERT_POSTGRES)
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
