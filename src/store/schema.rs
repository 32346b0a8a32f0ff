// SPDX-License-Identifier: Apache-2.0

//! Table definitions for `nginx_logs`, one dialect per backend.
//!
//! Every statement is idempotent so provisioning can run on each pass.

use crate::store::config::BackendType;

pub const TABLE_NAME: &str = "nginx_logs";

const POSTGRES_SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS nginx_logs (
    id TEXT PRIMARY KEY,
    time_local TIMESTAMPTZ,
    host TEXT,
    remote_addr TEXT,
    remote_user TEXT,
    request TEXT,
    status INT,
    body_bytes_sent BIGINT,
    http_referer TEXT,
    http_user_agent TEXT,
    request_time DOUBLE PRECISION,
    upstream_response_time DOUBLE PRECISION,
    gzip_ratio DOUBLE PRECISION
)"#,
    "CREATE INDEX IF NOT EXISTS idx_nginx_logs_time_local ON nginx_logs (time_local)",
];

const SQLITE_SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS nginx_logs (
    id TEXT PRIMARY KEY,
    time_local TEXT,
    host TEXT,
    remote_addr TEXT,
    remote_user TEXT,
    request TEXT,
    status INTEGER,
    body_bytes_sent INTEGER,
    http_referer TEXT,
    http_user_agent TEXT,
    request_time REAL,
    upstream_response_time REAL,
    gzip_ratio REAL
)"#,
    "CREATE INDEX IF NOT EXISTS idx_nginx_logs_time_local ON nginx_logs (time_local)",
];

/// Placeholders differ per dialect; the column order is shared.
pub(crate) const INSERT_POSTGRES: &str = r#"INSERT INTO nginx_logs (id, time_local, host, remote_addr, remote_user, request,
    status, body_bytes_sent, http_referer, http_user_agent,
    request_time, upstream_response_time, gzip_ratio)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
ON CONFLICT (id) DO NOTHING"#;

pub(crate) const INSERT_SQLITE: &str = r#"INSERT INTO nginx_logs (id, time_local, host, remote_addr, remote_user, request,
    status, body_bytes_sent, http_referer, http_user_agent,
    request_time, upstream_response_time, gzip_ratio)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
ON CONFLICT (id) DO NOTHING"#;

/// DDL statements that provision the table for `backend`.
pub fn schema_statements(backend: BackendType) -> &'static [&'static str] {
    match backend {
        BackendType::Postgres => POSTGRES_SCHEMA,
        BackendType::Sqlite => SQLITE_SCHEMA,
    }
}

/// The DDL as a printable script.
pub fn schema_script(backend: BackendType) -> String {
    schema_statements(backend)
        .iter()
        .map(|stmt| format!("{};\n", stmt))
        .collect()
}
