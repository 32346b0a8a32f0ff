// SPDX-License-Identifier: Apache-2.0

//! Typed access log records and the null/default policy applied to raw captures.

use chrono::{DateTime, FixedOffset};
use sha1::{Digest, Sha1};

use super::line::RawCaptures;

/// Nginx time_local format string for chrono parsing.
pub const NGINX_TIME_LOCAL_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// Value nginx writes for a variable that has no value.
pub const PLACEHOLDER: &str = "-";

/// One parsed access log event, keyed by the hash of its raw line.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// Hex SHA-1 of the raw line bytes
    pub id: String,
    /// `None` when time_local does not parse
    pub timestamp: Option<DateTime<FixedOffset>>,
    pub host: String,
    pub remote_addr: String,
    pub remote_user: Option<String>,
    pub request: Option<String>,
    /// Never defaulted: a missing status has no safe value
    pub status: Option<i32>,
    /// Missing counts are treated as no bytes
    pub body_bytes_sent: i64,
    pub http_referer: Option<String>,
    pub http_user_agent: Option<String>,
    pub request_time: f64,
    pub upstream_response_time: f64,
    pub gzip_ratio: f64,
}

impl LogRecord {
    /// Build a record from the captures of `raw_line`.
    ///
    /// `raw_line` must be the exact bytes the captures were taken from, so that
    /// the id stays reproducible even if normalization changes later.
    pub fn from_captures(caps: &RawCaptures<'_>, raw_line: &[u8]) -> Self {
        Self {
            id: record_id(raw_line),
            timestamp: parse_time_local(caps.time_local),
            host: caps.host.trim().to_string(),
            remote_addr: caps.remote_addr.trim().to_string(),
            remote_user: nullable_string(caps.remote_user),
            request: nullable_string(caps.request),
            status: nullable_number(caps.status),
            body_bytes_sent: nullable_number(caps.body_bytes_sent).unwrap_or(0),
            http_referer: nullable_string(caps.http_referer),
            http_user_agent: nullable_string(caps.http_user_agent),
            request_time: nullable_number(caps.request_time).unwrap_or(0.0),
            upstream_response_time: nullable_number(caps.upstream_response_time).unwrap_or(0.0),
            gzip_ratio: nullable_number(caps.gzip_ratio).unwrap_or(0.0),
        }
    }
}

/// Content-addressed identifier for a raw line.
pub fn record_id(raw_line: &[u8]) -> String {
    hex::encode(Sha1::digest(raw_line))
}

/// Parse nginx `$time_local`. Malformed timestamps yield `None`.
pub fn parse_time_local(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_str(value.trim(), NGINX_TIME_LOCAL_FORMAT).ok()
}

fn is_placeholder(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value == PLACEHOLDER
}

fn nullable_string(value: &str) -> Option<String> {
    if is_placeholder(value) {
        None
    } else {
        Some(value.to_string())
    }
}

fn nullable_number<T: std::str::FromStr>(value: &str) -> Option<T> {
    if is_placeholder(value) {
        return None;
    }
    value.trim().parse().ok()
}
