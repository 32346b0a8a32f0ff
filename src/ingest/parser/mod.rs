// SPDX-License-Identifier: Apache-2.0

//! Line parsing for the detailed nginx access log format.
//!
//! - [`LineParser`] matches one raw line against the fixed grammar
//! - [`LogRecord`] normalizes the captures into typed fields

mod line;
mod record;

pub use line::{DETAILED_PATTERN, LineParser, RawCaptures};
pub use record::{LogRecord, NGINX_TIME_LOCAL_FORMAT, PLACEHOLDER, parse_time_local, record_id};
