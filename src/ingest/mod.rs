// SPDX-License-Identifier: Apache-2.0

//! Incremental, rotation-aware ingestion of nginx access logs.

pub mod config;
pub mod driver;
pub mod error;
pub mod input;
pub mod parser;
pub mod persistence;

pub use config::IngestConfig;
pub use driver::{DrainReport, IngestionDriver, LineStats, PassReport, describe_state};
pub use error::{Error, Result};
