// SPDX-License-Identifier: Apache-2.0

//! Configuration for an ingestion pass.

use std::path::PathBuf;

pub const DEFAULT_LOG_FILE_PATTERN: &str = "/var/log/nginx/*.log";
pub const DEFAULT_STATE_FILE: &str = "/var/tmp/nginx_parser_state.json";
pub const DEFAULT_BATCH_SIZE: usize = 500;
pub const DEFAULT_MAX_LINE_SIZE: usize = 65536;

/// Configuration for the ingestion driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// Glob pattern for candidate log files
    pub pattern: String,
    /// Glob patterns removed from the candidates
    pub exclude: Vec<String>,
    /// Path of the progress state file
    pub state_path: PathBuf,
    /// Records buffered before a store write
    pub batch_size: usize,
    /// Maximum log line size in bytes
    pub max_line_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_LOG_FILE_PATTERN.to_string(),
            exclude: Vec::new(),
            state_path: PathBuf::from(DEFAULT_STATE_FILE),
            batch_size: DEFAULT_BATCH_SIZE,
            max_line_size: DEFAULT_MAX_LINE_SIZE,
        }
    }
}

impl IngestConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.pattern.trim().is_empty() {
            return Err("A log file pattern must be specified".to_string());
        }

        if self.state_path.as_os_str().is_empty() {
            return Err("A state file path must be specified".to_string());
        }

        if self.batch_size == 0 {
            return Err("Batch size must be greater than zero".to_string());
        }

        if self.max_line_size == 0 {
            return Err("Max line size must be greater than zero".to_string());
        }

        Ok(())
    }
}
