// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use thiserror::Error;

use crate::store::StoreError;

/// Failures that abort an ingestion pass.
///
/// Line-level problems (unmatched lines, bad timestamps) and a corrupt state
/// file never surface here; they are logged and the pass continues.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error on {path}: {source}")]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No log files match pattern: {0}")]
    NoFilesFound(String),

    #[error("Invalid glob pattern: {0}")]
    InvalidGlob(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Progress state {0} is locked by another running pass")]
    StateLocked(PathBuf),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl Error {
    pub(crate) fn file_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileIo {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
