// SPDX-License-Identifier: Apache-2.0

//! Persistence schema definitions for the progress state file.
//!
//! Two on-disk formats are understood:
//! - legacy: `{"inode": <n|null>, "offset": <n>}`, no version field and no device
//! - v1: `{"version": 1, "dev": .., "ino": .., "path": "..", "offset": ..}`
//!
//! Only v1 is ever written.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::ingest::input::FileId;

/// Current schema version for persisted state
pub const PERSISTED_STATE_VERSION: u8 = 1;

/// Persisted progress state (v1)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedStateV1 {
    /// Schema version (always 1 for this format)
    pub version: u8,
    /// Device ID (Unix) or volume serial (Windows)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev: Option<u64>,
    /// Inode number (Unix) or file index (Windows)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ino: Option<u64>,
    /// Last known path, for humans reading the file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub offset: u64,
}

/// Legacy persisted state (no version field, inode only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedStateLegacy {
    #[serde(default)]
    pub inode: Option<u64>,
    pub offset: u64,
}

/// Any state format found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PersistedState {
    V1(PersistedStateV1),
    Legacy(PersistedStateLegacy),
}

/// The durable cursor of the ingestion engine: which file has been read up to
/// which byte.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressState {
    /// Identity of the file the offset belongs to; `None` before any file was seen
    pub file_id: Option<FileId>,
    /// Bytes before this offset are fully ingested
    pub offset: u64,
    /// Last known path of the file (informational)
    pub path: Option<PathBuf>,
    /// The identity came from a legacy state that only recorded the inode
    pub inode_only: bool,
}

impl ProgressState {
    pub fn new(file_id: FileId, path: impl Into<PathBuf>, offset: u64) -> Self {
        Self {
            file_id: Some(file_id),
            offset,
            path: Some(path.into()),
            inode_only: false,
        }
    }

    /// True when no file has ever been recorded.
    pub fn is_fresh(&self) -> bool {
        self.file_id.is_none()
    }

    /// Whether `id` names the same physical file as the recorded identity.
    ///
    /// Legacy states carry no device number, so only the inode is compared.
    pub fn matches(&self, id: &FileId) -> bool {
        match &self.file_id {
            None => false,
            Some(prior) if self.inode_only => prior.same_inode(id),
            Some(prior) => prior == id,
        }
    }
}

impl From<&ProgressState> for PersistedStateV1 {
    fn from(state: &ProgressState) -> Self {
        Self {
            version: PERSISTED_STATE_VERSION,
            dev: state.file_id.map(|id| id.dev()),
            ino: state.file_id.map(|id| id.ino()),
            path: state.path.as_ref().map(|p| p.to_string_lossy().into_owned()),
            offset: state.offset,
        }
    }
}

impl TryFrom<PersistedState> for ProgressState {
    type Error = String;

    fn try_from(persisted: PersistedState) -> Result<Self, Self::Error> {
        match persisted {
            PersistedState::V1(v1) => {
                if v1.version != PERSISTED_STATE_VERSION {
                    return Err(format!("unsupported state version {}", v1.version));
                }
                let file_id = match (v1.dev, v1.ino) {
                    (Some(dev), Some(ino)) => Some(FileId::new(dev, ino)),
                    (None, None) => None,
                    _ => return Err("incomplete file identity".to_string()),
                };
                Ok(Self {
                    file_id,
                    offset: v1.offset,
                    path: v1.path.map(PathBuf::from),
                    inode_only: false,
                })
            }
            PersistedState::Legacy(legacy) => Ok(Self {
                file_id: legacy.inode.map(|ino| FileId::new(0, ino)),
                offset: legacy.offset,
                path: None,
                inode_only: legacy.inode.is_some(),
            }),
        }
    }
}
