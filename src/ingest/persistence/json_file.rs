// SPDX-License-Identifier: Apache-2.0

//! JSON file-based persistence with atomic writes.
//!
//! Writes go to a uniquely named temp file next to the target, are flushed and
//! synced, and then renamed over the target, so readers only ever see the old
//! or the new state.

use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::lock::StateLock;
use super::schema::{PersistedState, PersistedStateV1, ProgressState};
use crate::ingest::error::{Error, Result};

/// Result of reading the state file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No state file exists yet
    Missing,
    /// A valid state was read
    Loaded(ProgressState),
    /// The file exists but could not be read or parsed
    Corrupt(String),
}

impl LoadOutcome {
    /// The state to start the pass from. Missing and corrupt files both mean a
    /// fresh start.
    pub fn into_state(self) -> ProgressState {
        match self {
            LoadOutcome::Loaded(state) => state,
            LoadOutcome::Missing | LoadOutcome::Corrupt(_) => ProgressState::default(),
        }
    }
}

/// Handle to the progress state file on disk.
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take the exclusive lock guarding this state file.
    pub fn lock(&self) -> Result<StateLock> {
        StateLock::acquire(&self.path)
    }

    /// Read the state file. Never fails: problems are reported as
    /// [`LoadOutcome::Corrupt`] for the caller to log.
    pub fn load(&self) -> LoadOutcome {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return LoadOutcome::Missing,
            Err(e) => return LoadOutcome::Corrupt(format!("failed to read state file: {}", e)),
        };

        let persisted: PersistedState = match serde_json::from_str(&contents) {
            Ok(persisted) => persisted,
            Err(e) => return LoadOutcome::Corrupt(format!("failed to parse state file: {}", e)),
        };

        match ProgressState::try_from(persisted) {
            Ok(state) => LoadOutcome::Loaded(state),
            Err(reason) => LoadOutcome::Corrupt(reason),
        }
    }

    /// Atomically replace the state file with `state` in v1 format.
    pub fn save(&self, state: &ProgressState) -> Result<()> {
        atomic_write(&self.path, &PersistedStateV1::from(state))
    }
}

/// Atomically write state to a file using temp file + rename
fn atomic_write(path: &Path, state: &PersistedStateV1) -> Result<()> {
    use portable_atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::Persistence(format!("failed to create parent directory: {}", e))
            })?;
        }
    }

    // Process ID plus a counter keeps concurrent writers off each other's temp file
    let unique_id = COUNTER.fetch_add(1, Ordering::SeqCst);
    let temp_path = path.with_extension(format!("tmp.{}.{}", std::process::id(), unique_id));

    let result = write_synced(&temp_path, state).and_then(|_| {
        fs::rename(&temp_path, path)
            .map_err(|e| Error::Persistence(format!("failed to rename state file: {}", e)))
    });

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn write_synced(temp_path: &Path, state: &PersistedStateV1) -> Result<()> {
    let file = File::create(temp_path)
        .map_err(|e| Error::Persistence(format!("failed to create temp file: {}", e)))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, state)
        .map_err(|e| Error::Persistence(format!("failed to write state: {}", e)))?;

    writer
        .flush()
        .map_err(|e| Error::Persistence(format!("failed to flush state: {}", e)))?;
    writer
        .get_ref()
        .sync_all()
        .map_err(|e| Error::Persistence(format!("failed to sync state: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::input::FileId;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let file = StateFile::new(dir.path().join("state.json"));

        assert_eq!(file.load(), LoadOutcome::Missing);
        assert!(file.load().into_state().is_fresh());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let file = StateFile::new(dir.path().join("state.json"));

        let state = ProgressState::new(FileId::new(7, 42), "/var/log/nginx/access.log", 1234);
        file.save(&state).unwrap();

        assert_eq!(file.load(), LoadOutcome::Loaded(state));
    }

    #[test]
    fn test_save_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let file = StateFile::new(dir.path().join("nested/deeper/state.json"));

        file.save(&ProgressState::default()).unwrap();
        assert!(file.path().exists());
    }

    #[test]
    fn test_save_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let file = StateFile::new(dir.path().join("state.json"));

        for offset in 0..5 {
            file.save(&ProgressState::new(FileId::new(1, 2), "/a", offset))
                .unwrap();
        }

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        match file.load() {
            LoadOutcome::Loaded(state) => assert_eq!(state.offset, 4),
            other => panic!("expected loaded state, got {:?}", other),
        }
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let file = StateFile::new(&path);

        for contents in ["", "{not json", r#"{"version":1,"dev":1,"offset":3}"#] {
            fs::write(&path, contents).unwrap();
            let outcome = file.load();
            assert!(
                matches!(outcome, LoadOutcome::Corrupt(_)),
                "{:?} gave {:?}",
                contents,
                outcome
            );
            assert!(outcome.into_state().is_fresh());
        }
    }

    #[test]
    fn test_legacy_file_rewritten_as_v1() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, r#"{"inode": 555, "offset": 10}"#).unwrap();
        let file = StateFile::new(&path);

        let state = file.load().into_state();
        assert!(state.inode_only);
        assert_eq!(state.offset, 10);

        file.save(&ProgressState::new(FileId::new(3, 555), "/a.log", 20))
            .unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains(r#""version":1"#));
        assert!(!raw.contains("inode"));
    }
}
