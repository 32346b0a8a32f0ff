// SPDX-License-Identifier: Apache-2.0

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::ingest::error::{Error, Result};

/// Exclusive advisory lock on `<state-file>.lock`, held for the duration of a
/// pass. Released on drop.
#[derive(Debug)]
pub struct StateLock {
    // Held to keep the lock; unlocked on drop
    file: File,
    path: PathBuf,
}

impl StateLock {
    /// Try to take the lock for `state_path` without blocking.
    ///
    /// Fails with [`Error::StateLocked`] when another process (or another
    /// handle in this one) already holds it.
    pub fn acquire(state_path: &Path) -> Result<Self> {
        let path = lock_path(state_path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| Error::file_io(parent, e))?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| Error::file_io(&path, e))?;

        if let Err(e) = file.try_lock_exclusive() {
            if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() {
                return Err(Error::StateLocked(state_path.to_path_buf()));
            }
            return Err(Error::file_io(&path, e));
        }

        // Record the holder for whoever finds the lock file
        file.set_len(0).map_err(|e| Error::file_io(&path, e))?;
        writeln!(file, "{}", std::process::id()).map_err(|e| Error::file_io(&path, e))?;

        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn lock_path(state_path: &Path) -> PathBuf {
    let mut name = state_path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_path() {
        assert_eq!(
            lock_path(Path::new("/var/tmp/state.json")),
            PathBuf::from("/var/tmp/state.json.lock")
        );
    }

    #[test]
    fn test_lock_contention() {
        let dir = TempDir::new().unwrap();
        let state = dir.path().join("state.json");

        let held = StateLock::acquire(&state).unwrap();
        assert!(held.path().exists());

        match StateLock::acquire(&state) {
            Err(Error::StateLocked(path)) => assert_eq!(path, state),
            other => panic!("expected StateLocked, got {:?}", other),
        }

        drop(held);
        StateLock::acquire(&state).unwrap();
    }

    #[test]
    fn test_lock_records_pid() {
        let dir = TempDir::new().unwrap();
        let lock = StateLock::acquire(&dir.path().join("state.json")).unwrap();

        let contents = fs::read_to_string(lock.path()).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());
    }
}
