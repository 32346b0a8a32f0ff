// SPDX-License-Identifier: Apache-2.0

use glob::glob;
use std::path::PathBuf;
use std::time::SystemTime;
use tracing::debug;

use super::file_id::FileId;
use crate::ingest::error::{Error, Result};

/// FileFinder resolves the candidate log files behind a glob pattern.
///
/// The active file is the most recently modified candidate; a rotated-out
/// file is found again by its [`FileId`].
#[derive(Debug, Clone)]
pub struct FileFinder {
    include: String,
    exclude: Vec<glob::Pattern>,
}

impl FileFinder {
    /// Create a new FileFinder for the include pattern, skipping anything that
    /// matches one of the exclude patterns.
    pub fn new(include: impl Into<String>, exclude: &[String]) -> Result<Self> {
        let include = include.into();
        glob::Pattern::new(&include).map_err(|e| Error::InvalidGlob(format!("{include}: {e}")))?;

        let exclude = exclude
            .iter()
            .map(|p| glob::Pattern::new(p).map_err(|e| Error::InvalidGlob(format!("{p}: {e}"))))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { include, exclude })
    }

    /// Find all regular files matching the include pattern.
    pub fn find_files(&self) -> Result<Vec<PathBuf>> {
        let matches = glob(&self.include).map_err(|e| Error::InvalidGlob(e.to_string()))?;

        let mut paths = Vec::new();
        for entry in matches {
            let path = match entry {
                Ok(path) => path,
                // Unreadable directory entries are not candidates
                Err(e) => {
                    debug!(error = %e, "Skipping unreadable glob entry");
                    continue;
                }
            };

            if path.is_dir() {
                continue;
            }

            if self.exclude.iter().any(|p| p.matches_path(&path)) {
                continue;
            }

            paths.push(path);
        }

        Ok(paths)
    }

    /// Select the currently active log file: the candidate with the most
    /// recent modification time. Ties go to the greater path so the choice is
    /// stable between runs.
    pub fn select_active(&self) -> Result<PathBuf> {
        let mut best: Option<(SystemTime, PathBuf)> = None;

        for path in self.find_files()? {
            // The file may have been removed since the glob ran
            let modified = match path.metadata().and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Skipping candidate without mtime");
                    continue;
                }
            };

            let newer = match &best {
                None => true,
                Some((best_time, best_path)) => {
                    modified > *best_time || (modified == *best_time && path > *best_path)
                }
            };
            if newer {
                best = Some((modified, path));
            }
        }

        best.map(|(_, path)| path)
            .ok_or_else(|| Error::NoFilesFound(self.include.clone()))
    }

    /// Re-expand the pattern and return the first path whose identity equals `id`.
    pub fn find_by_id(&self, id: &FileId) -> Result<Option<PathBuf>> {
        self.find_matching(|candidate| candidate == id)
    }

    /// Re-expand the pattern and return the first path whose identity satisfies
    /// the predicate. Returns `None` when the file no longer exists.
    pub fn find_matching<F>(&self, predicate: F) -> Result<Option<PathBuf>>
    where
        F: Fn(&FileId) -> bool,
    {
        for path in self.find_files()? {
            match FileId::from_path(&path) {
                Ok(candidate) if predicate(&candidate) => return Ok(Some(path)),
                Ok(_) => {}
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Skipping candidate without identity");
                }
            }
        }
        Ok(None)
    }
}
