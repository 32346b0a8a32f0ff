// SPDX-License-Identifier: Apache-2.0

//! One ingestion pass: rotation check, drain of the retired file, tail of the
//! active file, and commit of the progress state.
//!
//! The progress state is only written after every record of the pass has been
//! accepted by the store. A failure anywhere before that leaves the previous
//! state in place, and the next pass re-reads the same lines; their ids are
//! unchanged so the store discards the repeats.

use std::fs::File;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::ingest::config::IngestConfig;
use crate::ingest::error::{Error, Result};
use crate::ingest::input::{FileFinder, FileId, FileReader, PartialLine};
use crate::ingest::parser::{LineParser, LogRecord};
use crate::ingest::persistence::{LoadOutcome, ProgressState, StateFile};
use crate::store::RecordStore;

/// Per-file line counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineStats {
    /// Raw lines consumed, blank ones included
    pub lines_read: u64,
    /// Lines that produced a record
    pub records_emitted: u64,
    /// Lines that did not fit the grammar or exceeded the max line size
    pub unmatched: u64,
}

impl LineStats {
    fn add(&mut self, other: &LineStats) {
        self.lines_read += other.lines_read;
        self.records_emitted += other.records_emitted;
        self.unmatched += other.unmatched;
    }
}

/// What the drain of a rotated-out file did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainReport {
    pub path: PathBuf,
    pub file_id: FileId,
    pub start_offset: u64,
    pub end_offset: u64,
    pub stats: LineStats,
}

/// Outcome of a committed pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    /// File that was tailed
    pub active_path: PathBuf,
    /// Identity of the tailed file, now recorded in the progress state
    pub file_id: FileId,
    /// Offset the tail started from
    pub start_offset: u64,
    /// Committed offset
    pub offset: u64,
    /// The recorded file was no longer the active one
    pub rotated: bool,
    /// Present when a rotated-out file was found and drained
    pub drained: Option<DrainReport>,
    /// The active file shrank below the recorded offset and was re-read from 0
    pub truncation_reset: bool,
    /// Totals across drain and tail
    pub lines_read: u64,
    pub records_emitted: u64,
    pub records_inserted: u64,
    pub unmatched: u64,
}

/// Buffers records and hands them to the store in batches.
struct BatchWriter<'a> {
    store: &'a dyn RecordStore,
    batch: Vec<LogRecord>,
    batch_size: usize,
    inserted: u64,
}

impl<'a> BatchWriter<'a> {
    fn new(store: &'a dyn RecordStore, batch_size: usize) -> Self {
        Self {
            store,
            batch: Vec::with_capacity(batch_size),
            batch_size,
            inserted: 0,
        }
    }

    async fn push(&mut self, record: LogRecord) -> Result<()> {
        self.batch.push(record);
        if self.batch.len() >= self.batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        if self.batch.is_empty() {
            return Ok(());
        }

        let inserted = self.store.write_batch(&self.batch).await?;
        debug!(batch = self.batch.len(), inserted, "Wrote record batch");
        self.inserted += inserted;
        self.batch.clear();
        Ok(())
    }
}

/// Runs ingestion passes for one log file pattern and one state file.
pub struct IngestionDriver {
    config: IngestConfig,
    finder: FileFinder,
    parser: LineParser,
    state_file: StateFile,
}

impl IngestionDriver {
    pub fn new(config: IngestConfig) -> Result<Self> {
        config.validate().map_err(Error::Config)?;

        let finder = FileFinder::new(config.pattern.clone(), &config.exclude)?;
        let parser = LineParser::new()?;
        let state_file = StateFile::new(config.state_path.clone());

        Ok(Self {
            config,
            finder,
            parser,
            state_file,
        })
    }

    /// Run one complete pass and commit the progress state.
    ///
    /// Holds the state lock for the whole pass. Nothing is committed if file
    /// discovery, reading, or any store write fails.
    pub async fn run_pass(&self, store: &dyn RecordStore) -> Result<PassReport> {
        let _lock = self.state_file.lock()?;

        // RotationCheck
        let prior = self.load_state();
        let active_path = self.finder.select_active()?;
        let active_file =
            File::open(&active_path).map_err(|e| Error::file_io(&active_path, e))?;
        let active_id =
            FileId::from_file(&active_file).map_err(|e| Error::file_io(&active_path, e))?;

        let mut writer = BatchWriter::new(store, self.config.batch_size);
        let mut totals = LineStats::default();
        let mut rotated = false;
        let mut drained = None;
        let mut truncation_reset = false;

        let start_offset = if prior.is_fresh() {
            info!(
                path = %active_path.display(),
                file_id = %active_id,
                "No prior progress, reading from start"
            );
            0
        } else if !prior.matches(&active_id) {
            rotated = true;
            info!(
                previous = ?prior.file_id,
                previous_path = ?prior.path,
                active = %active_id,
                path = %active_path.display(),
                "Detected log rotation"
            );

            // DrainOld
            if let Some(report) = self.drain_rotated(&prior, &mut writer).await? {
                totals.add(&report.stats);
                drained = Some(report);
            }
            0
        } else {
            let len = active_file
                .metadata()
                .map_err(|e| Error::file_io(&active_path, e))?
                .len();
            if len < prior.offset {
                warn!(
                    path = %active_path.display(),
                    offset = prior.offset,
                    len,
                    "Active file is shorter than the recorded offset, re-reading from start"
                );
                truncation_reset = true;
                0
            } else {
                prior.offset
            }
        };

        // TailActive
        let mut reader = FileReader::from_file(
            active_file,
            active_path.clone(),
            start_offset,
            self.config.max_line_size,
            PartialLine::Hold,
        )
        .map_err(|e| Error::file_io(&active_path, e))?;
        let tail = self.ingest(&mut reader, &mut writer).await?;
        totals.add(&tail);
        writer.flush().await?;

        // Committed
        let state = ProgressState::new(active_id, active_path.clone(), reader.offset());
        self.state_file.save(&state)?;
        debug!(
            state_file = %self.state_file.path().display(),
            offset = state.offset,
            "Committed progress state"
        );

        Ok(PassReport {
            active_path,
            file_id: active_id,
            start_offset,
            offset: state.offset,
            rotated,
            drained,
            truncation_reset,
            lines_read: totals.lines_read,
            records_emitted: totals.records_emitted,
            records_inserted: writer.inserted,
            unmatched: totals.unmatched,
        })
    }

    fn load_state(&self) -> ProgressState {
        match self.state_file.load() {
            LoadOutcome::Missing => {
                debug!(state_file = %self.state_file.path().display(), "No progress state file");
                ProgressState::default()
            }
            LoadOutcome::Loaded(state) => {
                if state.inode_only {
                    info!(
                        state_file = %self.state_file.path().display(),
                        "Loaded legacy progress state, it will be rewritten on commit"
                    );
                }
                state
            }
            LoadOutcome::Corrupt(reason) => {
                warn!(
                    state_file = %self.state_file.path().display(),
                    reason = %reason,
                    "Could not read progress state, starting fresh"
                );
                ProgressState::default()
            }
        }
    }

    /// Read what is left of the previously recorded file, if it can still be found.
    async fn drain_rotated(
        &self,
        prior: &ProgressState,
        writer: &mut BatchWriter<'_>,
    ) -> Result<Option<DrainReport>> {
        let found = match prior.file_id {
            Some(id) if !prior.inode_only => self.finder.find_by_id(&id)?,
            Some(_) => self.finder.find_matching(|candidate| prior.matches(candidate))?,
            None => None,
        };

        let Some(path) = found else {
            info!(previous = ?prior.file_id, "Rotated file no longer present, nothing to drain");
            return Ok(None);
        };

        let file = File::open(&path).map_err(|e| Error::file_io(&path, e))?;
        let file_id = FileId::from_file(&file).map_err(|e| Error::file_io(&path, e))?;

        // The retired file gets no more writes, so its last line is final
        let mut reader = FileReader::from_file(
            file,
            path.clone(),
            prior.offset,
            self.config.max_line_size,
            PartialLine::Consume,
        )
        .map_err(|e| Error::file_io(&path, e))?;
        let stats = self.ingest(&mut reader, writer).await?;

        info!(
            path = %path.display(),
            from = prior.offset,
            to = reader.offset(),
            records = stats.records_emitted,
            "Drained rotated file"
        );

        Ok(Some(DrainReport {
            path,
            file_id,
            start_offset: prior.offset,
            end_offset: reader.offset(),
            stats,
        }))
    }

    /// Parse every line from the reader's position to EOF into the writer.
    async fn ingest(
        &self,
        reader: &mut FileReader,
        writer: &mut BatchWriter<'_>,
    ) -> Result<LineStats> {
        let mut stats = LineStats::default();

        while let Some(line) = reader
            .read_line()
            .map_err(|e| Error::file_io(reader.path(), e))?
        {
            stats.lines_read += 1;

            let raw = line.bytes.trim_ascii();
            if raw.is_empty() {
                continue;
            }

            if line.truncated {
                stats.unmatched += 1;
                warn!(
                    path = %reader.path().display(),
                    offset = line.offset,
                    len = line.len,
                    max_line_size = self.config.max_line_size,
                    "Skipping line longer than max line size"
                );
                continue;
            }

            let record = {
                let text = String::from_utf8_lossy(raw);
                match self.parser.parse(&text) {
                    Some(caps) => LogRecord::from_captures(&caps, raw),
                    None => {
                        stats.unmatched += 1;
                        warn!(
                            path = %reader.path().display(),
                            offset = line.offset,
                            "Unmatched line: {}",
                            text
                        );
                        continue;
                    }
                }
            };

            stats.records_emitted += 1;
            writer.push(record).await?;
        }

        Ok(stats)
    }
}

/// One-line summary of a progress state.
pub fn describe_state(state: &ProgressState) -> String {
    match (&state.file_id, &state.path) {
        (None, _) => format!("fresh (offset {})", state.offset),
        (Some(id), Some(path)) => {
            format!("{} [{}] at offset {}", path.display(), id, state.offset)
        }
        (Some(id), None) => format!("[{}] at offset {}", id, state.offset),
    }
}
