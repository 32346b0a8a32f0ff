// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;

use crate::ingest::parser::LogRecord;
use crate::store::error::StoreError;

/// Destination for parsed records.
///
/// Writes are insert-if-absent keyed by [`LogRecord::id`]: a duplicate id is
/// neither an error nor an overwrite, which makes re-reading lines after a
/// failed pass harmless.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;

    /// Provision the table. Safe to call on every pass.
    ///
    /// # Errors
    /// * `StoreError::Migration` - DDL failed
    async fn initialize(&self) -> Result<(), StoreError>;

    /// Durably write a batch in one transaction.
    ///
    /// Returns the number of records actually inserted; duplicates are skipped
    /// and not counted. Nothing from the batch is visible if this fails.
    ///
    /// # Errors
    /// * `StoreError::Query` - insert or commit failed
    async fn write_batch(&self, records: &[LogRecord]) -> Result<u64, StoreError>;

    /// Write one record. Returns `true` if it was new.
    async fn write(&self, record: &LogRecord) -> Result<bool, StoreError> {
        let inserted = self.write_batch(std::slice::from_ref(record)).await?;
        Ok(inserted > 0)
    }

    /// Total number of stored records
    async fn count(&self) -> Result<i64, StoreError>;

    /// Close the connection pool
    async fn close(&self);
}
