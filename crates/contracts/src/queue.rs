//! DurableQueue trait - the on-device pending-message store interface
//!
//! Append-only, per-table. The worker is the only caller, so implementations
//! need no internal locking beyond what sharing across tests requires.

use crate::{PipelineError, QueueBatch, QueueTable};

/// Persisted outbound-message store, one table per message class
pub trait DurableQueue: Send {
    /// Append a wire-format entry; returns the resulting table depth
    fn append(&mut self, payload: &str, table: QueueTable) -> Result<usize, PipelineError>;

    /// Read all pending entries for a table as one batch
    ///
    /// Returns `None` when the table is empty. Entries appended after the
    /// read are not part of the returned range.
    fn read_batch(&mut self, table: QueueTable) -> Result<Option<QueueBatch>, PipelineError>;

    /// Delete entries with id <= `last_id` (an acknowledged or discarded batch)
    fn delete_up_to(&mut self, last_id: u64, table: QueueTable) -> Result<(), PipelineError>;

    /// Delete every entry in the table
    fn delete_all(&mut self, table: QueueTable) -> Result<(), PipelineError>;

    /// Drop entries created before `cutoff_ms`; returns how many were removed
    fn purge_older_than(&mut self, cutoff_ms: i64, table: QueueTable)
        -> Result<usize, PipelineError>;
}
