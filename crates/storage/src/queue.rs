//! In-memory durable-queue implementation.
//!
//! Two append-only tables with per-table monotonic sequence ids. Batch reads
//! concatenate pending payloads into one JSON array so the worker can hand
//! the result straight to the transport.

use std::sync::{Arc, Mutex};

use contracts::{DurableQueue, PipelineError, QueueBatch, QueueTable, QueuedMessage};
use tracing::debug;

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[derive(Debug, Default)]
struct Table {
    entries: Vec<QueuedMessage>,
    next_id: u64,
}

impl Table {
    fn append(&mut self, payload: &str, created_ms: i64) -> usize {
        self.next_id += 1;
        self.entries.push(QueuedMessage {
            id: self.next_id,
            created_ms,
            payload: payload.to_string(),
        });
        self.entries.len()
    }

    fn read_batch(&self) -> Option<QueueBatch> {
        let last = self.entries.last()?;
        let mut payload = String::from("[");
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                payload.push(',');
            }
            payload.push_str(&entry.payload);
        }
        payload.push(']');
        Some(QueueBatch {
            last_id: last.id,
            payload,
            len: self.entries.len(),
        })
    }
}

/// Append-only in-memory queue, one table per message class
#[derive(Debug, Default)]
pub struct MemoryQueue {
    events: Table,
    people: Table,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&mut self, table: QueueTable) -> &mut Table {
        match table {
            QueueTable::Events => &mut self.events,
            QueueTable::People => &mut self.people,
        }
    }

    fn table_ref(&self, table: QueueTable) -> &Table {
        match table {
            QueueTable::Events => &self.events,
            QueueTable::People => &self.people,
        }
    }

    /// Current depth of a table
    pub fn depth(&self, table: QueueTable) -> usize {
        self.table_ref(table).entries.len()
    }

    /// Copy of the pending entries of a table, in append order
    pub fn snapshot(&self, table: QueueTable) -> Vec<QueuedMessage> {
        self.table_ref(table).entries.clone()
    }
}

impl DurableQueue for MemoryQueue {
    fn append(&mut self, payload: &str, table: QueueTable) -> Result<usize, PipelineError> {
        Ok(self.table(table).append(payload, now_ms()))
    }

    fn read_batch(&mut self, table: QueueTable) -> Result<Option<QueueBatch>, PipelineError> {
        Ok(self.table(table).read_batch())
    }

    fn delete_up_to(&mut self, last_id: u64, table: QueueTable) -> Result<(), PipelineError> {
        let entries = &mut self.table(table).entries;
        entries.retain(|e| e.id > last_id);
        Ok(())
    }

    fn delete_all(&mut self, table: QueueTable) -> Result<(), PipelineError> {
        self.table(table).entries.clear();
        Ok(())
    }

    fn purge_older_than(
        &mut self,
        cutoff_ms: i64,
        table: QueueTable,
    ) -> Result<usize, PipelineError> {
        let entries = &mut self.table(table).entries;
        let before = entries.len();
        entries.retain(|e| e.created_ms >= cutoff_ms);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(table = %table, removed, "Purged expired entries");
        }
        Ok(removed)
    }
}

/// Clone-able wrapper sharing one `MemoryQueue`
///
/// The worker owns its queue handle exclusively; this wrapper lets tests and
/// tools keep a second handle to observe depths after handing one to the
/// worker.
#[derive(Debug, Clone, Default)]
pub struct SharedQueue {
    inner: Arc<Mutex<MemoryQueue>>,
}

impl SharedQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryQueue> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current depth of a table
    pub fn depth(&self, table: QueueTable) -> usize {
        self.lock().depth(table)
    }

    /// Copy of the pending entries of a table, in append order
    pub fn snapshot(&self, table: QueueTable) -> Vec<QueuedMessage> {
        self.lock().snapshot(table)
    }
}

impl DurableQueue for SharedQueue {
    fn append(&mut self, payload: &str, table: QueueTable) -> Result<usize, PipelineError> {
        self.lock().append(payload, table)
    }

    fn read_batch(&mut self, table: QueueTable) -> Result<Option<QueueBatch>, PipelineError> {
        self.lock().read_batch(table)
    }

    fn delete_up_to(&mut self, last_id: u64, table: QueueTable) -> Result<(), PipelineError> {
        self.lock().delete_up_to(last_id, table)
    }

    fn delete_all(&mut self, table: QueueTable) -> Result<(), PipelineError> {
        self.lock().delete_all(table)
    }

    fn purge_older_than(
        &mut self,
        cutoff_ms: i64,
        table: QueueTable,
    ) -> Result<usize, PipelineError> {
        self.lock().purge_older_than(cutoff_ms, table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_returns_depth() {
        let mut queue = MemoryQueue::new();
        assert_eq!(queue.append(r#"{"a":1}"#, QueueTable::Events).unwrap(), 1);
        assert_eq!(queue.append(r#"{"b":2}"#, QueueTable::Events).unwrap(), 2);
        assert_eq!(queue.append(r#"{"c":3}"#, QueueTable::People).unwrap(), 1);
    }

    #[test]
    fn test_read_batch_combines_payloads() {
        let mut queue = MemoryQueue::new();
        queue.append(r#"{"a":1}"#, QueueTable::Events).unwrap();
        queue.append(r#"{"b":2}"#, QueueTable::Events).unwrap();

        let batch = queue.read_batch(QueueTable::Events).unwrap().unwrap();
        assert_eq!(batch.last_id, 2);
        assert_eq!(batch.len, 2);
        assert_eq!(batch.payload, r#"[{"a":1},{"b":2}]"#);
    }

    #[test]
    fn test_read_batch_empty_table() {
        let mut queue = MemoryQueue::new();
        assert!(queue.read_batch(QueueTable::Events).unwrap().is_none());
    }

    #[test]
    fn test_delete_up_to_keeps_later_entries() {
        let mut queue = MemoryQueue::new();
        queue.append(r#"{"a":1}"#, QueueTable::Events).unwrap();
        queue.append(r#"{"b":2}"#, QueueTable::Events).unwrap();
        let batch = queue.read_batch(QueueTable::Events).unwrap().unwrap();

        // Entry appended after the batch was read must survive the delete
        queue.append(r#"{"c":3}"#, QueueTable::Events).unwrap();
        queue.delete_up_to(batch.last_id, QueueTable::Events).unwrap();

        let remaining = queue.snapshot(QueueTable::Events);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].payload, r#"{"c":3}"#);
    }

    #[test]
    fn test_tables_are_independent() {
        let mut queue = MemoryQueue::new();
        queue.append(r#"{"e":1}"#, QueueTable::Events).unwrap();
        queue.append(r#"{"p":1}"#, QueueTable::People).unwrap();

        queue.delete_all(QueueTable::Events).unwrap();
        assert_eq!(queue.depth(QueueTable::Events), 0);
        assert_eq!(queue.depth(QueueTable::People), 1);
    }

    #[test]
    fn test_purge_older_than() {
        let mut queue = MemoryQueue::new();
        queue.append(r#"{"a":1}"#, QueueTable::Events).unwrap();
        queue.append(r#"{"b":2}"#, QueueTable::Events).unwrap();

        // Future cutoff removes everything; epoch cutoff removes nothing
        let removed = queue
            .purge_older_than(i64::MAX, QueueTable::Events)
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(queue.depth(QueueTable::Events), 0);

        queue.append(r#"{"c":3}"#, QueueTable::Events).unwrap();
        let removed = queue.purge_older_than(0, QueueTable::Events).unwrap();
        assert_eq!(removed, 0);
        assert_eq!(queue.depth(QueueTable::Events), 1);
    }

    #[test]
    fn test_shared_queue_observes_worker_side_mutations() {
        let observer = SharedQueue::new();
        let mut worker_handle = observer.clone();

        worker_handle.append(r#"{"a":1}"#, QueueTable::Events).unwrap();
        assert_eq!(observer.depth(QueueTable::Events), 1);

        worker_handle.delete_all(QueueTable::Events).unwrap();
        assert_eq!(observer.depth(QueueTable::Events), 0);
    }

    #[test]
    fn test_ids_not_reused_after_delete() {
        let mut queue = MemoryQueue::new();
        queue.append(r#"{"a":1}"#, QueueTable::Events).unwrap();
        queue.delete_all(QueueTable::Events).unwrap();
        queue.append(r#"{"b":2}"#, QueueTable::Events).unwrap();

        let batch = queue.read_batch(QueueTable::Events).unwrap().unwrap();
        assert_eq!(batch.last_id, 2);
    }
}
