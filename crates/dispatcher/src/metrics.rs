//! Worker metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Metrics for a single worker
#[derive(Debug, Default)]
pub struct WorkerMetrics {
    /// Last observed queue depth (events table)
    queue_depth: AtomicUsize,
    /// Total records enqueued
    enqueued_count: AtomicU64,
    /// Total flushes that actually sent at least one batch
    flush_count: AtomicU64,
    /// Total records acknowledged by the collector
    sent_count: AtomicU64,
    /// Total records discarded on unrecoverable failures
    discarded_count: AtomicU64,
    /// Total commands dropped after the worker died
    dropped_command_count: AtomicU64,
}

impl WorkerMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Get last observed queue depth
    pub fn queue_depth(&self) -> usize {
        self.queue_depth.load(Ordering::Relaxed)
    }

    /// Set last observed queue depth
    pub fn set_queue_depth(&self, depth: usize) {
        self.queue_depth.store(depth, Ordering::Relaxed);
    }

    /// Get total enqueued records
    pub fn enqueued_count(&self) -> u64 {
        self.enqueued_count.load(Ordering::Relaxed)
    }

    /// Increment enqueued count
    pub fn inc_enqueued_count(&self) {
        self.enqueued_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get sending-flush count
    pub fn flush_count(&self) -> u64 {
        self.flush_count.load(Ordering::Relaxed)
    }

    /// Increment sending-flush count
    pub fn inc_flush_count(&self) {
        self.flush_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get acknowledged-record count
    pub fn sent_count(&self) -> u64 {
        self.sent_count.load(Ordering::Relaxed)
    }

    /// Add acknowledged records
    pub fn add_sent_count(&self, n: u64) {
        self.sent_count.fetch_add(n, Ordering::Relaxed);
    }

    /// Get discarded-record count
    pub fn discarded_count(&self) -> u64 {
        self.discarded_count.load(Ordering::Relaxed)
    }

    /// Add discarded records
    pub fn add_discarded_count(&self, n: u64) {
        self.discarded_count.fetch_add(n, Ordering::Relaxed);
    }

    /// Get dropped-command count
    pub fn dropped_command_count(&self) -> u64 {
        self.dropped_command_count.load(Ordering::Relaxed)
    }

    /// Increment dropped-command count
    pub fn inc_dropped_command_count(&self) {
        self.dropped_command_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_depth: self.queue_depth(),
            enqueued_count: self.enqueued_count(),
            flush_count: self.flush_count(),
            sent_count: self.sent_count(),
            discarded_count: self.discarded_count(),
            dropped_command_count: self.dropped_command_count(),
        }
    }
}

/// Snapshot of worker metrics (for reporting)
#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub queue_depth: usize,
    pub enqueued_count: u64,
    pub flush_count: u64,
    pub sent_count: u64,
    pub discarded_count: u64,
    pub dropped_command_count: u64,
}
