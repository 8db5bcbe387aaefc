//! Flush-cadence policy embedded in the worker.
//!
//! Not a thread: the worker consults it after every command and drives the
//! single delayed-flush deadline itself. The inter-flush average exists for
//! diagnostics only and never feeds back into scheduling decisions.

use std::time::{Duration, Instant};

use tracing::debug;

/// Flush trigger policy and diagnostics
#[derive(Debug)]
pub struct FlushScheduler {
    /// Advisory delay before an automatic flush; negative disables it
    flush_interval_ms: i64,
    /// Queue depth that forces an immediate flush
    bulk_upload_limit: usize,
    /// Number of flushes that performed a send
    flush_count: u64,
    /// Instant of the last sending flush
    last_flush: Option<Instant>,
    /// Cumulative average gap between sending flushes
    average_gap_ms: u64,
}

impl FlushScheduler {
    pub fn new(flush_interval_ms: i64, bulk_upload_limit: usize) -> Self {
        Self {
            flush_interval_ms,
            bulk_upload_limit,
            flush_count: 0,
            last_flush: None,
            average_gap_ms: 0,
        }
    }

    /// Depth threshold for immediate flushes
    pub fn bulk_upload_limit(&self) -> usize {
        self.bulk_upload_limit
    }

    /// Current advisory interval
    pub fn interval_ms(&self) -> i64 {
        self.flush_interval_ms
    }

    /// Update the advisory interval; affects subsequent scheduling only
    pub fn set_interval_ms(&mut self, interval_ms: i64) {
        self.flush_interval_ms = interval_ms;
    }

    /// Delay for the next automatic flush, `None` when scheduling is disabled
    pub fn delay(&self) -> Option<Duration> {
        u64::try_from(self.flush_interval_ms)
            .ok()
            .map(Duration::from_millis)
    }

    /// Record that a flush is about to perform a send
    ///
    /// Callers must not invoke this for empty-queue flushes; those are
    /// no-ops and must not perturb the average.
    pub fn note_send(&mut self, now: Instant) {
        let new_count = self.flush_count + 1;

        if let Some(last) = self.last_flush {
            let gap_ms = now.saturating_duration_since(last).as_millis() as u64;
            let total_ms = gap_ms + self.average_gap_ms * self.flush_count;
            self.average_gap_ms = total_ms / new_count;
            debug!(
                average_s = self.average_gap_ms / 1000,
                "Average send frequency updated"
            );
        }

        self.last_flush = Some(now);
        self.flush_count = new_count;
    }

    /// Number of sending flushes so far
    pub fn flush_count(&self) -> u64 {
        self.flush_count
    }

    /// Cumulative average gap between sending flushes (diagnostic only)
    pub fn average_gap_ms(&self) -> u64 {
        self.average_gap_ms
    }
}
