//! PipelineHandle - producer-side entry to the worker's mailbox.
//!
//! Cheap to clone, safe from any thread, never blocks. Telemetry must never
//! throw back into application code, so every send is fire-and-forget: a
//! dead worker logs and drops, it does not error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use contracts::EventRecord;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::metrics::WorkerMetrics;

/// Commands processed by the worker, strictly in arrival order
#[derive(Debug)]
pub(crate) enum Command {
    EnqueueEvent(Box<EventRecord>),
    EnqueuePeople(Value),
    Flush,
    SetFlushInterval(i64),
    SetFallbackDisabled(bool),
    Kill,
}

/// Handle to a running worker
#[derive(Clone)]
pub struct PipelineHandle {
    tx: mpsc::UnboundedSender<Command>,
    dead: Arc<AtomicBool>,
    metrics: Arc<WorkerMetrics>,
}

impl PipelineHandle {
    pub(crate) fn new(
        tx: mpsc::UnboundedSender<Command>,
        dead: Arc<AtomicBool>,
        metrics: Arc<WorkerMetrics>,
    ) -> Self {
        Self { tx, dead, metrics }
    }

    /// Whether the worker has transitioned to its terminal state
    pub fn is_dead(&self) -> bool {
        self.dead.load(Ordering::SeqCst)
    }

    /// Shared worker metrics
    pub fn metrics(&self) -> &Arc<WorkerMetrics> {
        &self.metrics
    }

    /// Queue an event record for durable buffering
    pub fn enqueue_event(&self, record: EventRecord) {
        self.send(Command::EnqueueEvent(Box::new(record)));
    }

    /// Queue a people profile update for durable buffering
    pub fn enqueue_people(&self, record: Value) {
        self.send(Command::EnqueuePeople(record));
    }

    /// Request a flush of both tables
    pub fn flush(&self) {
        self.send(Command::Flush);
    }

    /// Update the advisory flush interval (negative disables scheduling)
    pub fn set_flush_interval(&self, interval_ms: i64) {
        self.send(Command::SetFlushInterval(interval_ms));
    }

    /// Enable or disable the fallback endpoint for subsequent flushes
    pub fn set_fallback_disabled(&self, disabled: bool) {
        self.send(Command::SetFallbackDisabled(disabled));
    }

    /// Irreversibly discard all queued records and stop processing
    pub fn kill(&self) {
        self.send(Command::Kill);
    }

    fn send(&self, command: Command) {
        if self.is_dead() {
            debug!(?command, "Dead worker dropping a command");
            self.metrics.inc_dropped_command_count();
            observability::record_command_dropped();
            return;
        }
        if self.tx.send(command).is_err() {
            error!("Worker mailbox closed unexpectedly");
        }
    }
}
