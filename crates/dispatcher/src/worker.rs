//! Worker - the single consumer of the command mailbox.
//!
//! Owns the durable queue exclusively (single writer, no locking at that
//! layer), evaluates the flush scheduler after every command, and posts
//! batches through the transport synchronously inside its loop. Commands
//! queued during an in-flight flush wait behind it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use contracts::{
    BatchTransport, DurableQueue, EventRecord, PipelineConfig, PipelineError, QueueTable,
    TransportStatus,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, instrument, warn};

use crate::handle::{Command, PipelineHandle};
use crate::metrics::WorkerMetrics;
use crate::scheduler::FlushScheduler;

/// Single-consumer command worker
pub struct Worker<T: BatchTransport> {
    config: PipelineConfig,
    queue: Box<dyn DurableQueue>,
    transport: T,
    scheduler: FlushScheduler,
    disable_fallback: bool,
    sending_enabled: Arc<AtomicBool>,
    dead: Arc<AtomicBool>,
    metrics: Arc<WorkerMetrics>,
    rx: mpsc::UnboundedReceiver<Command>,
    /// At most one pending delayed flush
    deadline: Option<Instant>,
}

impl<T: BatchTransport + Send + 'static> Worker<T> {
    /// Create a worker and spawn its processing loop
    ///
    /// Must be called within a tokio runtime. The returned handle is the
    /// only way to reach the worker; the join handle resolves when the
    /// mailbox closes (every handle dropped).
    pub fn spawn(
        config: PipelineConfig,
        queue: Box<dyn DurableQueue>,
        transport: T,
        sending_enabled: Arc<AtomicBool>,
    ) -> (PipelineHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let dead = Arc::new(AtomicBool::new(false));
        let metrics = Arc::new(WorkerMetrics::new());

        let scheduler = FlushScheduler::new(config.flush_interval_ms, config.bulk_upload_limit);
        let worker = Worker {
            disable_fallback: config.disable_fallback,
            config,
            queue,
            transport,
            scheduler,
            sending_enabled,
            dead: Arc::clone(&dead),
            metrics: Arc::clone(&metrics),
            rx,
            deadline: None,
        };

        let handle = PipelineHandle::new(tx, dead, metrics);
        let join = tokio::spawn(worker.run());
        (handle, join)
    }

    /// Run the worker loop until the mailbox closes
    #[instrument(name = "worker_run", skip(self))]
    async fn run(mut self) {
        if let Err(e) = self.startup_purge() {
            error!(error = %e, "Worker startup purge failed");
            self.mark_dead();
        } else {
            info!("Worker started");
        }

        loop {
            let Some(command) = self.next_command().await else {
                break;
            };

            if self.dead.load(Ordering::SeqCst) {
                debug!("Dead worker dropping a command");
                self.metrics.inc_dropped_command_count();
                observability::record_command_dropped();
                continue;
            }

            if let Err(e) = self.handle_command(command).await {
                // Fail-stop: no error ever propagates back to producers.
                error!(error = %e, "Worker fault, no further commands will be processed");
                self.mark_dead();
            }
        }

        info!("Worker mailbox closed, shutting down");
    }

    /// Purge entries past the retention window, both tables
    fn startup_purge(&mut self) -> Result<(), PipelineError> {
        let cutoff_ms = chrono::Utc::now().timestamp_millis() - self.config.data_expiration_ms;
        for table in QueueTable::ALL {
            let removed = self.queue.purge_older_than(cutoff_ms, table)?;
            if removed > 0 {
                info!(table = %table, removed, "Dropped expired records");
            }
        }
        Ok(())
    }

    /// Next command, synthesizing a flush when the delayed deadline expires
    async fn next_command(&mut self) -> Option<Command> {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    command = self.rx.recv() => command,
                    _ = sleep_until(deadline) => {
                        self.deadline = None;
                        debug!("Delayed flush deadline reached");
                        Some(Command::Flush)
                    }
                }
            }
            None => self.rx.recv().await,
        }
    }

    async fn handle_command(&mut self, command: Command) -> Result<(), PipelineError> {
        let mut observed_depth = None;

        match command {
            Command::SetFlushInterval(interval_ms) => {
                debug!(interval_ms, "Changing flush interval");
                self.scheduler.set_interval_ms(interval_ms);
                self.deadline = None;
            }
            Command::SetFallbackDisabled(disabled) => {
                debug!(disabled, "Setting fallback policy");
                self.disable_fallback = disabled;
            }
            Command::EnqueueEvent(record) => {
                let payload = build_event_object(&record, &self.config.base_properties);
                let depth = self
                    .queue
                    .append(&payload.to_string(), QueueTable::Events)?;
                debug!(event = %record.event_name, depth, "Queued event for sending later");
                self.metrics.inc_enqueued_count();
                observability::record_event_enqueued(QueueTable::Events.as_str());
                observed_depth = Some((QueueTable::Events, depth));
            }
            Command::EnqueuePeople(record) => {
                let depth = self.queue.append(&record.to_string(), QueueTable::People)?;
                debug!(depth, "Queued people record for sending later");
                self.metrics.inc_enqueued_count();
                observability::record_event_enqueued(QueueTable::People.as_str());
                observed_depth = Some((QueueTable::People, depth));
            }
            Command::Flush => {
                self.deadline = None;
                self.flush_queues().await?;
            }
            Command::Kill => {
                warn!("Worker received a hard kill, discarding all queued records");
                self.queue.delete_all(QueueTable::Events)?;
                self.queue.delete_all(QueueTable::People)?;
                self.mark_dead();
                return Ok(());
            }
        }

        if let Some((table, depth)) = observed_depth {
            self.metrics.set_queue_depth(depth);
            observability::record_queue_depth(table.as_str(), depth);
            if depth >= self.scheduler.bulk_upload_limit() {
                debug!(depth, "Queue reached bulk upload limit, flushing");
                self.flush_queues().await?;
            } else if depth > 0 && self.deadline.is_none() {
                if let Some(delay) = self.scheduler.delay() {
                    debug!(depth, delay_ms = delay.as_millis() as u64, "Scheduling delayed flush");
                    self.deadline = Some(Instant::now() + delay);
                }
            }
        }

        Ok(())
    }

    /// Send path for both tables
    ///
    /// The inter-flush average is updated once per flush, and only when at
    /// least one batch actually goes out.
    async fn flush_queues(&mut self) -> Result<(), PipelineError> {
        if !self.sending_enabled.load(Ordering::SeqCst) {
            info!("Sending is disabled, leaving queued records in place");
            return Ok(());
        }

        let mut sending = false;
        for table in QueueTable::ALL {
            let Some(batch) = self.queue.read_batch(table)? else {
                continue;
            };
            if !sending {
                sending = true;
                self.scheduler.note_send(std::time::Instant::now());
                self.metrics.inc_flush_count();
                observability::record_flush();
            }

            let fallback = if self.disable_fallback {
                None
            } else {
                self.config.events_fallback_endpoint.as_deref()
            };
            let result = self
                .transport
                .post_batch(&batch.payload, &self.config.events_endpoint, fallback)
                .await;

            match result.status {
                TransportStatus::Succeeded => {
                    debug!(table = %table, entries = batch.len, "Batch acknowledged");
                    self.queue.delete_up_to(batch.last_id, table)?;
                    self.metrics.add_sent_count(batch.len as u64);
                    observability::record_batch_sent(table.as_str(), batch.len);
                    observability::record_transport_outcome("succeeded");
                }
                TransportStatus::FailedUnrecoverable => {
                    warn!(table = %table, entries = batch.len, "Batch unsendable, discarding");
                    self.queue.delete_up_to(batch.last_id, table)?;
                    self.metrics.add_discarded_count(batch.len as u64);
                    observability::record_batch_discarded(table.as_str(), batch.len);
                    observability::record_transport_outcome("failed_unrecoverable");
                }
                TransportStatus::FailedRecoverable => {
                    debug!(table = %table, "Delivery failed recoverably, records stay queued");
                    observability::record_transport_outcome("failed_recoverable");
                    if self.deadline.is_none() {
                        if let Some(delay) = self.scheduler.delay() {
                            self.deadline = Some(Instant::now() + delay);
                        }
                    }
                }
            }
        }

        Ok(())
    }

    fn mark_dead(&mut self) {
        self.dead.store(true, Ordering::SeqCst);
        self.deadline = None;
    }
}

/// Build the wire-format event object
///
/// Base properties (host metadata) first, then the token, then the
/// caller-merged properties so callers win on conflicts.
fn build_event_object(record: &EventRecord, base_properties: &serde_json::Map<String, Value>) -> Value {
    let mut send_properties = base_properties.clone();
    send_properties.insert("token".to_string(), Value::String(record.token.clone()));
    for (key, value) in &record.properties {
        send_properties.insert(key.clone(), value.clone());
    }

    json!({
        "event": record.event_name,
        "properties": send_properties,
        "utcTimestampMs": record.time_ms,
        "v": record.lib_version,
        "deviceId": record.device_id,
    })
}
