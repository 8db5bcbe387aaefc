//! Delivery metrics recording helpers.
//!
//! Thin wrappers over the `metrics` facade so hosts get consistent metric
//! names regardless of where events are recorded.

use metrics::{counter, gauge};

/// Record one enqueued record
pub fn record_event_enqueued(table: &str) {
    counter!(
        "beacon_records_enqueued_total",
        "table" => table.to_string()
    )
    .increment(1);
}

/// Record a flush that performed a send
pub fn record_flush() {
    counter!("beacon_flushes_total").increment(1);
}

/// Record an acknowledged batch
pub fn record_batch_sent(table: &str, records: usize) {
    counter!(
        "beacon_records_sent_total",
        "table" => table.to_string()
    )
    .increment(records as u64);
}

/// Record a discarded batch (unrecoverable failure or hard kill)
pub fn record_batch_discarded(table: &str, records: usize) {
    counter!(
        "beacon_records_discarded_total",
        "table" => table.to_string()
    )
    .increment(records as u64);
}

/// Record a command dropped by a dead worker
pub fn record_command_dropped() {
    counter!("beacon_commands_dropped_total").increment(1);
}

/// Record the observed queue depth
pub fn record_queue_depth(table: &str, depth: usize) {
    gauge!(
        "beacon_queue_depth",
        "table" => table.to_string()
    )
    .set(depth as f64);
}

/// Record one transport outcome
pub fn record_transport_outcome(outcome: &str) {
    counter!(
        "beacon_transport_outcomes_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}
