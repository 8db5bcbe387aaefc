//! # Dispatcher
//!
//! Single-consumer command worker: the only writer of the durable queue and
//! the only component that decides when a flush fires.
//!
//! Producers hold a cheap [`PipelineHandle`] and hand immutable commands to
//! the worker's mailbox without blocking; the worker processes them strictly
//! in arrival order and performs network I/O synchronously inside its loop.

mod handle;
mod metrics;
mod scheduler;
mod worker;

pub use handle::PipelineHandle;
pub use metrics::{MetricsSnapshot, WorkerMetrics};
pub use scheduler::FlushScheduler;
pub use worker::Worker;
