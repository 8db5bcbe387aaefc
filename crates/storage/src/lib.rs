//! # Storage
//!
//! Reference implementations of the two persistence collaborator contracts:
//! the durable outbound-message queue and the string-keyed property store.
//!
//! Responsibilities:
//! - `MemoryQueue` / `SharedQueue`: append-only per-table message store
//! - `MemoryStore`: ephemeral property store (tests, opt-out hosts)
//! - `JsonFileStore`: write-through property store persisted as one JSON file

mod kv;
mod queue;

pub use kv::{JsonFileStore, MemoryStore};
pub use queue::{MemoryQueue, SharedQueue};
