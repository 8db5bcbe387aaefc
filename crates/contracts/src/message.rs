//! Queued message types and the enqueue-command payload.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Durable queue table tag, one per message class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueTable {
    /// Tracked events
    Events,
    /// People profile updates
    People,
}

impl QueueTable {
    /// Both tables, in send order
    pub const ALL: [QueueTable; 2] = [QueueTable::Events, QueueTable::People];

    /// Stable name (used for logging/metrics and store keys)
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueTable::Events => "events",
            QueueTable::People => "people",
        }
    }
}

impl fmt::Display for QueueTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persisted pending message
///
/// Owned exclusively by the worker and the durable queue; `id` increases
/// monotonically per table so "delete up to" ranges are unambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedMessage {
    /// Durable sequence id, monotonically increasing within a table
    pub id: u64,
    /// Creation time, milliseconds since the Unix epoch (for retention)
    pub created_ms: i64,
    /// Opaque JSON payload, already in wire format
    pub payload: String,
}

/// One readable batch: everything pending for a table at read time
#[derive(Debug, Clone)]
pub struct QueueBatch {
    /// Sequence id of the last entry included in `payload`
    pub last_id: u64,
    /// JSON array of the included payloads, ready for the request body
    pub payload: String,
    /// Number of entries included
    pub len: usize,
}

/// Immutable payload of an enqueue-event command
///
/// Built on the caller's thread; the worker turns it into the wire object
/// without touching any caller-visible state.
#[derive(Debug, Clone)]
pub struct EventRecord {
    /// Event name
    pub event_name: String,
    /// Caller-merged properties (referrer, super, reserved, caller overrides)
    pub properties: Map<String, Value>,
    /// API token of the owning pipeline instance
    pub token: String,
    /// Capture time, milliseconds since the Unix epoch
    pub time_ms: i64,
    /// Library version string, sent as `v`
    pub lib_version: String,
    /// Device id at capture time
    pub device_id: String,
}
