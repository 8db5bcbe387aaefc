//! Pipeline configuration surface.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

/// Default max queue depth before an immediate flush
pub const DEFAULT_BULK_UPLOAD_LIMIT: usize = 40;
/// Default advisory flush interval
pub const DEFAULT_FLUSH_INTERVAL_MS: i64 = 10_000;
/// Default retention window for unsent records (5 days)
pub const DEFAULT_DATA_EXPIRATION_MS: i64 = 1000 * 60 * 60 * 24 * 5;
/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Configuration for one pipeline instance
///
/// `flush_interval_ms` and `disable_fallback` are the two mutable knobs at
/// runtime; everything else is fixed once the worker starts.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PipelineConfig {
    /// Queue depth that forces an immediate flush. Must be below the batch
    /// size limit the collector accepts.
    #[validate(range(min = 1))]
    pub bulk_upload_limit: usize,

    /// Target max milliseconds between automatic flushes. Advisory; negative
    /// disables automatic scheduling entirely.
    pub flush_interval_ms: i64,

    /// Records older than this are purged instead of sent. Should stay below
    /// the collector-side age limit.
    #[validate(range(min = 1))]
    pub data_expiration_ms: i64,

    /// Preferred collector URL
    #[validate(length(min = 1))]
    pub events_endpoint: String,

    /// Fallback collector URL tried once when the preferred URL fails
    /// recoverably
    pub events_fallback_endpoint: Option<String>,

    /// When true, never touch the fallback endpoint
    pub disable_fallback: bool,

    /// Per-request timeout in milliseconds
    #[validate(range(min = 1))]
    pub request_timeout_ms: u64,

    /// Host-collected base properties (library/OS/device metadata) merged
    /// into every outgoing event before caller properties
    pub base_properties: Map<String, Value>,
}

impl PipelineConfig {
    /// Config with defaults, targeting the given collector endpoint
    pub fn new(events_endpoint: impl Into<String>) -> Self {
        Self {
            events_endpoint: events_endpoint.into(),
            ..Self::default()
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bulk_upload_limit: DEFAULT_BULK_UPLOAD_LIMIT,
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            data_expiration_ms: DEFAULT_DATA_EXPIRATION_MS,
            events_endpoint: String::new(),
            events_fallback_endpoint: None,
            disable_fallback: true,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            base_properties: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::new("https://collector.example/track");
        assert_eq!(config.bulk_upload_limit, 40);
        assert_eq!(config.flush_interval_ms, 10_000);
        assert!(config.disable_fallback);
        assert!(config.events_fallback_endpoint.is_none());
    }

    #[test]
    fn test_validate_rejects_empty_endpoint() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_reasonable_config() {
        let config = PipelineConfig::new("https://collector.example/track");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_partial_toml_like_json() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{"events_endpoint": "https://collector.example/track", "flush_interval_ms": -1}"#,
        )
        .unwrap();
        assert_eq!(config.flush_interval_ms, -1);
        assert_eq!(config.bulk_upload_limit, 40);
    }
}
