//! BatchTransport trait - outbound delivery interface
//!
//! One call posts one batch and classifies the outcome; the worker decides
//! what to do with the queued entries based on that classification alone.

/// Three-way outcome classification for a posted batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStatus {
    /// The collector acknowledged the batch
    Succeeded,
    /// Transient condition (offline, IO/timeout, retryable status); safe to
    /// retry later without discarding data
    FailedRecoverable,
    /// Retrying cannot help (malformed endpoint, rejected payload); data
    /// must be discarded to bound queue growth
    FailedUnrecoverable,
}

/// Result of a single `post_batch` exchange
#[derive(Debug, Clone)]
pub struct TransportResult {
    pub status: TransportStatus,
    /// Response body of the attempt that produced `status`, when one exists
    pub body: Option<String>,
}

impl TransportResult {
    pub fn new(status: TransportStatus, body: Option<String>) -> Self {
        Self { status, body }
    }

    /// Result for a pre-flight offline classification (no I/O attempted)
    pub fn offline() -> Self {
        Self {
            status: TransportStatus::FailedRecoverable,
            body: None,
        }
    }
}

/// Batch delivery trait
///
/// Owns the primary/fallback retry policy for a single batch.
#[trait_variant::make(BatchTransport: Send)]
pub trait LocalBatchTransport {
    /// Post one batch payload
    ///
    /// Tries `primary_url` first; on a recoverable primary failure performs
    /// exactly one attempt against `fallback_url` when configured, and the
    /// fallback's classification becomes the final one.
    async fn post_batch(
        &self,
        payload: &str,
        primary_url: &str,
        fallback_url: Option<&str>,
    ) -> TransportResult;
}

/// Best-effort connectivity signal, checked before any I/O
pub trait ConnectivityProbe: Send + Sync {
    /// Whether the device currently appears to be online
    fn is_online(&self) -> bool;
}

/// Probe for hosts without a usable connectivity signal: always online,
/// letting the actual request classify failures
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

impl ConnectivityProbe for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }
}
