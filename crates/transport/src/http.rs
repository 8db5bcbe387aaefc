//! HttpTransport - reqwest-backed batch delivery.

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use contracts::{
    AlwaysOnline, BatchTransport, ConnectivityProbe, PipelineError, TransportResult,
    TransportStatus,
};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use tracing::{debug, error, instrument, warn};

/// Acknowledgement body the collector returns on success
const ACK_BODY: &str = "1";
/// Structured status value acknowledging success in verbose mode
const ACK_STATUS: i64 = 1;
/// Attempts against one URL when the stale-connection symptom shows up
const MAX_STALE_RETRIES: u32 = 3;

/// HTTP transport for queued batches
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    probe: Arc<dyn ConnectivityProbe>,
}

impl HttpTransport {
    /// Transport assuming the device is always online
    pub fn new(request_timeout: Duration) -> Result<Self, PipelineError> {
        Self::with_probe(request_timeout, Arc::new(AlwaysOnline))
    }

    /// Transport consulting the given connectivity probe before any I/O
    pub fn with_probe(
        request_timeout: Duration,
        probe: Arc<dyn ConnectivityProbe>,
    ) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| PipelineError::transport(format!("http client build failed: {e}")))?;
        Ok(Self { client, probe })
    }

    #[instrument(name = "transport_request", skip(self, payload), fields(url = %url))]
    async fn perform_request(&self, url: &str, payload: &str) -> TransportResult {
        let parsed = match reqwest::Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                error!(error = %e, "Cannot interpret endpoint as a URL");
                return TransportResult::new(TransportStatus::FailedUnrecoverable, None);
            }
        };

        let body = format!("{{\"datas\":{payload}}}");
        let mut attempts = 0;
        loop {
            attempts += 1;
            let outcome = self
                .client
                .post(parsed.clone())
                .header(CONTENT_TYPE, "application/json")
                .header(ACCEPT, "application/json")
                .body(body.clone())
                .send()
                .await;

            match outcome {
                Ok(response) => {
                    let status = response.status();
                    return match response.text().await {
                        Ok(text) => classify_response(status, text),
                        Err(e) => {
                            debug!(error = %e, "Failed reading response body, will retry later");
                            TransportResult::new(TransportStatus::FailedRecoverable, None)
                        }
                    };
                }
                Err(e) if is_stale_connection(&e) && attempts < MAX_STALE_RETRIES => {
                    // Stale kept-alive connection reused by the pool; the
                    // next attempt opens a fresh one.
                    debug!(attempts, "Stale connection symptom, retrying same URL");
                }
                Err(e) if e.is_builder() => {
                    error!(error = %e, "Unsendable request");
                    return TransportResult::new(TransportStatus::FailedUnrecoverable, None);
                }
                Err(e) => {
                    debug!(error = %e, "Cannot post batch (ok, can retry)");
                    return TransportResult::new(TransportStatus::FailedRecoverable, None);
                }
            }
        }
    }
}

impl BatchTransport for HttpTransport {
    #[instrument(name = "transport_post_batch", skip_all)]
    async fn post_batch(
        &self,
        payload: &str,
        primary_url: &str,
        fallback_url: Option<&str>,
    ) -> TransportResult {
        if !self.probe.is_online() {
            debug!("Device is offline, classifying as recoverable without I/O");
            return TransportResult::offline();
        }

        let primary = self.perform_request(primary_url, payload).await;
        if primary.status != TransportStatus::FailedRecoverable {
            return primary;
        }

        // Exactly one fallback attempt; its classification wins.
        match fallback_url {
            Some(url) => {
                debug!(fallback = %url, "Primary failed recoverably, trying fallback URL");
                let fallback = self.perform_request(url, payload).await;
                if fallback.status != TransportStatus::Succeeded {
                    warn!("Could not post batch to fallback endpoint either");
                }
                fallback
            }
            None => primary,
        }
    }
}

/// Map an HTTP exchange that produced a response to a transport status
fn classify_response(status: StatusCode, body: String) -> TransportResult {
    if status.is_success() {
        return if is_acknowledged(&body) {
            TransportResult::new(TransportStatus::Succeeded, Some(body))
        } else {
            // The collector answered but did not accept the batch; resending
            // the same payload cannot change that.
            warn!(%status, "Collector response carried no acknowledgement");
            TransportResult::new(TransportStatus::FailedUnrecoverable, Some(body))
        };
    }

    let transient = status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error();
    if transient {
        debug!(%status, "Transient collector status");
        TransportResult::new(TransportStatus::FailedRecoverable, Some(body))
    } else {
        warn!(%status, "Collector rejected batch");
        TransportResult::new(TransportStatus::FailedUnrecoverable, Some(body))
    }
}

/// Acknowledgement marker: the fixed literal body, or in verbose mode a JSON
/// object carrying `"status": 1`
fn is_acknowledged(body: &str) -> bool {
    if body.trim() == ACK_BODY {
        return true;
    }
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("status").and_then(|s| s.as_i64()))
        == Some(ACK_STATUS)
}

/// Known flaky-socket symptom: the server closed a kept-alive connection
/// while our request was in flight, surfacing as an incomplete message
fn is_stale_connection(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = source {
        let text = e.to_string().to_ascii_lowercase();
        if text.contains("connection closed before message completed")
            || text.contains("incomplete message")
            || text.contains("unexpected end of file")
        {
            return true;
        }
        source = e.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// One-shot HTTP server: answers up to `max_requests` requests with the
    /// canned response, counting how many it accepted.
    async fn spawn_server(response: &'static str, max_requests: usize) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = Arc::clone(&hits);

        tokio::spawn(async move {
            for _ in 0..max_requests {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                hits_clone.fetch_add(1, Ordering::SeqCst);

                // Drain the request before answering
                let mut buf = vec![0u8; 8192];
                let mut read = 0;
                loop {
                    match socket.read(&mut buf[read..]).await {
                        Ok(0) => break,
                        Ok(n) => {
                            read += n;
                            let text = String::from_utf8_lossy(&buf[..read]);
                            if let Some(header_end) = text.find("\r\n\r\n") {
                                let content_length = text
                                    .lines()
                                    .find_map(|l| l.to_ascii_lowercase().strip_prefix("content-length:").map(str::trim).map(String::from))
                                    .and_then(|v| v.parse::<usize>().ok())
                                    .unwrap_or(0);
                                if read >= header_end + 4 + content_length {
                                    break;
                                }
                            }
                            if read == buf.len() {
                                buf.resize(buf.len() * 2, 0);
                            }
                        }
                        Err(_) => break,
                    }
                }

                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{addr}/track"), hits)
    }

    const ACK_RESPONSE: &str =
        "HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\n1\n";
    const NO_ACK_RESPONSE: &str =
        "HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\n0\n";
    const VERBOSE_ACK_RESPONSE: &str =
        "HTTP/1.1 200 OK\r\nContent-Length: 12\r\nConnection: close\r\n\r\n{\"status\":1}";
    const SERVER_ERROR_RESPONSE: &str =
        "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
    const BAD_REQUEST_RESPONSE: &str =
        "HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

    fn transport() -> HttpTransport {
        HttpTransport::new(Duration::from_secs(5)).unwrap()
    }

    /// Address that refuses connections (listener bound then dropped)
    async fn refused_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}/track")
    }

    #[tokio::test]
    async fn test_literal_ack_succeeds() {
        let (url, hits) = spawn_server(ACK_RESPONSE, 1).await;
        let result = transport().post_batch("[{\"a\":1}]", &url, None).await;
        assert_eq!(result.status, TransportStatus::Succeeded);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_verbose_ack_succeeds() {
        let (url, _) = spawn_server(VERBOSE_ACK_RESPONSE, 1).await;
        let result = transport().post_batch("[]", &url, None).await;
        assert_eq!(result.status, TransportStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_ok_without_ack_is_unrecoverable() {
        let (url, _) = spawn_server(NO_ACK_RESPONSE, 1).await;
        let result = transport().post_batch("[]", &url, None).await;
        assert_eq!(result.status, TransportStatus::FailedUnrecoverable);
    }

    #[tokio::test]
    async fn test_server_error_is_recoverable() {
        let (url, _) = spawn_server(SERVER_ERROR_RESPONSE, 1).await;
        let result = transport().post_batch("[]", &url, None).await;
        assert_eq!(result.status, TransportStatus::FailedRecoverable);
    }

    #[tokio::test]
    async fn test_bad_request_is_unrecoverable() {
        let (url, _) = spawn_server(BAD_REQUEST_RESPONSE, 1).await;
        let result = transport().post_batch("[]", &url, None).await;
        assert_eq!(result.status, TransportStatus::FailedUnrecoverable);
    }

    #[tokio::test]
    async fn test_connection_refused_is_recoverable() {
        let url = refused_url().await;
        let result = transport().post_batch("[]", &url, None).await;
        assert_eq!(result.status, TransportStatus::FailedRecoverable);
    }

    #[tokio::test]
    async fn test_malformed_url_is_unrecoverable() {
        let result = transport().post_batch("[]", "not a url", None).await;
        assert_eq!(result.status, TransportStatus::FailedUnrecoverable);
    }

    #[tokio::test]
    async fn test_offline_probe_short_circuits() {
        struct Offline;
        impl ConnectivityProbe for Offline {
            fn is_online(&self) -> bool {
                false
            }
        }

        let transport =
            HttpTransport::with_probe(Duration::from_secs(5), Arc::new(Offline)).unwrap();
        // The URL would refuse the connection, but the probe wins first.
        let url = refused_url().await;
        let result = transport.post_batch("[]", &url, None).await;
        assert_eq!(result.status, TransportStatus::FailedRecoverable);
    }

    #[tokio::test]
    async fn test_recoverable_primary_takes_one_fallback_attempt() {
        let primary = refused_url().await;
        let (fallback, fallback_hits) = spawn_server(ACK_RESPONSE, 4).await;

        let result = transport()
            .post_batch("[]", &primary, Some(&fallback))
            .await;

        assert_eq!(result.status, TransportStatus::Succeeded);
        assert_eq!(fallback_hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fallback_classification_wins() {
        let primary = refused_url().await;
        let (fallback, _) = spawn_server(NO_ACK_RESPONSE, 1).await;

        let result = transport()
            .post_batch("[]", &primary, Some(&fallback))
            .await;

        assert_eq!(result.status, TransportStatus::FailedUnrecoverable);
    }

    #[tokio::test]
    async fn test_unrecoverable_primary_never_touches_fallback() {
        let (primary, _) = spawn_server(BAD_REQUEST_RESPONSE, 1).await;
        let (fallback, fallback_hits) = spawn_server(ACK_RESPONSE, 4).await;

        let result = transport()
            .post_batch("[]", &primary, Some(&fallback))
            .await;

        assert_eq!(result.status, TransportStatus::FailedUnrecoverable);
        assert_eq!(fallback_hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_ack_marker_variants() {
        assert!(is_acknowledged("1"));
        assert!(is_acknowledged("1\n"));
        assert!(is_acknowledged("{\"status\":1}"));
        assert!(!is_acknowledged("0\n"));
        assert!(!is_acknowledged("{\"status\":0}"));
        assert!(!is_acknowledged(""));
    }

    #[test]
    fn test_request_body_shape() {
        let body = format!("{{\"datas\":{}}}", "[{\"event\":\"x\"}]");
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert!(parsed["datas"].is_array());
    }
}
