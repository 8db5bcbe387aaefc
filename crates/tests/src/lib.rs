//! # Integration Tests
//!
//! End-to-end tests across the workspace crates.
//!
//! Covers:
//! - Full facade -> worker -> durable queue -> transport flow
//! - Flush-cadence properties (depth threshold, advisory timer)
//! - Outage recovery and restart behavior
//! - Configuration-to-pipeline wiring

#[cfg(test)]
mod contract_tests {
    #[test]
    fn test_contracts_compile() {
        let _ = contracts::QueueTable::Events;
        let _ = contracts::TransportStatus::Succeeded;
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use beacon::Beacon;
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        BatchTransport, DurableQueue, PipelineConfig, QueueTable, TransportResult, TransportStatus,
    };
    use serde_json::{json, Map, Value};
    use storage::SharedQueue;
    use tokio::time::sleep;

    /// Transport recording every posted payload and replaying programmed
    /// outcomes (defaults to acknowledging everything)
    #[derive(Clone, Default)]
    struct RecordingTransport {
        posts: Arc<Mutex<Vec<String>>>,
        outcomes: Arc<Mutex<VecDeque<TransportStatus>>>,
    }

    impl RecordingTransport {
        fn with_outcomes(outcomes: &[TransportStatus]) -> Self {
            let transport = Self::default();
            transport
                .outcomes
                .lock()
                .unwrap()
                .extend(outcomes.iter().copied());
            transport
        }

        fn post_count(&self) -> usize {
            self.posts.lock().unwrap().len()
        }

        fn posted_batches(&self) -> Vec<Vec<Value>> {
            self.posts
                .lock()
                .unwrap()
                .iter()
                .map(|payload| serde_json::from_str(payload).unwrap())
                .collect()
        }
    }

    impl BatchTransport for RecordingTransport {
        async fn post_batch(
            &self,
            payload: &str,
            _primary_url: &str,
            _fallback_url: Option<&str>,
        ) -> TransportResult {
            self.posts.lock().unwrap().push(payload.to_string());
            let status = self
                .outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(TransportStatus::Succeeded);
            TransportResult::new(status, Some("1".to_string()))
        }
    }

    fn config(bulk_limit: usize, interval_ms: i64) -> PipelineConfig {
        PipelineConfig {
            bulk_upload_limit: bulk_limit,
            flush_interval_ms: interval_ms,
            events_endpoint: "https://collector.example/track".to_string(),
            ..PipelineConfig::default()
        }
    }

    fn build(
        config: PipelineConfig,
        queue: SharedQueue,
        transport: RecordingTransport,
    ) -> std::sync::Arc<Beacon> {
        Beacon::builder("tok", config)
            .queue(Box::new(queue))
            .build_with_transport(transport)
    }

    /// Full flow: track -> durable buffer -> flush -> acknowledged delete
    #[tokio::test]
    async fn test_e2e_track_flush_deliver() {
        let queue = SharedQueue::new();
        let transport = RecordingTransport::default();
        let beacon = build(config(40, -1), queue.clone(), transport.clone());

        let mut props = Map::new();
        props.insert("step".to_string(), json!("checkout"));
        beacon.track("viewed page", Some(props));
        beacon.track("tapped button", None);

        let people = beacon.people();
        people.identify("u1");
        people.set_value("plan", json!("pro"));

        beacon.flush();
        sleep(Duration::from_millis(200)).await;

        // One POST per non-empty table, queue fully drained
        assert_eq!(transport.post_count(), 2);
        assert_eq!(queue.depth(QueueTable::Events), 0);
        assert_eq!(queue.depth(QueueTable::People), 0);

        let batches = transport.posted_batches();
        let events = &batches[0];
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["event"], json!("viewed page"));
        assert_eq!(events[0]["properties"]["step"], json!("checkout"));
        assert_eq!(events[1]["event"], json!("tapped button"));

        let people_batch = &batches[1];
        assert_eq!(people_batch[0]["$set"]["plan"], json!("pro"));
        assert_eq!(people_batch[0]["$distinct_id"], json!("u1"));
    }

    /// The 40th enqueue without an intervening flush triggers delivery
    #[tokio::test]
    async fn test_fortieth_enqueue_triggers_immediate_flush() {
        let queue = SharedQueue::new();
        let transport = RecordingTransport::default();
        let beacon = build(config(40, -1), queue.clone(), transport.clone());

        for i in 0..39 {
            beacon.track("bulk", Some(Map::from_iter([(String::from("i"), json!(i))])));
        }
        sleep(Duration::from_millis(200)).await;
        assert_eq!(transport.post_count(), 0);
        assert_eq!(queue.depth(QueueTable::Events), 39);

        beacon.track("bulk", None);
        sleep(Duration::from_millis(300)).await;

        assert_eq!(transport.post_count(), 1);
        assert_eq!(transport.posted_batches()[0].len(), 40);
        assert_eq!(queue.depth(QueueTable::Events), 0);
    }

    /// One pending message is flushed automatically within ~interval
    #[tokio::test]
    async fn test_automatic_flush_after_interval() {
        let queue = SharedQueue::new();
        let transport = RecordingTransport::default();
        let beacon = build(config(40, 200), queue.clone(), transport.clone());

        beacon.track("pending", None);
        sleep(Duration::from_millis(50)).await;
        assert_eq!(transport.post_count(), 0);

        sleep(Duration::from_millis(1000)).await;
        assert_eq!(transport.post_count(), 1);
        assert_eq!(queue.depth(QueueTable::Events), 0);
    }

    /// A recoverable outage keeps records queued and retries automatically
    #[tokio::test]
    async fn test_outage_recovery_redelivers_same_records() {
        let queue = SharedQueue::new();
        let transport = RecordingTransport::with_outcomes(&[
            TransportStatus::FailedRecoverable,
            TransportStatus::Succeeded,
        ]);
        let beacon = build(config(40, 150), queue.clone(), transport.clone());

        beacon.track("important", None);
        // First delivery attempt fails recoverably (automatic flush)
        sleep(Duration::from_millis(600)).await;
        assert!(transport.post_count() >= 1);

        // A retry was scheduled; eventually the record is acknowledged
        sleep(Duration::from_millis(800)).await;
        assert_eq!(queue.depth(QueueTable::Events), 0);

        // The same record was re-sent, not duplicated in the queue
        let batches = transport.posted_batches();
        let last = batches.last().unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0]["event"], json!("important"));
    }

    /// Records buffered by one process instance survive into the next
    #[tokio::test]
    async fn test_restart_preserves_unacknowledged_records() {
        let queue = SharedQueue::new();

        {
            // First run: collector unreachable the whole time
            let transport =
                RecordingTransport::with_outcomes(&[TransportStatus::FailedRecoverable; 8]);
            let beacon = build(config(40, -1), queue.clone(), transport.clone());
            beacon.track("survivor", None);
            beacon.flush();
            sleep(Duration::from_millis(200)).await;
            assert_eq!(queue.depth(QueueTable::Events), 1);
        }

        // Second run over the same durable queue: delivery succeeds
        let transport = RecordingTransport::default();
        let beacon = build(config(40, -1), queue.clone(), transport.clone());
        beacon.flush();
        sleep(Duration::from_millis(200)).await;

        assert_eq!(queue.depth(QueueTable::Events), 0);
        let batches = transport.posted_batches();
        assert_eq!(batches[0][0]["event"], json!("survivor"));
    }

    /// Startup purges records older than the retention window
    #[tokio::test]
    async fn test_startup_purges_expired_records() {
        let mut seeded = SharedQueue::new();
        seeded
            .append(r#"{"event":"ancient"}"#, QueueTable::Events)
            .unwrap();

        // Let the seeded record age past a tiny retention window
        sleep(Duration::from_millis(100)).await;

        let transport = RecordingTransport::default();
        let mut config = config(40, -1);
        config.data_expiration_ms = 10;
        let _beacon = build(config, seeded.clone(), transport.clone());
        sleep(Duration::from_millis(200)).await;

        assert_eq!(seeded.depth(QueueTable::Events), 0);
        assert_eq!(transport.post_count(), 0);
    }

    /// Sending switch gates I/O but preserves the queue
    #[tokio::test]
    async fn test_sending_switch_end_to_end() {
        let queue = SharedQueue::new();
        let transport = RecordingTransport::default();
        let beacon = build(config(40, -1), queue.clone(), transport.clone());

        beacon.set_sending_enabled(false);
        beacon.track("held back", None);
        beacon.flush();
        sleep(Duration::from_millis(100)).await;
        assert_eq!(transport.post_count(), 0);
        assert_eq!(queue.depth(QueueTable::Events), 1);

        beacon.set_sending_enabled(true);
        beacon.flush();
        sleep(Duration::from_millis(100)).await;
        assert_eq!(queue.depth(QueueTable::Events), 0);
    }

    /// A configuration file wires a working pipeline
    #[tokio::test]
    async fn test_config_file_to_pipeline() {
        let toml = r#"
bulk_upload_limit = 5
flush_interval_ms = -1
events_endpoint = "https://collector.example/track"

[base_properties]
os = "linux"
"#;
        let config = ConfigLoader::load_from_str(toml, ConfigFormat::Toml).unwrap();

        let queue = SharedQueue::new();
        let transport = RecordingTransport::default();
        let beacon = Beacon::builder("tok", config)
            .queue(Box::new(queue.clone()))
            .build_with_transport(transport.clone());

        beacon.track("configured", None);
        beacon.flush();
        sleep(Duration::from_millis(200)).await;

        let batches = transport.posted_batches();
        assert_eq!(batches[0][0]["properties"]["os"], json!("linux"));
        assert_eq!(batches[0][0]["properties"]["token"], json!("tok"));
    }
}
