//! # Beacon
//!
//! Public facade of the telemetry pipeline.
//!
//! A [`Beacon`] owns one identity store, one referrer cache, and one worker;
//! every entry point is callable from any thread and never blocks on I/O.
//! Records are buffered durably on-device and delivered in batches; call
//! [`Beacon::flush`] before shutdown to push out whatever is still pending.
//!
//! ```no_run
//! use beacon::Beacon;
//! use contracts::PipelineConfig;
//!
//! # async fn example() {
//! let beacon = Beacon::builder("API TOKEN", PipelineConfig::new("https://collector.example/track"))
//!     .build()
//!     .unwrap();
//!
//! beacon.track("something interesting happened", None);
//! beacon.flush();
//! # }
//! ```

mod people;
mod registry;
mod session;

pub use people::People;
pub use registry::Registry;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{
    BatchTransport, DurableQueue, EventRecord, PipelineConfig, PipelineError, PropertyStore,
};
use dispatcher::{MetricsSnapshot, PipelineHandle, Worker};
use identity::{IdentityStore, ReferrerCache};
use serde_json::{Map, Value};
use session::{SessionTracker, DEFAULT_SESSION_INACTIVITY};
use storage::{MemoryQueue, MemoryStore};
use tracing::debug;
use transport::HttpTransport;

/// String version of the library, sent with every event
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Synthetic impression ping; uses the current session without extending it
pub const GLIMPSE_ACTION_EVENT: &str = "glimpseAction";

/// One telemetry pipeline instance
pub struct Beacon {
    token: String,
    identity: Arc<IdentityStore>,
    referrer: Arc<ReferrerCache>,
    handle: PipelineHandle,
    session: SessionTracker,
    sending_enabled: Arc<AtomicBool>,
    collection_enabled: AtomicBool,
}

/// Builder for a [`Beacon`]
pub struct BeaconBuilder {
    token: String,
    config: PipelineConfig,
    queue: Option<Box<dyn DurableQueue>>,
    identity_store: Option<Box<dyn PropertyStore>>,
    referrer_store: Option<Box<dyn PropertyStore>>,
    session_inactivity: Duration,
}

impl Beacon {
    /// Start building an instance for the given API token
    pub fn builder(token: impl Into<String>, config: PipelineConfig) -> BeaconBuilder {
        BeaconBuilder {
            token: token.into(),
            config,
            queue: None,
            identity_store: None,
            referrer_store: None,
            session_inactivity: DEFAULT_SESSION_INACTIVITY,
        }
    }

    // ===== Tracking =====

    /// Track an event
    ///
    /// Eventually results in a data point delivered to the collector; the
    /// call itself only builds the record and hands it to the worker.
    pub fn track(&self, event_name: &str, properties: Option<Map<String, Value>>) {
        if !self.collection_enabled.load(Ordering::SeqCst) {
            debug!("Collection disabled, dropping event");
            return;
        }

        let mut message_props = Map::new();

        for (key, value) in self.referrer.snapshot() {
            message_props.insert(key, Value::String(value));
        }
        for (key, value) in self.identity.super_properties() {
            message_props.insert(key, value);
        }

        // Super/referrer properties never override these reserved fields,
        // but the caller's own properties below still can.
        match self.identity.user_id() {
            Some(user_id) => {
                message_props.insert("userId".to_string(), Value::String(user_id));
                message_props.insert("isLoggedIn".to_string(), Value::Bool(true));
            }
            None => {
                message_props.insert("isLoggedIn".to_string(), Value::Bool(false));
            }
        }

        let device_id = self.identity.device_id();
        message_props.insert("deviceId".to_string(), Value::String(device_id.clone()));

        if let Some(session_id) = self.session.refresh(&device_id) {
            message_props.insert("sessionId".to_string(), Value::String(session_id));
        }
        message_props.insert(
            "uid".to_string(),
            Value::String(uuid::Uuid::new_v4().to_string()),
        );
        message_props.insert(
            "timezoneOffsetms".to_string(),
            Value::from(local_utc_offset_ms()),
        );

        if let Some(caller_props) = properties {
            for (key, value) in caller_props {
                message_props.insert(key, value);
            }
        }

        let record = EventRecord {
            event_name: event_name.to_string(),
            properties: message_props,
            token: self.token.clone(),
            time_ms: chrono::Utc::now().timestamp_millis(),
            lib_version: VERSION.to_string(),
            device_id,
        };
        self.handle.enqueue_event(record);

        if event_name != GLIMPSE_ACTION_EVENT {
            self.session.touch();
        }
    }

    /// Push all queued events and people updates to the collector
    pub fn flush(&self) {
        self.handle.flush();
    }

    // ===== Identity =====

    /// Associate future tracked events with the given user
    pub fn identify(&self, user_id: &str) {
        self.identity.set_user_id(user_id);
    }

    /// Distinct id used for event tracking (generated before any `identify`)
    pub fn distinct_id(&self) -> String {
        self.identity.events_distinct_id()
    }

    pub fn user_id(&self) -> Option<String> {
        self.identity.user_id()
    }

    pub fn device_id(&self) -> String {
        self.identity.device_id()
    }

    pub fn set_device_id(&self, device_id: &str) {
        self.identity.set_device_id(device_id);
    }

    pub fn ref_user_id(&self) -> Option<String> {
        self.identity.ref_user_id()
    }

    pub fn set_ref_user_id(&self, ref_user_id: &str) {
        self.identity.set_ref_user_id(ref_user_id);
    }

    // ===== Super properties =====

    /// Properties sent with every subsequent tracked event
    pub fn super_properties(&self) -> Map<String, Value> {
        self.identity.super_properties()
    }

    /// Register properties, overwriting any with the same names
    pub fn register_super_properties(&self, properties: Map<String, Value>) {
        self.identity.register_super_properties(properties);
    }

    /// Register properties only for names not already registered
    pub fn register_super_properties_once(&self, properties: Map<String, Value>) {
        self.identity.register_super_properties_once(properties);
    }

    /// Remove a single registered property
    pub fn unregister_super_property(&self, name: &str) {
        self.identity.unregister_super_property(name);
    }

    /// Erase all registered properties
    pub fn clear_super_properties(&self) {
        self.identity.clear_super_properties();
    }

    // ===== People =====

    /// Handle for people profile updates
    pub fn people(&self) -> People {
        People::new(
            self.token.clone(),
            Arc::clone(&self.identity),
            self.handle.clone(),
        )
    }

    // ===== Referrer attribution =====

    /// Referrer cache; external attribution updaters call `invalidate()` on it
    pub fn referrer(&self) -> &Arc<ReferrerCache> {
        &self.referrer
    }

    // ===== Switches & lifecycle =====

    /// Gate network I/O during flushes; disabling preserves queued records
    pub fn set_sending_enabled(&self, enabled: bool) {
        self.sending_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Gate event capture entirely
    pub fn set_collection_enabled(&self, enabled: bool) {
        self.collection_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Update the advisory flush interval (negative disables scheduling)
    pub fn set_flush_interval(&self, interval_ms: i64) {
        self.handle.set_flush_interval(interval_ms);
    }

    /// Enable or disable the fallback endpoint for subsequent flushes
    pub fn set_fallback_disabled(&self, disabled: bool) {
        self.handle.set_fallback_disabled(disabled);
    }

    /// Clear distinct ids, super-properties, and waiting people records
    ///
    /// Messages already queued for sending are unaffected.
    pub fn clear_all(&self) {
        self.identity.clear_all();
    }

    /// Discard all queued records and stop the worker permanently
    pub fn hard_kill(&self) {
        self.handle.kill();
    }

    /// Whether the worker has stopped processing commands
    pub fn is_dead(&self) -> bool {
        self.handle.is_dead()
    }

    /// Snapshot of the worker's delivery metrics
    pub fn metrics(&self) -> MetricsSnapshot {
        self.handle.metrics().snapshot()
    }
}

impl BeaconBuilder {
    /// Use a custom durable queue (defaults to an in-memory queue)
    pub fn queue(mut self, queue: Box<dyn DurableQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Use a custom identity property store (defaults to in-memory)
    pub fn identity_store(mut self, store: Box<dyn PropertyStore>) -> Self {
        self.identity_store = Some(store);
        self
    }

    /// Use a custom referrer attribution store (defaults to in-memory)
    pub fn referrer_store(mut self, store: Box<dyn PropertyStore>) -> Self {
        self.referrer_store = Some(store);
        self
    }

    /// Override the session inactivity timeout
    pub fn session_inactivity(mut self, inactivity: Duration) -> Self {
        self.session_inactivity = inactivity;
        self
    }

    /// Build with the HTTP transport configured from the pipeline config
    ///
    /// Must be called within a tokio runtime.
    pub fn build(self) -> Result<Arc<Beacon>, PipelineError> {
        let transport = HttpTransport::new(Duration::from_millis(self.config.request_timeout_ms))?;
        Ok(self.build_with_transport(transport))
    }

    /// Build with a custom transport (tests, alternative protocols)
    ///
    /// Must be called within a tokio runtime.
    pub fn build_with_transport<T>(self, transport: T) -> Arc<Beacon>
    where
        T: BatchTransport + Send + 'static,
    {
        let sending_enabled = Arc::new(AtomicBool::new(true));
        let queue = self
            .queue
            .unwrap_or_else(|| Box::new(MemoryQueue::new()));
        let (handle, _join) = Worker::spawn(
            self.config,
            queue,
            transport,
            Arc::clone(&sending_enabled),
        );

        let identity = Arc::new(IdentityStore::new(
            self.identity_store
                .unwrap_or_else(|| Box::new(MemoryStore::new())),
        ));
        let referrer = Arc::new(ReferrerCache::new(
            self.referrer_store
                .unwrap_or_else(|| Box::new(MemoryStore::new())),
        ));

        let beacon = Beacon {
            token: self.token,
            identity,
            referrer,
            handle,
            session: SessionTracker::new(self.session_inactivity),
            sending_enabled,
            collection_enabled: AtomicBool::new(true),
        };

        // Restart recovery: an identity persisted by a previous run releases
        // any people records that were still waiting on it.
        if beacon.identity.people_distinct_id().is_some() {
            for record in beacon.identity.drain_waiting_records() {
                beacon.handle.enqueue_people(record);
            }
        }

        Arc::new(beacon)
    }
}

/// Local UTC offset in milliseconds, as sent with every event
fn local_utc_offset_ms() -> i64 {
    use chrono::Offset;
    let offset = chrono::Local::now().offset().fix();
    i64::from(offset.local_minus_utc()) * 1000
}
