//! Identity store - identities, super-properties, waiting people records.
//!
//! Every mutation is write-through: the new value is persisted before the
//! call returns, so state survives a crash immediately after. Reads lazily
//! load persisted state once per process.

use std::sync::{Mutex, MutexGuard};

use contracts::PropertyStore;
use serde_json::{Map, Value};
use tracing::{debug, warn};

const KEY_EVENTS_DISTINCT_ID: &str = "events_distinct_id";
const KEY_PEOPLE_DISTINCT_ID: &str = "people_distinct_id";
const KEY_DEVICE_ID: &str = "device_id";
const KEY_USER_ID: &str = "user_id";
const KEY_REF_USER_ID: &str = "ref_user_id";
const KEY_SUPER_PROPERTIES: &str = "super_properties";
const KEY_WAITING_RECORDS: &str = "waiting_records";

/// Wire key a profile update is stamped with once identity resolves
pub const DISTINCT_ID_KEY: &str = "$distinct_id";

struct Inner {
    store: Box<dyn PropertyStore>,
    identities_loaded: bool,
    events_distinct_id: Option<String>,
    people_distinct_id: Option<String>,
    device_id: Option<String>,
    user_id: Option<String>,
    ref_user_id: Option<String>,
    super_properties: Option<Map<String, Value>>,
    waiting_records: Option<Vec<Value>>,
}

/// Identity and property cache shared across caller threads
pub struct IdentityStore {
    inner: Mutex<Inner>,
}

impl IdentityStore {
    pub fn new(store: Box<dyn PropertyStore>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                store,
                identities_loaded: false,
                events_distinct_id: None,
                people_distinct_id: None,
                device_id: None,
                user_id: None,
                ref_user_id: None,
                super_properties: None,
                waiting_records: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ===== Identities =====

    /// Distinct id used for event tracking; generated on first load
    pub fn events_distinct_id(&self) -> String {
        let mut inner = self.lock();
        inner.ensure_identities_loaded();
        inner.events_distinct_id.clone().unwrap_or_default()
    }

    pub fn set_events_distinct_id(&self, id: impl Into<String>) {
        let mut inner = self.lock();
        inner.ensure_identities_loaded();
        inner.events_distinct_id = Some(id.into());
        inner.write_identities();
    }

    /// Distinct id used for people updates; absent until `identify`
    pub fn people_distinct_id(&self) -> Option<String> {
        let mut inner = self.lock();
        inner.ensure_identities_loaded();
        inner.people_distinct_id.clone()
    }

    pub fn set_people_distinct_id(&self, id: impl Into<String>) {
        let mut inner = self.lock();
        inner.ensure_identities_loaded();
        inner.people_distinct_id = Some(id.into());
        inner.write_identities();
    }

    /// Device id; defaults to the events distinct id on first load
    pub fn device_id(&self) -> String {
        let mut inner = self.lock();
        inner.ensure_identities_loaded();
        inner.device_id.clone().unwrap_or_default()
    }

    pub fn set_device_id(&self, id: impl Into<String>) {
        let mut inner = self.lock();
        inner.ensure_identities_loaded();
        inner.device_id = Some(id.into());
        inner.write_identities();
    }

    pub fn user_id(&self) -> Option<String> {
        let mut inner = self.lock();
        inner.ensure_identities_loaded();
        inner.user_id.clone()
    }

    pub fn set_user_id(&self, id: impl Into<String>) {
        let mut inner = self.lock();
        inner.ensure_identities_loaded();
        inner.user_id = Some(id.into());
        inner.write_identities();
    }

    pub fn ref_user_id(&self) -> Option<String> {
        let mut inner = self.lock();
        inner.ensure_identities_loaded();
        inner.ref_user_id.clone()
    }

    pub fn set_ref_user_id(&self, id: impl Into<String>) {
        let mut inner = self.lock();
        inner.ensure_identities_loaded();
        inner.ref_user_id = Some(id.into());
        inner.write_identities();
    }

    // ===== Super properties =====

    /// Snapshot of the registered super-properties
    pub fn super_properties(&self) -> Map<String, Value> {
        let mut inner = self.lock();
        inner.super_properties_mut().clone()
    }

    /// Register properties, overwriting existing keys
    pub fn register_super_properties(&self, properties: Map<String, Value>) {
        let mut inner = self.lock();
        let cache = inner.super_properties_mut();
        for (key, value) in properties {
            cache.insert(key, value);
        }
        inner.store_super_properties();
    }

    /// Register properties, never overwriting existing keys
    pub fn register_super_properties_once(&self, properties: Map<String, Value>) {
        let mut inner = self.lock();
        let cache = inner.super_properties_mut();
        for (key, value) in properties {
            cache.entry(key).or_insert(value);
        }
        inner.store_super_properties();
    }

    /// Remove a single property
    pub fn unregister_super_property(&self, name: &str) {
        let mut inner = self.lock();
        inner.super_properties_mut().remove(name);
        inner.store_super_properties();
    }

    /// Remove every registered property
    pub fn clear_super_properties(&self) {
        let mut inner = self.lock();
        inner.super_properties = Some(Map::new());
        inner.store_super_properties();
    }

    // ===== Waiting people records =====

    /// Buffer a profile update captured before identity resolved
    pub fn store_waiting_record(&self, record: Value) {
        let mut inner = self.lock();
        inner.ensure_identities_loaded();
        inner
            .waiting_records
            .get_or_insert_with(Vec::new)
            .push(record);
        inner.write_identities();
    }

    /// Remove and return all buffered records, each stamped with the
    /// now-known people distinct id, in original insertion order
    ///
    /// Returns nothing while no people distinct id is known. Unparsable
    /// buffered entries are logged and skipped.
    pub fn drain_waiting_records(&self) -> Vec<Value> {
        let mut inner = self.lock();
        inner.ensure_identities_loaded();

        let Some(distinct_id) = inner.people_distinct_id.clone() else {
            return Vec::new();
        };
        let Some(records) = inner.waiting_records.take() else {
            inner.write_identities();
            return Vec::new();
        };

        let mut ready = Vec::with_capacity(records.len());
        for record in records {
            match record {
                Value::Object(mut map) => {
                    map.insert(DISTINCT_ID_KEY.to_string(), Value::String(distinct_id.clone()));
                    ready.push(Value::Object(map));
                }
                other => {
                    warn!(record = %other, "Unparsable entry in waiting people records, dropping");
                }
            }
        }
        inner.write_identities();
        ready
    }

    // ===== Reset =====

    /// Clear distinct ids, super-properties, and waiting records
    ///
    /// Has no effect on messages already queued for sending. A fresh events
    /// distinct id is generated on the reload.
    pub fn clear_all(&self) {
        let mut inner = self.lock();
        inner.store.clear();
        inner.super_properties = None;
        inner.identities_loaded = false;
        inner.ensure_identities_loaded();
        inner.super_properties_mut();
    }
}

impl Inner {
    fn ensure_identities_loaded(&mut self) {
        if self.identities_loaded {
            return;
        }

        self.events_distinct_id = self.store.get(KEY_EVENTS_DISTINCT_ID);
        self.people_distinct_id = self.store.get(KEY_PEOPLE_DISTINCT_ID);
        self.device_id = self.store.get(KEY_DEVICE_ID);
        self.user_id = self.store.get(KEY_USER_ID);
        self.ref_user_id = self.store.get(KEY_REF_USER_ID);

        self.waiting_records = None;
        if let Some(stored) = self.store.get(KEY_WAITING_RECORDS) {
            match serde_json::from_str::<Vec<Value>>(&stored) {
                Ok(records) => self.waiting_records = Some(records),
                Err(e) => {
                    warn!(error = %e, "Could not interpret stored waiting people records");
                }
            }
        }

        let mut dirty = false;
        if self.events_distinct_id.is_none() {
            self.events_distinct_id = Some(uuid::Uuid::new_v4().to_string());
            dirty = true;
        }
        if self.device_id.is_none() {
            self.device_id = self.events_distinct_id.clone();
            dirty = true;
        }
        if dirty {
            self.write_identities();
        }

        self.identities_loaded = true;
        debug!("Identities loaded");
    }

    fn write_identities(&mut self) {
        let fields = [
            (KEY_EVENTS_DISTINCT_ID, &self.events_distinct_id),
            (KEY_PEOPLE_DISTINCT_ID, &self.people_distinct_id),
            (KEY_DEVICE_ID, &self.device_id),
            (KEY_USER_ID, &self.user_id),
            (KEY_REF_USER_ID, &self.ref_user_id),
        ];
        for (key, value) in fields {
            match value {
                Some(v) => {
                    let v = v.clone();
                    self.store.put(key, &v);
                }
                None => self.store.remove(key),
            }
        }

        match &self.waiting_records {
            Some(records) => {
                let serialized = serde_json::to_string(records).unwrap_or_else(|_| "[]".into());
                self.store.put(KEY_WAITING_RECORDS, &serialized);
            }
            None => self.store.remove(KEY_WAITING_RECORDS),
        }
    }

    /// Loaded super-property cache, self-healing on corrupt persisted JSON
    fn super_properties_mut(&mut self) -> &mut Map<String, Value> {
        if self.super_properties.is_none() {
            let stored = self
                .store
                .get(KEY_SUPER_PROPERTIES)
                .unwrap_or_else(|| "{}".to_string());
            match serde_json::from_str::<Map<String, Value>>(&stored) {
                Ok(map) => self.super_properties = Some(map),
                Err(e) => {
                    warn!(error = %e, "Cannot parse stored super-properties, resetting");
                    self.super_properties = Some(Map::new());
                    self.store_super_properties();
                }
            }
        }
        self.super_properties.get_or_insert_with(Map::new)
    }

    fn store_super_properties(&mut self) {
        let Some(cache) = &self.super_properties else {
            return;
        };
        let serialized = serde_json::to_string(cache).unwrap_or_else(|_| "{}".into());
        self.store.put(KEY_SUPER_PROPERTIES, &serialized);
    }
}
