//! People profile-update API.
//!
//! Updates are JSON action messages (`$set`, `$add`, `$append`, ...) tagged
//! with the people distinct id. Updates issued before `identify` are
//! buffered in the identity store and forwarded, in order, once the id is
//! known.

use std::collections::HashMap;
use std::sync::Arc;

use dispatcher::PipelineHandle;
use identity::IdentityStore;
use serde_json::{Map, Value};
use tracing::debug;

const ENGAGE_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Handle for updating the people profile attached to a pipeline instance
#[derive(Clone)]
pub struct People {
    token: String,
    identity: Arc<IdentityStore>,
    handle: PipelineHandle,
}

impl People {
    pub(crate) fn new(token: String, identity: Arc<IdentityStore>, handle: PipelineHandle) -> Self {
        Self {
            token,
            identity,
            handle,
        }
    }

    /// Associate future profile updates with `distinct_id`
    ///
    /// Forwards every update buffered while no id was known, in original
    /// order, each tagged with the new id.
    pub fn identify(&self, distinct_id: &str) {
        self.identity.set_people_distinct_id(distinct_id);
        let waiting = self.identity.drain_waiting_records();
        if !waiting.is_empty() {
            debug!(records = waiting.len(), "Forwarding buffered people records");
        }
        for record in waiting {
            self.handle.enqueue_people(record);
        }
    }

    /// Distinct id in use for profile updates, if identified
    pub fn distinct_id(&self) -> Option<String> {
        self.identity.people_distinct_id()
    }

    /// Set profile properties, overwriting existing values
    pub fn set(&self, properties: Map<String, Value>) {
        self.record_message("$set", Value::Object(properties));
    }

    /// Set a single profile property
    pub fn set_value(&self, name: &str, value: Value) {
        let mut properties = Map::new();
        properties.insert(name.to_string(), value);
        self.set(properties);
    }

    /// Set profile properties without overwriting existing values
    pub fn set_once(&self, properties: Map<String, Value>) {
        self.record_message("$set_once", Value::Object(properties));
    }

    /// Set a single profile property without overwriting an existing value
    pub fn set_once_value(&self, name: &str, value: Value) {
        let mut properties = Map::new();
        properties.insert(name.to_string(), value);
        self.set_once(properties);
    }

    /// Add amounts to numeric profile properties (negative to reduce)
    pub fn increment(&self, properties: HashMap<String, f64>) {
        let map: Map<String, Value> = properties
            .into_iter()
            .map(|(name, amount)| (name, Value::from(amount)))
            .collect();
        self.record_message("$add", Value::Object(map));
    }

    /// Add an amount to a single numeric profile property
    pub fn increment_by(&self, name: &str, amount: f64) {
        let mut properties = HashMap::new();
        properties.insert(name.to_string(), amount);
        self.increment(properties);
    }

    /// Append a value to a list-valued profile property
    pub fn append(&self, name: &str, value: Value) {
        let mut properties = Map::new();
        properties.insert(name.to_string(), value);
        self.record_message("$append", Value::Object(properties));
    }

    /// Add values to a list-valued property unless already present
    pub fn union(&self, name: &str, values: Vec<Value>) {
        let mut properties = Map::new();
        properties.insert(name.to_string(), Value::Array(values));
        self.record_message("$union", Value::Object(properties));
    }

    /// Permanently remove a profile property
    pub fn unset(&self, name: &str) {
        self.record_message("$unset", Value::Array(vec![Value::String(name.to_string())]));
    }

    /// Record a revenue transaction on the profile
    pub fn track_charge(&self, amount: f64, properties: Option<Map<String, Value>>) {
        let mut transaction = Map::new();
        transaction.insert("$amount".to_string(), Value::from(amount));
        transaction.insert(
            "$time".to_string(),
            Value::String(chrono::Utc::now().format(ENGAGE_DATE_FORMAT).to_string()),
        );
        if let Some(extra) = properties {
            for (key, value) in extra {
                transaction.insert(key, value);
            }
        }
        self.append("$transactions", Value::Object(transaction));
    }

    /// Permanently clear the profile's transaction history
    pub fn clear_charges(&self) {
        self.unset("$transactions");
    }

    /// Permanently delete the identified profile
    pub fn delete_user(&self) {
        self.record_message("$delete", Value::Null);
    }

    /// Standard people message; buffered while no distinct id is known
    fn record_message(&self, action: &str, properties: Value) {
        let mut message = Map::new();
        message.insert(action.to_string(), properties);
        message.insert("$token".to_string(), Value::String(self.token.clone()));
        message.insert(
            "$time".to_string(),
            Value::from(chrono::Utc::now().timestamp_millis()),
        );

        match self.identity.people_distinct_id() {
            Some(distinct_id) => {
                message.insert("$distinct_id".to_string(), Value::String(distinct_id));
                self.handle.enqueue_people(Value::Object(message));
            }
            None => {
                debug!(action, "No people distinct id yet, buffering record");
                self.identity.store_waiting_record(Value::Object(message));
            }
        }
    }
}
