//! Explicit instance registry.
//!
//! Replaces process-wide singleton maps: the host owns a `Registry`, keys it
//! by whatever opaque handle makes sense (app id, profile, tenant), and each
//! key is initialized exactly once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::Beacon;

/// Registry of pipeline instances keyed by an opaque handle
#[derive(Default)]
pub struct Registry {
    instances: Mutex<HashMap<String, Arc<Beacon>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<Beacon>>> {
        self.instances.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Instance for `key`, initializing it once via `init`
    pub fn get_or_init<F>(&self, key: &str, init: F) -> Arc<Beacon>
    where
        F: FnOnce() -> Arc<Beacon>,
    {
        let mut instances = self.lock();
        instances
            .entry(key.to_string())
            .or_insert_with(init)
            .clone()
    }

    /// Existing instance for `key`, if any
    pub fn get(&self, key: &str) -> Option<Arc<Beacon>> {
        self.lock().get(key).cloned()
    }

    /// Remove and return the instance for `key`
    pub fn remove(&self, key: &str) -> Option<Arc<Beacon>> {
        self.lock().remove(key)
    }

    /// Number of registered instances
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
