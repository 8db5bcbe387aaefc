//! Referrer-attribution snapshot cache.
//!
//! The backing store is updated by an external installer/attribution
//! component on an arbitrary thread; it signals `invalidate()` and readers
//! rebuild on next access. The dedicated lock plus dirty flag guarantees a
//! reader sees either the prior fully-built snapshot or the newly-rebuilt
//! one, never a half-built one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use contracts::PropertyStore;
use tracing::debug;

/// Read-only snapshot cache over an externally-updated attribution store
pub struct ReferrerCache {
    source: Mutex<Box<dyn PropertyStore>>,
    snapshot: Mutex<Option<HashMap<String, String>>>,
    dirty: AtomicBool,
}

impl ReferrerCache {
    pub fn new(source: Box<dyn PropertyStore>) -> Self {
        Self {
            source: Mutex::new(source),
            snapshot: Mutex::new(None),
            // Force the first read to build from the store
            dirty: AtomicBool::new(true),
        }
    }

    fn lock_snapshot(&self) -> MutexGuard<'_, Option<HashMap<String, String>>> {
        self.snapshot.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_source(&self) -> MutexGuard<'_, Box<dyn PropertyStore>> {
        self.source.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current referrer properties, rebuilt if an update was signalled
    pub fn snapshot(&self) -> HashMap<String, String> {
        let mut cached = self.lock_snapshot();
        if self.dirty.load(Ordering::Acquire) || cached.is_none() {
            let rebuilt: HashMap<String, String> =
                self.lock_source().entries().into_iter().collect();
            debug!(entries = rebuilt.len(), "Referrer snapshot rebuilt");
            *cached = Some(rebuilt);
            self.dirty.store(false, Ordering::Release);
        }
        cached.clone().unwrap_or_default()
    }

    /// Observer hook: mark the snapshot stale after an external update
    ///
    /// May be called from any thread.
    pub fn invalidate(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Replace the backing attribution data and mark the snapshot stale
    pub fn update(&self, properties: &HashMap<String, String>) {
        {
            let mut source = self.lock_source();
            source.clear();
            for (key, value) in properties {
                source.put(key, value);
            }
        }
        self.invalidate();
    }
}
