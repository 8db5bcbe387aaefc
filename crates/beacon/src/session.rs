//! Session tracking for tracked events.
//!
//! A session id is the device id plus the creation timestamp. It is
//! recreated when absent or when the gap since the last *real* activity
//! exceeds the inactivity timeout; synthetic impression pings use the
//! current session without extending it.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Inactivity gap after which a new session starts
pub(crate) const DEFAULT_SESSION_INACTIVITY: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Default)]
struct SessionState {
    session_id: Option<String>,
    last_activity: Option<Instant>,
}

#[derive(Debug)]
pub(crate) struct SessionTracker {
    inactivity: Duration,
    state: Mutex<SessionState>,
}

impl SessionTracker {
    pub fn new(inactivity: Duration) -> Self {
        Self {
            inactivity,
            state: Mutex::new(SessionState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Session id for an outgoing event, regenerated after inactivity
    ///
    /// Regeneration requires a non-empty device id; otherwise the session id
    /// is cleared and the event goes out without one.
    pub fn refresh(&self, device_id: &str) -> Option<String> {
        let mut state = self.lock();

        let expired = match (&state.session_id, state.last_activity) {
            (None, _) => true,
            (_, None) => true,
            (_, Some(last)) => last.elapsed() > self.inactivity,
        };

        if expired {
            state.session_id = if device_id.is_empty() {
                None
            } else {
                let now_ms = chrono::Utc::now().timestamp_millis();
                Some(format!("{device_id}-{now_ms}"))
            };
        }

        state.session_id.clone()
    }

    /// Record real activity, extending the current session
    pub fn touch(&self) {
        self.lock().last_activity = Some(Instant::now());
    }
}
