use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Copied view of the session record. Monitors take one of these when they
/// build an event so identity fields are fixed at event time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: Option<String>,
    pub client_name: Option<String>,
    pub roll_number: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
}

impl SessionSnapshot {
    /// A session is active when it has an id and, if the collector gave an
    /// expiry, that expiry has not passed. Expiry is advisory: it is checked
    /// here but nothing polls it mid-session.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        match (&self.session_id, self.expires_at) {
            (None, _) => false,
            (Some(_), Some(expires_at)) => now < expires_at,
            (Some(_), None) => true,
        }
    }
}

/// Shared session context. Every monitor holds a clone and gates on
/// `is_active()`; all writes go through `SessionLifecycle`, which keeps the
/// null→set transition tied to successful registration and set→null tied to
/// explicit termination. The interior lock exists because the process
/// watcher and the reporter read from background tasks while the host event
/// thread writes.
#[derive(Clone, Default)]
pub struct SessionContext {
    inner: Arc<RwLock<SessionSnapshot>>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.inner.read().unwrap().is_active_at(Utc::now())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.read().unwrap().clone()
    }

    pub(crate) fn begin(&self, snapshot: SessionSnapshot) {
        *self.inner.write().unwrap() = snapshot;
    }

    /// Clears the context and returns what it held, so the caller can tell
    /// a first termination from a repeat.
    pub(crate) fn clear(&self) -> SessionSnapshot {
        std::mem::take(&mut *self.inner.write().unwrap())
    }
}
