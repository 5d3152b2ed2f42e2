//! Per-session serialization
//!
//! Uploads to the same session run one at a time; uploads to different
//! sessions never contend. Idle entries are dropped when the last guard for
//! a session is released.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Keyed async mutex table
#[derive(Clone, Default)]
pub struct SessionLocks {
    inner: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `session`
    pub async fn acquire(&self, session: &str) -> SessionGuard {
        let lock = self
            .inner
            .entry(session.to_string())
            .or_default()
            .clone();

        let guard = lock.lock_owned().await;
        SessionGuard {
            session: session.to_string(),
            table: Arc::clone(&self.inner),
            guard: Some(guard),
        }
    }

    /// Number of sessions with a live lock entry
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Held for the duration of one upload
pub struct SessionGuard {
    session: String,
    table: Arc<DashMap<String, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl SessionGuard {
    pub fn session(&self) -> &str {
        &self.session
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        // Release first so the map holds the only remaining reference when idle
        self.guard.take();
        self.table
            .remove_if(&self.session, |_, lock| Arc::strong_count(lock) == 1);
    }
}
