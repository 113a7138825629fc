use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::PlannerError;
use crate::session::SessionState;

/// Shared handle to one session. Cloning is cheap; all clones see the same
/// state.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    key: Arc<str>,
    state: Arc<Mutex<SessionState>>,
}

impl SessionHandle {
    fn new(key: &str) -> Self {
        Self {
            key: Arc::from(key),
            state: Arc::new(Mutex::new(SessionState::new(key))),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Take exclusive access for one workflow turn.
    ///
    /// Never waits: a session already running a turn yields
    /// [`PlannerError::SessionBusy`].
    pub fn try_begin_turn(&self) -> Result<OwnedMutexGuard<SessionState>, PlannerError> {
        Arc::clone(&self.state)
            .try_lock_owned()
            .map_err(|_| PlannerError::SessionBusy {
                session_key: self.key.to_string(),
            })
    }

    /// Copy of the current state, waiting for any running turn to finish.
    pub async fn snapshot(&self) -> SessionState {
        self.state.lock().await.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.state.try_lock().is_err()
    }
}

/// Sessions keyed by the client-chosen session key.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the session for `key`, creating it on first use.
    pub fn get_or_create(&self, key: &str) -> SessionHandle {
        if let Some(handle) = self.sessions.read().get(key) {
            return handle.clone();
        }

        let mut sessions = self.sessions.write();
        sessions
            .entry(key.to_string())
            .or_insert_with(|| {
                tracing::debug!(session_key = %key, "session created");
                SessionHandle::new(key)
            })
            .clone()
    }

    pub fn get(&self, key: &str) -> Option<SessionHandle> {
        self.sessions.read().get(key).cloned()
    }

    pub fn remove(&self, key: &str) -> bool {
        self.sessions.write().remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.sessions.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Drop sessions idle for at least `ttl`. Sessions in the middle of a
    /// turn, or whose handle is held outside the store, are kept regardless
    /// of age. Returns the number removed.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        let ttl =
            chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::weeks(520));
        let now = Utc::now();

        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|key, handle| {
            if Arc::strong_count(&handle.state) > 1 {
                return true;
            }
            match handle.state.try_lock() {
                Ok(state) => {
                    let keep = state.idle_for(now) < ttl;
                    if !keep {
                        tracing::debug!(session_key = %key, "evicting idle session");
                    }
                    keep
                }
                Err(_) => true,
            }
        });
        before - sessions.len()
    }
}
