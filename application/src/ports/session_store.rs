//! Session store port
//!
//! The store is the only place conversation history lives. Every operation
//! is a short critical section, so the trait is synchronous and callers
//! never hold it across an await point.

use relay_domain::{Ensured, Role, SessionCache, SessionKey, SessionPolicy, Turn};
use std::sync::Mutex;
use tracing::debug;

/// Shared access to per-session conversation history.
pub trait SessionStore: Send + Sync {
    /// Create the session if absent.
    fn ensure(&self, key: &SessionKey) -> Ensured;

    /// Append a turn to a resident session. Returns `false` when the
    /// session is gone and nothing was recorded.
    fn append(&self, key: &SessionKey, role: Role, content: &str) -> bool;

    /// Copy of the session's history, creating the session if needed.
    fn snapshot(&self, key: &SessionKey) -> Vec<Turn>;

    /// Number of turns held for the session, if it exists.
    fn turn_count(&self, key: &SessionKey) -> Option<usize>;
}

/// [`SessionCache`] behind a mutex.
pub struct InMemorySessionStore {
    cache: Mutex<SessionCache>,
}

impl InMemorySessionStore {
    pub fn new(policy: SessionPolicy) -> Self {
        Self {
            cache: Mutex::new(SessionCache::new(policy)),
        }
    }

    pub fn len(&self) -> usize {
        self.with_cache(|cache| cache.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_cache<R>(&self, f: impl FnOnce(&mut SessionCache) -> R) -> R {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut cache)
    }
}

impl SessionStore for InMemorySessionStore {
    fn ensure(&self, key: &SessionKey) -> Ensured {
        let ensured = self.with_cache(|cache| cache.ensure(key));
        if let Some(evicted) = &ensured.evicted {
            debug!(session = %key, evicted = %evicted, "Session capacity reached, evicted least recently used");
        }
        ensured
    }

    fn append(&self, key: &SessionKey, role: Role, content: &str) -> bool {
        match self.with_cache(|cache| cache.append(key, role, content)) {
            Some(dropped) => {
                if !dropped.is_empty() {
                    debug!(session = %key, dropped = dropped.len(), "History cap reached, oldest turns evicted");
                }
                true
            }
            None => false,
        }
    }

    fn snapshot(&self, key: &SessionKey) -> Vec<Turn> {
        self.with_cache(|cache| {
            cache.ensure(key);
            cache.snapshot(key).unwrap_or_default()
        })
    }

    fn turn_count(&self, key: &SessionKey) -> Option<usize> {
        self.with_cache(|cache| cache.turn_count(key))
    }
}
