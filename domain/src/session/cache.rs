//! Bounded session cache.
//!
//! [`SessionCache`] maps session keys to their [`Conversation`]s. It is a
//! plain data structure with no locking; callers that share it across tasks
//! wrap it in a mutex (see the `SessionStore` port in the application layer).
//!
//! Two bounds apply:
//!
//! - each conversation is capped at [`SessionPolicy::max_turns`] turns
//!   (FIFO eviction, system turn pinned)
//! - at most [`SessionPolicy::max_sessions`] sessions stay resident; creating
//!   one more evicts the session with the oldest last activity

use super::entities::{Role, SessionKey, Turn};
use super::history::Conversation;
use super::policy::SessionPolicy;
use std::collections::HashMap;

#[derive(Debug)]
struct Entry {
    conversation: Conversation,
    last_active: u64,
}

/// Result of [`SessionCache::ensure`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Ensured {
    /// The session did not exist and was created
    pub created: bool,
    /// Session evicted to make room for the new one
    pub evicted: Option<SessionKey>,
}

#[derive(Debug)]
pub struct SessionCache {
    policy: SessionPolicy,
    sessions: HashMap<SessionKey, Entry>,
    /// Logical clock bumped on every access
    tick: u64,
}

impl SessionCache {
    pub fn new(policy: SessionPolicy) -> Self {
        Self {
            policy,
            sessions: HashMap::new(),
            tick: 0,
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Create the session with only the system turn if it is absent.
    ///
    /// Idempotent apart from refreshing the session's activity time.
    pub fn ensure(&mut self, key: &SessionKey) -> Ensured {
        let now = self.next_tick();
        if let Some(entry) = self.sessions.get_mut(key) {
            entry.last_active = now;
            return Ensured::default();
        }

        let evicted = if self.sessions.len() >= self.policy.max_sessions.max(1) {
            self.evict_least_recent()
        } else {
            None
        };

        self.sessions.insert(
            key.clone(),
            Entry {
                conversation: self.policy.new_conversation(),
                last_active: now,
            },
        );

        Ensured {
            created: true,
            evicted,
        }
    }

    fn evict_least_recent(&mut self) -> Option<SessionKey> {
        let oldest = self
            .sessions
            .iter()
            .min_by_key(|(_, entry)| entry.last_active)
            .map(|(key, _)| key.clone())?;
        self.sessions.remove(&oldest);
        Some(oldest)
    }

    /// Append a turn to a resident session.
    ///
    /// Returns the turns evicted by the history cap, or `None` when the
    /// session is not resident. A session evicted while a reply was in flight
    /// is not brought back with a partial history.
    pub fn append(
        &mut self,
        key: &SessionKey,
        role: Role,
        content: impl Into<String>,
    ) -> Option<Vec<Turn>> {
        let now = self.next_tick();
        let entry = self.sessions.get_mut(key)?;
        entry.last_active = now;
        Some(entry.conversation.append(role, content))
    }

    /// Owned copy of the session's history.
    pub fn snapshot(&mut self, key: &SessionKey) -> Option<Vec<Turn>> {
        let now = self.next_tick();
        self.sessions.get_mut(key).map(|entry| {
            entry.last_active = now;
            entry.conversation.snapshot()
        })
    }

    pub fn turn_count(&self, key: &SessionKey) -> Option<usize> {
        self.sessions.get(key).map(|entry| entry.conversation.len())
    }

    pub fn contains(&self, key: &SessionKey) -> bool {
        self.sessions.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
