//! Session domain.
//!
//! - [`entities::Turn`]: a single role-tagged message within a session
//! - [`history::Conversation`]: bounded turn history with a pinned system turn
//! - [`cache::SessionCache`]: session-key → conversation map with LRU eviction
//! - [`policy::SessionPolicy`]: caps and the system prompt
//! - [`stream::StreamEvent`]: incremental events from a streaming completion

pub mod cache;
pub mod entities;
pub mod history;
pub mod policy;
pub mod stream;
