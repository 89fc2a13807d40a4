//! Session policy value object

use super::history::Conversation;
use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Default system prompt seeded into every new session.
pub const DEFAULT_SYSTEM_PROMPT: &str = "你是一个聊天助手。你的名字叫做胖虎";

/// One system turn plus ten user/assistant exchanges.
pub const DEFAULT_MAX_TURNS: usize = 21;

/// Default number of resident sessions before the least recently active one
/// is evicted.
pub const DEFAULT_MAX_SESSIONS: usize = 1024;

/// How sessions are seeded and bounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionPolicy {
    /// Content of the system turn at position 0
    pub system_prompt: String,
    /// Maximum turns per session, system turn included
    pub max_turns: usize,
    /// Maximum resident sessions
    pub max_sessions: usize,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_turns: DEFAULT_MAX_TURNS,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

impl SessionPolicy {
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.max_turns < Conversation::MIN_TURNS {
            return Err(DomainError::HistoryCapTooSmall(self.max_turns));
        }
        if self.max_sessions == 0 {
            return Err(DomainError::ZeroSessionCapacity);
        }
        Ok(())
    }

    /// Fresh conversation seeded with the system turn.
    pub fn new_conversation(&self) -> Conversation {
        Conversation::new(self.system_prompt.clone(), self.max_turns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_valid() {
        let policy = SessionPolicy::default();
        assert!(policy.validate().is_ok());
        assert_eq!(policy.max_turns, 21);
    }

    #[test]
    fn rejects_tiny_history_cap() {
        let policy = SessionPolicy::default().with_max_turns(1);
        assert_eq!(policy.validate(), Err(DomainError::HistoryCapTooSmall(1)));
    }

    #[test]
    fn rejects_zero_sessions() {
        let policy = SessionPolicy::default().with_max_sessions(0);
        assert_eq!(policy.validate(), Err(DomainError::ZeroSessionCapacity));
    }

    #[test]
    fn new_conversation_uses_policy() {
        let policy = SessionPolicy::default()
            .with_system_prompt("sys")
            .with_max_turns(4);
        let conversation = policy.new_conversation();
        assert_eq!(conversation.system_turn().content, "sys");
        assert_eq!(conversation.max_turns(), 4);
    }
}
