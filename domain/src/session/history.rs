//! Bounded conversation history.

use super::entities::{Role, Turn};

/// The ordered turn history of one session.
///
/// Position 0 always holds the system turn. The sequence never grows past
/// `max_turns`; appending beyond the cap evicts the oldest turn at index 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    turns: Vec<Turn>,
    max_turns: usize,
}

impl Conversation {
    /// Minimum cap: the system turn plus one exchange turn.
    pub const MIN_TURNS: usize = 2;

    /// Start a conversation holding only the system turn.
    ///
    /// Caps below [`Self::MIN_TURNS`] are raised to it.
    pub fn new(system_prompt: impl Into<String>, max_turns: usize) -> Self {
        let max_turns = max_turns.max(Self::MIN_TURNS);
        let mut turns = Vec::with_capacity(max_turns);
        turns.push(Turn::system(system_prompt));
        Self { turns, max_turns }
    }

    /// Append a turn, returning the turns evicted to respect the cap
    /// (oldest first).
    pub fn push(&mut self, turn: Turn) -> Vec<Turn> {
        self.turns.push(turn);
        let overflow = self.turns.len().saturating_sub(self.max_turns);
        self.turns.drain(1..1 + overflow).collect()
    }

    pub fn append(&mut self, role: Role, content: impl Into<String>) -> Vec<Turn> {
        self.push(Turn::new(role, content))
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Owned copy of the current history, suitable as a prompt.
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    pub fn system_turn(&self) -> &Turn {
        &self.turns[0]
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Always false: the system turn is never removed.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }
}
