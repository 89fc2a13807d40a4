//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DomainError {
    #[error("Session key cannot be empty")]
    EmptySessionKey,

    #[error("Request carries neither text nor payload")]
    EmptyRequest,

    #[error("History cap must allow the system turn plus one exchange turn (got {0})")]
    HistoryCapTooSmall(usize),

    #[error("Session capacity cannot be 0")]
    ZeroSessionCapacity,

    #[error("Malformed request: {0}")]
    MalformedRequest(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_cap_display() {
        let error = DomainError::HistoryCapTooSmall(1);
        assert!(error.to_string().contains("got 1"));
    }
}
