//! Streaming events for chat completions.
//!
//! [`StreamEvent`] represents individual events in a streaming completion,
//! enabling responses to be relayed to the broker as they are generated.

/// An event in a streaming chat completion.
///
/// Bridges infrastructure-level streaming (SSE chunks from the provider) to
/// the application layer. A well-formed stream is zero or more `Delta`s
/// followed by exactly one `Completed` or `Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A text fragment from the model.
    Delta(String),
    /// End of stream: every fragment has been delivered.
    Completed,
    /// The stream failed after it was opened.
    Error(String),
}

impl StreamEvent {
    /// Returns true if this event signals the end of the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Completed | StreamEvent::Error(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_is_not_terminal() {
        assert!(!StreamEvent::Delta("hello".to_string()).is_terminal());
    }

    #[test]
    fn completed_and_error_are_terminal() {
        assert!(StreamEvent::Completed.is_terminal());
        assert!(StreamEvent::Error("oops".to_string()).is_terminal());
    }
}
