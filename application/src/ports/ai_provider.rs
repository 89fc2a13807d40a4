//! AI provider port
//!
//! Defines the interface for the three remote capabilities the relay uses:
//! streamed chat completion, image generation and audio transcription.

use async_trait::async_trait;
use relay_domain::{StreamEvent, Turn};
use std::path::Path;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Errors that can occur during provider operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Cancelled")]
    Cancelled,

    #[error("Other error: {0}")]
    Other(String),
}

/// Remote AI service.
///
/// Implementations live in the infrastructure layer. Every call honours the
/// cancellation token: once it fires, in-flight network work is abandoned.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Open a streamed chat completion over the given history.
    ///
    /// An error here means the stream never opened. Failures after that
    /// point arrive as [`StreamEvent::Error`] on the handle.
    async fn stream_chat(
        &self,
        history: &[Turn],
        cancel: CancellationToken,
    ) -> Result<StreamHandle, ProviderError>;

    /// Generate a single image and return its PNG bytes.
    async fn generate_image(
        &self,
        prompt: &str,
        cancel: CancellationToken,
    ) -> Result<Vec<u8>, ProviderError>;

    /// Transcribe the audio file at `audio` into text.
    async fn transcribe(
        &self,
        audio: &Path,
        cancel: CancellationToken,
    ) -> Result<String, ProviderError>;
}

/// Handle for receiving streaming events from a chat completion.
///
/// Wraps the `mpsc::Receiver<StreamEvent>` the provider's stream task feeds.
pub struct StreamHandle {
    pub receiver: mpsc::Receiver<StreamEvent>,
}

impl StreamHandle {
    pub fn new(receiver: mpsc::Receiver<StreamEvent>) -> Self {
        Self { receiver }
    }

    /// Next event, or `None` once the producer has gone away.
    pub async fn next(&mut self) -> Option<StreamEvent> {
        self.receiver.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_next_yields_events_then_none() {
        let (tx, rx) = mpsc::channel(4);
        let mut handle = StreamHandle::new(rx);
        tx.send(StreamEvent::Delta("Hel".into())).await.unwrap();
        tx.send(StreamEvent::Completed).await.unwrap();
        drop(tx);

        assert_eq!(handle.next().await, Some(StreamEvent::Delta("Hel".into())));
        assert_eq!(handle.next().await, Some(StreamEvent::Completed));
        assert_eq!(handle.next().await, None);
    }
}
