//! Shared plumbing for the request handlers.
//!
//! Holds the [`RelayContext`] every handler runs against, the per-request
//! [`RequestScope`] (deadline plus cancellation), the [`RelayError`] type and
//! the [`ResponseSink`] that publishes replies to the originating topic.

use crate::config::RelayConfig;
use crate::ports::ai_provider::{AiProvider, ProviderError};
use crate::ports::publisher::ResponsePublisher;
use crate::ports::session_store::SessionStore;
use crate::ports::transcript::{NoTranscript, TranscriptEntry, TranscriptEvent, TranscriptLogger};
use relay_domain::{CapabilityClassifier, DomainError, OutboundMessage, SessionKey};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Errors that end a request. Each one becomes exactly one error message on
/// the request's topic.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Failed to open chat stream: {0}")]
    StreamOpen(ProviderError),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Image generation failed: {0}")]
    Generation(ProviderError),

    #[error("Provider returned an unreadable image: {0}")]
    InvalidImage(String),

    #[error("Transcription failed: {0}")]
    Transcription(ProviderError),

    #[error("Transcription produced no text")]
    EmptyTranscript,

    #[error("Failed to spool audio: {0}")]
    Spool(#[from] std::io::Error),

    #[error("Invalid request: {0}")]
    Request(#[from] DomainError),

    #[error("Request timed out")]
    Timeout,

    #[error("Request cancelled")]
    Cancelled,
}

impl RelayError {
    /// Map a provider error, keeping deadline and cancellation distinct from
    /// the capability-specific failure `wrap` describes.
    pub fn from_provider(error: ProviderError, wrap: fn(ProviderError) -> RelayError) -> Self {
        match error {
            ProviderError::Timeout => RelayError::Timeout,
            ProviderError::Cancelled => RelayError::Cancelled,
            other => wrap(other),
        }
    }

    /// Text shown to the user.
    ///
    /// A chat stream that never opened gets the bare apology; everything
    /// else carries the error detail after it.
    pub fn user_message(&self, apology: &str) -> String {
        match self {
            RelayError::StreamOpen(_) => apology.to_string(),
            other => format!("{apology} 错误信息:{other}"),
        }
    }

    /// Stable identifier for transcript records.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::StreamOpen(_) => "stream_open",
            RelayError::Stream(_) => "stream",
            RelayError::Generation(_) => "generation",
            RelayError::InvalidImage(_) => "invalid_image",
            RelayError::Transcription(_) => "transcription",
            RelayError::EmptyTranscript => "empty_transcript",
            RelayError::Spool(_) => "spool",
            RelayError::Request(_) => "request",
            RelayError::Timeout => "timeout",
            RelayError::Cancelled => "cancelled",
        }
    }
}

/// Everything a handler needs, shared by the dispatcher and its workers.
pub struct RelayContext {
    pub provider: Arc<dyn AiProvider>,
    pub publisher: Arc<dyn ResponsePublisher>,
    pub store: Arc<dyn SessionStore>,
    pub classifier: CapabilityClassifier,
    pub transcript: Arc<dyn TranscriptLogger>,
    pub config: RelayConfig,
}

impl RelayContext {
    pub fn new(
        provider: Arc<dyn AiProvider>,
        publisher: Arc<dyn ResponsePublisher>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            provider,
            publisher,
            store,
            classifier: CapabilityClassifier::default(),
            transcript: Arc::new(NoTranscript),
            config: RelayConfig::default(),
        }
    }

    pub fn with_classifier(mut self, classifier: CapabilityClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_transcript(mut self, transcript: Arc<dyn TranscriptLogger>) -> Self {
        self.transcript = transcript;
        self
    }

    pub fn with_config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    pub(crate) fn sink<'a>(&'a self, topic: &'a SessionKey) -> ResponseSink<'a> {
        ResponseSink {
            publisher: self.publisher.as_ref(),
            topic,
            apology: &self.config.apology,
        }
    }

    pub(crate) fn record(&self, event: TranscriptEvent, session: &SessionKey, fields: Value) {
        self.transcript.record(TranscriptEntry {
            event,
            session: session.clone(),
            fields,
        });
    }

    pub(crate) fn scope(&self, parent: &CancellationToken) -> RequestScope {
        RequestScope::new(parent, self.config.request_timeout)
    }

    /// Send the single error message for a failed request and record it.
    pub(crate) async fn report_failure(&self, key: &SessionKey, error: &RelayError) {
        warn!(session = %key, error = %error, "Request failed");
        self.sink(key).fail(error).await;
        self.record(
            TranscriptEvent::RequestFailed,
            key,
            serde_json::json!({
                "kind": error.kind(),
                "error": error.to_string(),
            }),
        );
    }
}

/// Deadline and cancellation for one request.
///
/// Dropping the scope cancels its token, so provider work still running
/// for a finished request is torn down.
pub struct RequestScope {
    cancel: CancellationToken,
    deadline: Instant,
}

impl RequestScope {
    pub fn new(parent: &CancellationToken, timeout: Duration) -> Self {
        Self {
            cancel: parent.child_token(),
            deadline: Instant::now() + timeout,
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run `fut` until it finishes, the deadline passes or the scope is
    /// cancelled, whichever comes first. Hitting the deadline cancels the
    /// scope.
    pub async fn bound<T, F>(&self, fut: F) -> Result<T, ProviderError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ProviderError::Cancelled),
            result = tokio::time::timeout_at(self.deadline, fut) => match result {
                Ok(inner) => inner,
                Err(_) => {
                    self.cancel.cancel();
                    Err(ProviderError::Timeout)
                }
            },
        }
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Publishes replies for one topic. Publish failures are logged, never
/// propagated.
pub(crate) struct ResponseSink<'a> {
    publisher: &'a dyn ResponsePublisher,
    topic: &'a SessionKey,
    apology: &'a str,
}

impl ResponseSink<'_> {
    pub(crate) async fn send(&self, message: OutboundMessage) {
        if let Err(e) = self.publisher.publish(self.topic, &message).await {
            warn!(session = %self.topic, error = %e, "Failed to publish response");
        }
    }

    pub(crate) async fn fail(&self, error: &RelayError) {
        self.send(OutboundMessage::error(error.user_message(self.apology)))
            .await;
    }
}
