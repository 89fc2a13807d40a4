//! Transcript port.
//!
//! The relay can keep a machine-readable record of every request it
//! handles, one [`TranscriptEntry`] per step. This is separate from the
//! `tracing` diagnostics, which stay human-oriented.

use relay_domain::SessionKey;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Steps of a request that end up in the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptEvent {
    /// Decoded off the broker, before validation
    RequestReceived,
    /// Routed to chat, image or audio
    RequestClassified,
    ChatCompleted,
    ImageGenerated,
    /// Audio turned into text and resubmitted
    AudioTranscribed,
    /// The client received the error message
    RequestFailed,
}

impl TranscriptEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptEvent::RequestReceived => "request_received",
            TranscriptEvent::RequestClassified => "request_classified",
            TranscriptEvent::ChatCompleted => "chat_completed",
            TranscriptEvent::ImageGenerated => "image_generated",
            TranscriptEvent::AudioTranscribed => "audio_transcribed",
            TranscriptEvent::RequestFailed => "request_failed",
        }
    }
}

impl fmt::Display for TranscriptEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One transcript line: what happened, to which session, and the details.
#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    pub event: TranscriptEvent,
    pub session: SessionKey,
    /// Event-specific fields, usually a JSON object
    pub fields: Value,
}

/// Sink for transcript entries.
///
/// `record` runs inline on the request path, so it must not block for long
/// and never fails. Implementations deal with their own write errors.
pub trait TranscriptLogger: Send + Sync {
    fn record(&self, entry: TranscriptEntry);
}

/// Used when no transcript was requested.
pub struct NoTranscript;

impl TranscriptLogger for NoTranscript {
    fn record(&self, _entry: TranscriptEntry) {}
}
