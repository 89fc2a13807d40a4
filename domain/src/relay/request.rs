//! Inbound request envelope

use crate::core::error::DomainError;
use crate::session::entities::SessionKey;
use serde::{Deserialize, Serialize};

/// A decoded unit of work.
///
/// ```json
/// { "topic": "s1", "msg": "你好", "payload": "<base64>", "payload_type": "wav" }
/// ```
///
/// Exactly one of `msg` / `payload` is expected to be non-empty. Audio
/// requests get their `msg` filled in by transcription before they are
/// dispatched again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundRequest {
    /// Session key and response topic
    pub topic: SessionKey,
    /// Text of the request
    #[serde(default)]
    pub msg: String,
    /// Raw binary payload (e.g. audio)
    #[serde(
        default,
        with = "super::payload",
        skip_serializing_if = "Option::is_none"
    )]
    pub payload: Option<Vec<u8>>,
    /// Payload format, e.g. `wav` or `m4a`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub payload_type: String,
}

impl InboundRequest {
    pub fn text(topic: impl Into<SessionKey>, msg: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            msg: msg.into(),
            ..Self::default()
        }
    }

    pub fn audio(
        topic: impl Into<SessionKey>,
        audio: Vec<u8>,
        payload_type: impl Into<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            msg: String::new(),
            payload: Some(audio),
            payload_type: payload_type.into(),
        }
    }

    /// Decode a broker message body.
    ///
    /// Fails when the JSON is malformed or the topic is missing, since no
    /// response can be routed without it.
    pub fn decode(body: &[u8]) -> Result<Self, DomainError> {
        let request: Self = serde_json::from_slice(body)
            .map_err(|e| DomainError::MalformedRequest(e.to_string()))?;
        if request.topic.is_empty() {
            return Err(DomainError::EmptySessionKey);
        }
        Ok(request)
    }

    pub fn has_text(&self) -> bool {
        !self.msg.is_empty()
    }

    pub fn has_payload(&self) -> bool {
        self.payload.as_ref().is_some_and(|p| !p.is_empty())
    }

    /// Audio awaiting transcription: a payload and no text yet.
    pub fn needs_transcription(&self) -> bool {
        self.has_payload() && !self.has_text()
    }

    /// Rejects requests that carry nothing to act on.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.topic.is_empty() {
            return Err(DomainError::EmptySessionKey);
        }
        if !self.has_text() && !self.has_payload() {
            return Err(DomainError::EmptyRequest);
        }
        Ok(())
    }

    /// Turn a transcribed audio request into an ordinary text request.
    pub fn with_transcript(mut self, transcript: impl Into<String>) -> Self {
        self.msg = transcript.into();
        self.payload = None;
        self
    }

    /// Payload size in bytes (0 without payload).
    pub fn payload_len(&self) -> usize {
        self.payload.as_ref().map_or(0, Vec::len)
    }
}
