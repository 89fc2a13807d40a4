//! Outbound message envelope

use serde::{Deserialize, Serialize};

/// Placeholder carried by terminal messages that have no text of their own,
/// so they are never mistaken for an empty/absent message.
pub const FINISH_SENTINEL: &str = " ";

/// Payload kind tag for generated images.
pub const IMAGE_PNG: &str = "image/png";

/// One message published to a session's response topic.
///
/// For a single request the relay publishes zero or more non-terminal
/// fragments (cumulative `text` growing monotonically) followed by exactly one
/// message with `is_finish` set. Failures are terminal too: `is_error`
/// messages always carry `is_finish = true`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Incremental fragment
    pub delta: String,
    /// Cumulative text so far
    pub text: String,
    pub is_finish: bool,
    pub is_error: bool,
    #[serde(
        default,
        with = "super::payload",
        skip_serializing_if = "Option::is_none"
    )]
    pub payload: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_type: Option<String>,
}

impl OutboundMessage {
    /// Non-terminal streaming fragment.
    pub fn fragment(delta: impl Into<String>, cumulative: impl Into<String>) -> Self {
        Self {
            delta: delta.into(),
            text: cumulative.into(),
            ..Self::default()
        }
    }

    /// Terminal message closing a successful stream.
    pub fn finish() -> Self {
        Self {
            delta: FINISH_SENTINEL.to_string(),
            text: FINISH_SENTINEL.to_string(),
            is_finish: true,
            ..Self::default()
        }
    }

    /// Terminal error message carrying user-facing text.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_finish: true,
            is_error: true,
            ..Self::default()
        }
    }

    /// Terminal message carrying a binary payload.
    pub fn with_payload(payload: Vec<u8>, payload_type: impl Into<String>) -> Self {
        Self {
            text: FINISH_SENTINEL.to_string(),
            is_finish: true,
            payload: Some(payload),
            payload_type: Some(payload_type.into()),
            ..Self::default()
        }
    }

    /// Terminal message carrying a PNG image.
    pub fn image(png: Vec<u8>) -> Self {
        Self::with_payload(png, IMAGE_PNG)
    }

    pub fn is_terminal(&self) -> bool {
        self.is_finish
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
