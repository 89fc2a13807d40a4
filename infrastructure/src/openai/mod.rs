//! OpenAI-compatible HTTP provider.
//!
//! Implements the `AiProvider` port against `/chat/completions` (streamed
//! over SSE), `/images/generations` and `/audio/transcriptions`, routed
//! through the configured proxy.

mod error;
mod provider;
mod sse;
mod types;

pub use error::OpenAiError;
pub use provider::{OpenAiConfig, OpenAiProvider};
pub use sse::{SseDecoder, SseFrame};
