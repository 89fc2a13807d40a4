//! Application layer for mqtt-gpt-relay
//!
//! This crate contains the dispatcher, the request handlers, port
//! definitions, and application configuration. It depends only on the domain
//! layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::RelayConfig;
pub use ports::{
    ai_provider::{AiProvider, ProviderError, StreamHandle},
    publisher::{PublishError, ResponsePublisher},
    session_store::{InMemorySessionStore, SessionStore},
    transcript::{NoTranscript, TranscriptEntry, TranscriptEvent, TranscriptLogger},
};
pub use use_cases::dispatch::{DispatchError, InboundDispatcher, RequestSender};
pub use use_cases::shared::{RelayContext, RelayError, RequestScope};
pub use use_cases::{audio::AudioHandler, chat::ChatStreamHandler, image::ImageHandler};
