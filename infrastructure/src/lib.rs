//! Infrastructure layer for mqtt-gpt-relay
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: the MQTT transport, the OpenAI provider,
//! the JSONL transcript logger, and configuration file loading.

pub mod config;
pub mod logging;
pub mod mqtt;
pub mod openai;

// Re-export commonly used types
pub use config::{
    ConfigLoader, ConfigOverrides, ConfigValidationError, FileBrokerConfig, FileClassifierConfig,
    FileConfig, FileProviderConfig, FileSessionConfig, FileStorageConfig,
};
pub use logging::JsonlTranscriptLogger;
pub use mqtt::{BrokerError, BrokerSettings, MqttBroker, MqttPublisher};
pub use openai::{OpenAiConfig, OpenAiError, OpenAiProvider};
