//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and converted into application and domain
//! types once validated.

mod broker;
mod classifier;
mod provider;
mod session;
mod storage;

pub use broker::FileBrokerConfig;
pub use classifier::FileClassifierConfig;
pub use provider::FileProviderConfig;
pub use session::FileSessionConfig;
pub use storage::FileStorageConfig;

use crate::mqtt::BrokerSettings;
use crate::openai::OpenAiConfig;
use relay_application::RelayConfig;
use relay_domain::{CapabilityClassifier, DomainError, SessionPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Configuration validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigValidationError {
    #[error("broker url is required (--url, [broker].url or RELAY_BROKER__URL)")]
    MissingBrokerUrl,

    #[error("provider proxy is required (--proxy, [provider].proxy or RELAY_PROVIDER__PROXY)")]
    MissingProxy,

    #[error("provider api key is required (--key, [provider].api_key or RELAY_PROVIDER__API_KEY)")]
    MissingApiKey,

    #[error("timeout_seconds cannot be 0")]
    InvalidTimeout,

    #[error("{0} cannot be empty")]
    EmptyTopic(&'static str),

    #[error("invalid session settings: {0}")]
    Session(#[from] DomainError),
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub broker: FileBrokerConfig,
    pub provider: FileProviderConfig,
    pub session: FileSessionConfig,
    pub classifier: FileClassifierConfig,
    pub storage: FileStorageConfig,
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

impl FileConfig {
    /// Check the mandatory settings and value ranges.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if is_blank(&self.broker.url) {
            return Err(ConfigValidationError::MissingBrokerUrl);
        }
        if is_blank(&self.provider.proxy) {
            return Err(ConfigValidationError::MissingProxy);
        }
        if is_blank(&self.provider.api_key) {
            return Err(ConfigValidationError::MissingApiKey);
        }
        if self.provider.timeout_seconds == 0 {
            return Err(ConfigValidationError::InvalidTimeout);
        }
        if self.broker.request_topic.trim().is_empty() {
            return Err(ConfigValidationError::EmptyTopic("broker.request_topic"));
        }
        if self.broker.audio_topic.trim().is_empty() {
            return Err(ConfigValidationError::EmptyTopic("broker.audio_topic"));
        }
        self.session.to_policy().validate()?;
        Ok(())
    }

    pub fn session_policy(&self) -> SessionPolicy {
        self.session.to_policy()
    }

    pub fn classifier(&self) -> CapabilityClassifier {
        self.classifier.to_classifier()
    }

    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig::default()
            .with_request_timeout(Duration::from_secs(self.provider.timeout_seconds))
            .with_apology(self.session.apology.clone())
            .with_audio_dir(self.storage.audio_dir.clone())
            .with_image_dir(self.storage.image_dir.clone())
            .with_worker_idle_timeout(Duration::from_secs(self.session.worker_idle_secs.max(1)))
    }

    pub fn openai_config(&self) -> OpenAiConfig {
        let provider = &self.provider;
        OpenAiConfig {
            api_key: provider.api_key.clone().unwrap_or_default(),
            proxy: provider.proxy.clone().filter(|p| !p.trim().is_empty()),
            base_url: provider.base_url.trim_end_matches('/').to_string(),
            chat_model: provider.chat_model.clone(),
            max_tokens: provider.max_tokens,
            image_size: provider.image_size.clone(),
            transcription_model: provider.transcription_model.clone(),
        }
    }

    pub fn broker_settings(&self) -> BrokerSettings {
        let broker = &self.broker;
        BrokerSettings {
            url: broker.url.clone().unwrap_or_default(),
            client_id: broker.client_id.clone(),
            request_topic: broker.request_topic.clone(),
            audio_topic: broker.audio_topic.clone(),
            keep_alive: Duration::from_secs(broker.keep_alive_secs.max(5)),
            channel_capacity: broker.channel_capacity.max(1),
            max_packet_bytes: broker.max_packet_bytes,
        }
    }
}
