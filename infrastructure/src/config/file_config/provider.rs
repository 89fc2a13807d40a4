//! Remote provider configuration from TOML (`[provider]` section)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileProviderConfig {
    /// API key (required)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Outbound HTTP proxy URL (required)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    /// Base URL of the OpenAI-compatible API
    pub base_url: String,
    pub chat_model: String,
    pub max_tokens: u32,
    /// Size of generated images, e.g. `256x256`
    pub image_size: String,
    pub transcription_model: String,
    /// Per-request deadline in seconds
    pub timeout_seconds: u64,
}

impl Default for FileProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            proxy: None,
            base_url: "https://api.openai.com/v1".to_string(),
            chat_model: "gpt-3.5-turbo".to_string(),
            max_tokens: 800,
            image_size: "256x256".to_string(),
            transcription_model: "whisper-1".to_string(),
            timeout_seconds: 120,
        }
    }
}
