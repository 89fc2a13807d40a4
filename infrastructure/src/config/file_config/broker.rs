//! Broker configuration from TOML (`[broker]` section)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileBrokerConfig {
    /// Broker address as `host:port` (required)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// MQTT client identifier
    pub client_id: String,
    /// Topic carrying text requests
    pub request_topic: String,
    /// Topic carrying audio requests
    pub audio_topic: String,
    /// MQTT keep-alive interval in seconds
    pub keep_alive_secs: u64,
    /// Capacity of the MQTT client's request channel
    pub channel_capacity: usize,
    /// Largest MQTT packet accepted or sent, in bytes
    pub max_packet_bytes: usize,
}

impl Default for FileBrokerConfig {
    fn default() -> Self {
        Self {
            url: None,
            client_id: "go-mqtt-chat".to_string(),
            request_topic: "ChatRequest".to_string(),
            audio_topic: "ChatRequestAudio".to_string(),
            keep_alive_secs: 30,
            channel_capacity: 64,
            max_packet_bytes: 16 * 1024 * 1024,
        }
    }
}
