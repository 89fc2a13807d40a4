//! Error types for the MQTT adapter

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Invalid broker url '{0}': expected host:port")]
    InvalidUrl(String),

    #[error("Broker connection failed: {0}")]
    Connection(#[from] rumqttc::ConnectionError),

    #[error("Timed out connecting to broker after {0}s")]
    ConnectTimeout(u64),
}
