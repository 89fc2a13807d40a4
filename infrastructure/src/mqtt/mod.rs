//! MQTT transport.
//!
//! [`MqttBroker`] owns the connection and its event loop: it subscribes to
//! the request topics and feeds decoded requests to the dispatcher.
//! [`MqttPublisher`] implements the `ResponsePublisher` port on the same
//! connection.

mod broker;
mod error;
mod publisher;

pub use broker::{BrokerSettings, MqttBroker};
pub use error::BrokerError;
pub use publisher::MqttPublisher;
