//! `ResponsePublisher` over MQTT.

use async_trait::async_trait;
use relay_application::{PublishError, ResponsePublisher};
use relay_domain::{OutboundMessage, SessionKey};
use rumqttc::{AsyncClient, QoS};
use tracing::trace;

/// Publishes replies at QoS 0, not retained. The client is a cheap handle
/// onto the shared connection and is safe to use from many tasks.
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
}

impl MqttPublisher {
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResponsePublisher for MqttPublisher {
    async fn publish(
        &self,
        topic: &SessionKey,
        message: &OutboundMessage,
    ) -> Result<(), PublishError> {
        let body = message.encode()?;
        trace!(topic = %topic, bytes = body.len(), finish = message.is_finish, "Publishing");
        self.client
            .publish(topic.as_str(), QoS::AtMostOnce, false, body)
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))
    }
}
