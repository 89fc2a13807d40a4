//! Broker connection and subscription loop.

use super::error::BrokerError;
use super::publisher::MqttPublisher;
use relay_application::{DispatchError, RequestSender};
use rumqttc::{AsyncClient, ClientError, Event, EventLoop, MqttOptions, Outgoing, Packet, Publish, QoS};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const DEFAULT_PORT: u16 = 1883;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const RECONNECT_DELAY: Duration = Duration::from_secs(2);
const DISCONNECT_GRACE: Duration = Duration::from_secs(3);

/// Connection parameters.
#[derive(Debug, Clone)]
pub struct BrokerSettings {
    /// `host:port`, optionally prefixed with `tcp://` or `mqtt://`
    pub url: String,
    pub client_id: String,
    pub request_topic: String,
    pub audio_topic: String,
    pub keep_alive: Duration,
    pub channel_capacity: usize,
    pub max_packet_bytes: usize,
}

impl BrokerSettings {
    /// Split the url into host and port.
    pub fn host_port(&self) -> Result<(String, u16), BrokerError> {
        let trimmed = self.url.trim();
        let address = trimmed
            .strip_prefix("tcp://")
            .or_else(|| trimmed.strip_prefix("mqtt://"))
            .unwrap_or(trimmed);

        let invalid = || BrokerError::InvalidUrl(self.url.clone());
        let (host, port) = match address.rsplit_once(':') {
            Some((host, port)) => (host, port.parse::<u16>().map_err(|_| invalid())?),
            None => (address, DEFAULT_PORT),
        };
        if host.is_empty() {
            return Err(invalid());
        }
        Ok((host.to_string(), port))
    }

    fn options(&self) -> Result<MqttOptions, BrokerError> {
        let (host, port) = self.host_port()?;
        let mut options = MqttOptions::new(self.client_id.clone(), host, port);
        options.set_keep_alive(self.keep_alive);
        options.set_max_packet_size(self.max_packet_bytes, self.max_packet_bytes);
        Ok(options)
    }
}

/// A live broker connection.
pub struct MqttBroker {
    client: AsyncClient,
    eventloop: EventLoop,
    settings: BrokerSettings,
}

impl MqttBroker {
    /// Connect and wait for the broker's acknowledgement. Failing to reach
    /// the broker here is fatal; later disconnects are retried by `run`.
    pub async fn connect(settings: BrokerSettings) -> Result<(Self, MqttPublisher), BrokerError> {
        let options = settings.options()?;
        let (client, mut eventloop) = AsyncClient::new(options, settings.channel_capacity);

        tokio::time::timeout(CONNECT_TIMEOUT, async {
            loop {
                if let Event::Incoming(Packet::ConnAck(ack)) = eventloop.poll().await? {
                    debug!(code = ?ack.code, "Broker acknowledged connection");
                    return Ok::<(), BrokerError>(());
                }
            }
        })
        .await
        .map_err(|_| BrokerError::ConnectTimeout(CONNECT_TIMEOUT.as_secs()))??;

        info!(url = %settings.url, client_id = %settings.client_id, "Connected to broker");
        let publisher = MqttPublisher::new(client.clone());
        Ok((
            Self {
                client,
                eventloop,
                settings,
            },
            publisher,
        ))
    }

    /// Subscribe and pump the event loop until `stop` fires.
    ///
    /// Every inbound publish is decoded and handed to `sender` without
    /// blocking. Subscriptions are renewed after each reconnect from a
    /// separate task, since the request channel they queue on is only
    /// drained by this loop. Replies queued on the publisher are flushed
    /// before disconnecting, so `stop` should fire only once the dispatcher
    /// has drained.
    pub async fn run(mut self, sender: RequestSender, stop: CancellationToken) {
        let mut subscribing = self.resubscribe(None);

        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => {
                    subscribing.abort();
                    self.disconnect().await;
                    break;
                }
                event = self.eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::Publish(publish))) => self.on_publish(&sender, publish),
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("Reconnected to broker");
                        subscribing = self.resubscribe(Some(subscribing));
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "Broker connection lost, retrying");
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                },
            }
        }
    }

    async fn disconnect(&mut self) {
        info!("Disconnecting from broker");
        if let Err(e) = self.client.try_disconnect() {
            debug!(error = %e, "Disconnect request not queued");
            return;
        }
        let flushed = tokio::time::timeout(DISCONNECT_GRACE, async {
            loop {
                match self.eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        })
        .await;
        if flushed.is_err() {
            warn!("Broker did not complete disconnect in time");
        }
    }

    /// Replace any subscription still pending from an earlier connection.
    fn resubscribe(&self, previous: Option<JoinHandle<()>>) -> JoinHandle<()> {
        if let Some(previous) = previous {
            previous.abort();
        }
        let client = self.client.clone();
        let topics = vec![
            self.settings.request_topic.clone(),
            self.settings.audio_topic.clone(),
        ];
        tokio::spawn(async move {
            if let Err(e) = subscribe_all(&client, &topics).await {
                warn!(error = %e, "Subscription not queued");
            }
        })
    }

    fn on_publish(&self, sender: &RequestSender, publish: Publish) {
        debug!(topic = %publish.topic, bytes = publish.payload.len(), "Request received");
        match sender.submit_raw(&publish.payload) {
            Ok(()) => {}
            Err(DispatchError::Request(e)) => {
                warn!(topic = %publish.topic, error = %e, "Dropped malformed request");
            }
            Err(DispatchError::Closed) => {
                warn!(topic = %publish.topic, "Dispatcher closed, request dropped");
            }
        }
    }
}

/// Queue a subscription per topic, waiting while the request channel is full.
async fn subscribe_all(client: &AsyncClient, topics: &[String]) -> Result<(), ClientError> {
    for topic in topics {
        client.subscribe(topic.as_str(), QoS::AtMostOnce).await?;
        info!(topic = %topic, "Subscribed");
    }
    Ok(())
}
