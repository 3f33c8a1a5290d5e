//! MQTT bus client
//!
//! Drives the `rumqttc` event loop, subscribing on every ConnAck and handing
//! each publish to the [`IngestAdapter`] in arrival order.

use std::sync::Arc;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio_util::sync::CancellationToken;

use super::adapter::IngestAdapter;
use super::backoff::Backoff;
use super::config::MqttConfig;
use crate::error::Result;
use crate::relay::Relay;

/// MQTT ingestion task
pub struct MqttIngest {
    config: MqttConfig,
    adapter: IngestAdapter,
}

impl MqttIngest {
    /// Create an ingestion task feeding `relay`
    pub fn new(config: MqttConfig, relay: Arc<Relay>) -> Self {
        let adapter = IngestAdapter::new(relay, config.api_key.clone());
        Self { config, adapter }
    }

    /// Ingestion configuration
    pub fn config(&self) -> &MqttConfig {
        &self.config
    }

    /// Client options derived from the configuration
    pub fn options(&self) -> MqttOptions {
        let client_id = self.config.client_id(chrono::Utc::now().timestamp());
        let mut options = MqttOptions::new(client_id, self.config.host.clone(), self.config.port);

        options.set_keep_alive(self.config.keep_alive);
        options.set_clean_session(self.config.clean_session);
        options.set_max_packet_size(self.config.max_packet_size, self.config.max_packet_size);

        if let (Some(user), Some(pass)) = (&self.config.username, &self.config.password) {
            options.set_credentials(user.clone(), pass.clone());
        }

        options
    }

    /// Run until `shutdown` is cancelled
    ///
    /// Connection errors never end the loop; the event loop reconnects on the
    /// next poll after a backoff delay.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let options = self.options();
        tracing::info!(
            client_id = %options.client_id(),
            broker = %format!("{}:{}", self.config.host, self.config.port),
            topic = %self.config.topic,
            "Connecting to MQTT broker"
        );

        let (client, mut eventloop) = AsyncClient::new(options, self.config.request_capacity);
        let mut backoff = Backoff::new(self.config.reconnect_min, self.config.reconnect_max);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                keep_going = self.poll_once(&client, &mut eventloop, &mut backoff, &shutdown) => {
                    if !keep_going {
                        break;
                    }
                }
            }
        }

        self.stats_disconnected();
        if let Err(e) = client.try_disconnect() {
            tracing::debug!(error = %e, "MQTT disconnect request not queued");
        }
        tracing::info!("MQTT ingestion stopped");

        Ok(())
    }

    /// Poll one event; returns `false` if shutdown was requested while
    /// backing off
    async fn poll_once(
        &self,
        client: &AsyncClient,
        eventloop: &mut EventLoop,
        backoff: &mut Backoff,
        shutdown: &CancellationToken,
    ) -> bool {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                self.adapter.relay().stats().set_bus_connected(true);
                backoff.reset();
                tracing::info!(
                    session_present = ack.session_present,
                    "Connected to MQTT broker"
                );

                // Subscribe on every connect so reconnects restore the subscription
                match client.try_subscribe(self.config.topic.clone(), QoS::AtLeastOnce) {
                    Ok(()) => tracing::info!(topic = %self.config.topic, "Subscribing to topic"),
                    Err(e) => {
                        tracing::error!(topic = %self.config.topic, error = %e, "Failed to queue subscription")
                    }
                }
            }
            Ok(Event::Incoming(Packet::SubAck(ack))) => {
                tracing::info!(pkid = ack.pkid, return_codes = ?ack.return_codes, "Subscription acknowledged");
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                tracing::debug!(
                    topic = %publish.topic,
                    bytes = publish.payload.len(),
                    "Message received"
                );
                // Errors are logged and counted by the adapter
                let _ = self.adapter.on_message(&publish.payload).await;
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                self.stats_disconnected();
                tracing::warn!("Broker sent disconnect");
            }
            Ok(_) => {}
            Err(e) => {
                self.stats_disconnected();
                let delay = backoff.next_delay();
                tracing::error!(
                    error = %e,
                    retry_in_secs = delay.as_secs(),
                    "Connection lost to MQTT broker, will reconnect"
                );

                tokio::select! {
                    _ = shutdown.cancelled() => return false,
                    _ = tokio::time::sleep(delay) => {
                        tracing::info!("Attempting to reconnect to MQTT broker");
                    }
                }
            }
        }

        true
    }

    fn stats_disconnected(&self) {
        self.adapter.relay().stats().set_bus_connected(false);
    }
}
