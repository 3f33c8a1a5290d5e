//! Relay binary
//!
//! Reads `scanner-relay.toml` (or `$SCANNER_RELAY_CONFIG`) and `RELAY_*`
//! environment overrides, then runs MQTT ingestion and the WebSocket server
//! until Ctrl+C.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use scanner_relay::{config, MqttIngest, Relay, RelayServer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("scanner_relay=info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let path = config::config_path();
    let settings = config::load(&path)?;
    tracing::info!(
        config = %path.display(),
        bind = %settings.server.bind_addr,
        broker = %format!("{}:{}", settings.mqtt.host, settings.mqtt.port),
        topic = %settings.mqtt.topic,
        fingerprint = ?settings.relay.fingerprint,
        "Starting scanner relay"
    );

    let relay = Arc::new(Relay::new(settings.relay));

    let bus_shutdown = CancellationToken::new();
    let ingest = MqttIngest::new(settings.mqtt, Arc::clone(&relay));
    let ingest_handle = tokio::spawn(ingest.run(bus_shutdown.clone()));

    let server = Arc::new(RelayServer::new(settings.server, relay));
    let result = server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            }
        })
        .await;

    bus_shutdown.cancel();
    match ingest_handle.await {
        Ok(Err(e)) => tracing::error!(error = %e, "MQTT ingestion failed"),
        Err(e) => tracing::error!(error = %e, "MQTT ingestion task panicked"),
        Ok(Ok(())) => {}
    }

    result?;
    Ok(())
}
