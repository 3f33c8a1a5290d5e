//! Ingestion from the device message bus
//!
//! Scanner devices publish JSON frames to an MQTT topic. [`IngestAdapter`]
//! is a pure message handler: it validates a raw payload and feeds it into
//! the [`Relay`](crate::relay::Relay). [`MqttIngest`] owns the bus client,
//! reconnects with exponential backoff, and re-subscribes after every
//! connect. Redelivered messages after a reconnect are harmless: an identical
//! frame is treated as a duplicate and only refreshes the timestamp.

pub mod adapter;
pub mod backoff;
pub mod config;
pub mod error;
pub mod message;
pub mod mqtt;

pub use adapter::IngestAdapter;
pub use backoff::Backoff;
pub use config::MqttConfig;
pub use error::IngestError;
pub use message::IngestPayload;
pub use mqtt::MqttIngest;
