//! Live device-image relay
//!
//! Scanner devices publish camera frames to an MQTT topic. The relay keeps
//! the latest frame per device and pushes every new frame to WebSocket
//! subscribers watching that device or all devices.
//!
//! ```text
//!   MQTT broker ──► MqttIngest ──► IngestAdapter ──► Relay::ingest
//!                                                      │
//!                                     ImageStore::put ◄┤ (per-device ordering lock)
//!                                                      ▼
//!                                          BroadcastEngine::deliver
//!                                                      │ try_send, drop when full
//!                          ┌───────────────────────────┼───────────────────────┐
//!                          ▼                           ▼                       ▼
//!                   Session (AA:BB)             Session (AA:BB)        Session (all devices)
//!                          │                           │                       │
//!                      WebSocket                   WebSocket               WebSocket
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use scanner_relay::{Relay, RelayConfig, RelayServer, ServerConfig};
//!
//! # async fn run() -> scanner_relay::Result<()> {
//! let relay = Arc::new(Relay::new(RelayConfig::default()));
//! let server = Arc::new(RelayServer::new(ServerConfig::default(), relay));
//!
//! server
//!     .run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! # }
//! ```

pub mod broadcast;
pub mod config;
pub mod error;
pub mod image;
pub mod ingest;
pub mod registry;
pub mod relay;
pub mod server;
pub mod session;
pub mod stats;

pub use error::{Error, Result};
pub use image::{FingerprintPolicy, ImageRecord, ImageStore};
pub use ingest::{IngestAdapter, MqttConfig, MqttIngest};
pub use registry::{Scope, SubscriberId, SubscriberRegistry};
pub use relay::{IngestReport, Relay, RelayConfig, Subscription, SubscriptionHandle};
pub use server::{RelayServer, ServerConfig};
pub use session::{Session, SessionConfig};
pub use stats::RelayStatus;
