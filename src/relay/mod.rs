//! The relay: image store, subscriber registry and broadcast engine
//!
//! A [`Relay`] is constructed explicitly and shared as `Arc<Relay>` between
//! the ingestion adapter and every connection session. There is no global
//! state; two relays in one process are fully independent.
//!
//! ```text
//!   ingest(device, payload)
//!        │
//!        ▼  ordering_lock(device)
//!   ImageStore::put ──► BroadcastEngine::deliver ──► SubscriberRegistry snapshots
//!                                                           │
//!                                                     try_send(Bytes)
//!                                                           ▼
//!                                                    Subscription rx
//! ```
//!
//! The image store and the registry are independent locks and are never
//! held at the same time.

pub mod config;
pub mod service;

pub use config::RelayConfig;
pub use service::{now_millis, IngestReport, Relay, Subscription, SubscriptionHandle};
