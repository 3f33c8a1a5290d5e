//! Subscriber registry for live image fan-out
//!
//! Tracks which WebSocket subscribers watch which device. Subscribers watching
//! a single device live in a per-device list; subscribers watching every
//! device live in a separate list. A subscriber is in exactly one of them.
//!
//! # Architecture
//!
//! ```text
//!                      Arc<SubscriberRegistry>
//!                 ┌──────────────────────────────┐
//!                 │ specific: HashMap<DeviceId,  │
//!                 │   Vec<Subscriber>>           │
//!                 │ all: Vec<Subscriber>         │
//!                 └──────────────┬───────────────┘
//!                                │ snapshot_*()
//!                                ▼
//!                        [BroadcastEngine]
//!                   try_send(Bytes) per subscriber
//!                                │
//!             ┌──────────────────┼──────────────────┐
//!             ▼                  ▼                  ▼
//!        [Session]          [Session]          [Session]
//!        rx.recv()          rx.recv()          rx.recv()
//! ```
//!
//! Each subscriber owns a bounded `mpsc` channel. Messages are `bytes::Bytes`,
//! so one serialized frame is shared by every subscriber it is sent to.

pub mod error;
pub mod store;
pub mod subscriber;

pub use error::RegistryError;
pub use store::{RegistryCounts, SubscriberRegistry};
pub use subscriber::{DeliveryFailure, Scope, Subscriber, SubscriberId};
