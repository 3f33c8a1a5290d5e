//! Fan-out of image updates to subscribers
//!
//! The [`BroadcastEngine`] serializes each update once and performs a
//! non-blocking send to every interested subscriber. A subscriber whose
//! channel is full or closed is skipped; the broadcaster never waits.
//!
//! Specific-device subscribers receive a single object; all-devices
//! subscribers always receive an array, even for a single update.

pub mod engine;
pub mod wire;

pub use engine::{BroadcastEngine, DeliveryReport};
pub use wire::{ConnectionStatus, KeepAlive};
