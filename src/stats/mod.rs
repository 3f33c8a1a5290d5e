//! Relay counters and status reporting

pub mod metrics;

pub use metrics::{RelayStats, RelayStatus, StatsSnapshot};
