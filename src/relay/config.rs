//! Relay configuration

use crate::image::FingerprintPolicy;

/// Default per-subscriber outbound channel capacity
pub const DEFAULT_CHANNEL_CAPACITY: usize = 20;

/// Relay configuration options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Outbound channel capacity per subscriber; a full channel drops new
    /// messages
    pub channel_capacity: usize,

    /// Duplicate-frame fingerprint policy
    pub fingerprint: FingerprintPolicy,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            fingerprint: FingerprintPolicy::default(),
        }
    }
}

impl RelayConfig {
    /// Set the outbound channel capacity (minimum 1)
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Set the fingerprint policy
    pub fn fingerprint(mut self, policy: FingerprintPolicy) -> Self {
        self.fingerprint = policy;
        self
    }
}
