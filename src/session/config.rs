//! Session timing configuration

use std::time::Duration;

/// Shortest accepted keep-alive or refresh interval
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Per-connection timers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Interval between `keep_alive` messages
    pub keep_alive_interval: Duration,

    /// Interval between snapshot refreshes (re-sent with the current time)
    pub refresh_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            keep_alive_interval: Duration::from_secs(30),
            refresh_interval: Duration::from_secs(15),
        }
    }
}

impl SessionConfig {
    /// Set the keep-alive interval (minimum 1 ms)
    pub fn keep_alive_interval(mut self, interval: Duration) -> Self {
        self.keep_alive_interval = interval.max(MIN_TICK_INTERVAL);
        self
    }

    /// Set the refresh interval (minimum 1 ms)
    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval.max(MIN_TICK_INTERVAL);
        self
    }
}
