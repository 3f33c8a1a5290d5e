//! Server configuration

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::session::SessionConfig;

/// Default HTTP/WebSocket port
pub const DEFAULT_PORT: u16 = 8080;

/// Shortest accepted status log interval
pub const MIN_STATUS_INTERVAL: Duration = Duration::from_millis(1);

/// Server configuration options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent WebSocket sessions (0 = unlimited)
    pub max_connections: usize,

    /// Interval between status log lines
    pub status_interval: Duration,

    /// Per-session timers
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            max_connections: 0, // Unlimited
            status_interval: Duration::from_secs(10),
            session: SessionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set maximum concurrent sessions
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the status log interval (minimum 1 ms)
    pub fn status_interval(mut self, interval: Duration) -> Self {
        self.status_interval = interval.max(MIN_STATUS_INTERVAL);
        self
    }

    /// Set per-session timers
    pub fn session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }
}
