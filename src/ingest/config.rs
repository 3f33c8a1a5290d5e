//! MQTT ingestion configuration

use std::time::Duration;

/// Largest frame accepted from the broker (JPEG frames as base64)
pub const DEFAULT_MAX_PACKET_SIZE: usize = 4 * 1024 * 1024;

/// MQTT ingestion options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttConfig {
    /// Broker host
    pub host: String,

    /// Broker port
    pub port: u16,

    /// Topic devices publish frames to
    pub topic: String,

    /// Client id prefix; the connect time in Unix seconds is appended
    pub client_id_prefix: String,

    /// Optional broker credentials
    pub username: Option<String>,
    pub password: Option<String>,

    /// Shared secret expected in `X-API-KEY` (`None` disables the check)
    pub api_key: Option<String>,

    /// MQTT keep-alive
    pub keep_alive: Duration,

    /// Keep broker-side session (and subscriptions) across reconnects
    pub clean_session: bool,

    /// Maximum incoming packet size
    pub max_packet_size: usize,

    /// First reconnect delay
    pub reconnect_min: Duration,

    /// Reconnect delay cap
    pub reconnect_max: Duration,

    /// Client request channel capacity
    pub request_capacity: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            topic: "scanner/images".to_string(),
            client_id_prefix: "scanner-relay".to_string(),
            username: None,
            password: None,
            api_key: None,
            keep_alive: Duration::from_secs(60),
            clean_session: false,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            reconnect_min: Duration::from_secs(5),
            reconnect_max: Duration::from_secs(60),
            request_capacity: 10,
        }
    }
}

impl MqttConfig {
    /// Set broker host and port
    pub fn broker(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    /// Set the subscribe topic
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Require a shared secret on every message
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set broker credentials
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set reconnect backoff bounds
    pub fn reconnect(mut self, min: Duration, max: Duration) -> Self {
        self.reconnect_min = min;
        self.reconnect_max = max;
        self
    }

    /// Client id for a connection started at `unix_secs`
    pub fn client_id(&self, unix_secs: i64) -> String {
        format!("{}-{}", self.client_id_prefix, unix_secs)
    }
}
