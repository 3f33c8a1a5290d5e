//! File and environment configuration
//!
//! Loaded with figment in three layers, later ones winning:
//!
//! ```text
//!   built-in defaults  <  scanner-relay.toml  <  RELAY_* environment
//! ```
//!
//! Env vars use a double underscore for nesting:
//!   `RELAY_MQTT__HOST=broker`  ->  `mqtt.host = "broker"`
//!   `RELAY_SERVER__PORT=9000`  ->  `server.port = 9000`

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::image::{FingerprintPolicy, DEFAULT_MEDIA_PREFIX, LEGACY_PREFIX_LEN};
use crate::ingest::MqttConfig;
use crate::relay::RelayConfig;
use crate::server::ServerConfig;
use crate::session::SessionConfig;

/// Default config file, relative to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "scanner-relay.toml";

/// Env var overriding the config file path
pub const CONFIG_PATH_ENV: &str = "SCANNER_RELAY_CONFIG";

/// Top-level tunable configuration, deserialized by figment
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub relay: RelayFileConfig,
    #[serde(default)]
    pub mqtt: MqttFileConfig,
}

/// `[server]` section
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerFileConfig {
    pub host: IpAddr,
    pub port: u16,
    pub max_connections: usize,
    pub status_interval_secs: u64,
    pub keep_alive_secs: u64,
    pub refresh_secs: u64,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        let server = ServerConfig::default();
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: server.bind_addr.port(),
            max_connections: server.max_connections,
            status_interval_secs: server.status_interval.as_secs(),
            keep_alive_secs: server.session.keep_alive_interval.as_secs(),
            refresh_secs: server.session.refresh_interval.as_secs(),
        }
    }
}

/// Fingerprint policy name in config files
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintKind {
    #[default]
    Sha256,
    Prefix,
}

/// `[relay]` section
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayFileConfig {
    pub channel_capacity: usize,
    pub fingerprint: FingerprintKind,
    /// Only used with `fingerprint = "prefix"`
    pub fingerprint_prefix_len: usize,
}

impl Default for RelayFileConfig {
    fn default() -> Self {
        Self {
            channel_capacity: RelayConfig::default().channel_capacity,
            fingerprint: FingerprintKind::default(),
            fingerprint_prefix_len: LEGACY_PREFIX_LEN,
        }
    }
}

/// `[mqtt]` section
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttFileConfig {
    pub host: String,
    pub port: u16,
    pub topic: String,
    pub client_id_prefix: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub api_key: Option<String>,
    pub keep_alive_secs: u64,
    pub clean_session: bool,
    pub max_packet_size: usize,
    pub reconnect_min_secs: u64,
    pub reconnect_max_secs: u64,
}

impl Default for MqttFileConfig {
    fn default() -> Self {
        let mqtt = MqttConfig::default();
        Self {
            host: mqtt.host,
            port: mqtt.port,
            topic: mqtt.topic,
            client_id_prefix: mqtt.client_id_prefix,
            username: mqtt.username,
            password: mqtt.password,
            api_key: mqtt.api_key,
            keep_alive_secs: mqtt.keep_alive.as_secs(),
            clean_session: mqtt.clean_session,
            max_packet_size: mqtt.max_packet_size,
            reconnect_min_secs: mqtt.reconnect_min.as_secs(),
            reconnect_max_secs: mqtt.reconnect_max.as_secs(),
        }
    }
}

/// Runtime configuration derived from a [`FileConfig`]
#[derive(Clone, Debug)]
pub struct Settings {
    pub server: ServerConfig,
    pub relay: RelayConfig,
    pub mqtt: MqttConfig,
}

impl FileConfig {
    /// Convert into runtime configuration structs
    ///
    /// A prefix fingerprint no longer than the media prefix would treat
    /// every normalized frame as a duplicate, so it is refused.
    pub fn into_settings(self) -> Result<Settings> {
        let s = self.server;
        let session = SessionConfig::default()
            .keep_alive_interval(Duration::from_secs(s.keep_alive_secs.max(1)))
            .refresh_interval(Duration::from_secs(s.refresh_secs.max(1)));
        let server = ServerConfig::with_addr(SocketAddr::new(s.host, s.port))
            .max_connections(s.max_connections)
            .status_interval(Duration::from_secs(s.status_interval_secs.max(1)))
            .session(session);

        let fingerprint = match self.relay.fingerprint {
            FingerprintKind::Sha256 => FingerprintPolicy::Sha256,
            FingerprintKind::Prefix => {
                let len = self.relay.fingerprint_prefix_len;
                if len <= DEFAULT_MEDIA_PREFIX.len() {
                    return Err(Error::InvalidConfig(format!(
                        "relay.fingerprint_prefix_len must exceed {} bytes, got {len}",
                        DEFAULT_MEDIA_PREFIX.len()
                    )));
                }
                FingerprintPolicy::Prefix(len)
            }
        };
        let relay = RelayConfig::default()
            .channel_capacity(self.relay.channel_capacity)
            .fingerprint(fingerprint);

        let m = self.mqtt;
        let mqtt = MqttConfig {
            host: m.host,
            port: m.port,
            topic: m.topic,
            client_id_prefix: m.client_id_prefix,
            username: m.username,
            password: m.password,
            api_key: m.api_key,
            keep_alive: Duration::from_secs(m.keep_alive_secs),
            clean_session: m.clean_session,
            max_packet_size: m.max_packet_size,
            reconnect_min: Duration::from_secs(m.reconnect_min_secs),
            reconnect_max: Duration::from_secs(m.reconnect_max_secs),
            ..MqttConfig::default()
        };

        Ok(Settings { server, relay, mqtt })
    }
}

/// Config file path: `$SCANNER_RELAY_CONFIG` or `scanner-relay.toml`
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Build the layered figment; a missing file is skipped
pub fn figment(path: &Path) -> Figment {
    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("RELAY_").split("__"))
}

/// Load and convert configuration from `path` and the environment
pub fn load(path: &Path) -> Result<Settings> {
    let file: FileConfig = figment(path).extract()?;
    file.into_settings()
}
