//! Application configuration.
//!
//! The configuration is a single JSON document with camelCase keys:
//!
//! ```json
//! {
//!   "station": { "name": "Backyard", "latitude": 47.6, "longitude": -122.3, "altitude": 52 },
//!   "collector": { "device": { "type": "ecowitt", "model": "GW1000", "port": 8090 } },
//!   "server": { "address": "0.0.0.0", "port": 8080 },
//!   "storage": { "type": "file", "path": "data/readings.jsonl" },
//!   "publishers": [
//!     { "name": "wu", "type": "wunderground", "enabled": true, "interval": 60,
//!       "stationId": "KWAEXAMPLE1", "apiKey": "secret" }
//!   ],
//!   "logging": { "level": "info", "json": false }
//! }
//! ```
//!
//! `server.address` is the host both listeners bind to. It must be an IP
//! literal such as `0.0.0.0`, `127.0.0.1` or `::`; host names like
//! `localhost` are not resolved.
//!
//! Publisher entries are kept as raw JSON and decoded one by one in
//! [`AppConfig::publisher_configs`], so a broken entry only disables that
//! publisher instead of failing the whole file.

use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Station;

/// Freshness threshold applied when a publisher does not set `maxAgeSecs`.
pub const DEFAULT_MAX_AGE_SECS: u64 = 600;

/// Longest accepted publish interval (one day).
pub const MAX_INTERVAL_SECS: u64 = 86_400;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("error reading config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration document is not valid JSON for the expected shape.
    #[error("error parsing config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is present but not acceptable.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// A single publisher entry is invalid.
    #[error("invalid publisher {name}: {reason}")]
    Publisher { name: String, reason: String },
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub station: Station,

    #[serde(default)]
    pub collector: CollectorConfig,

    #[serde(default)]
    pub server: HttpServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Raw publisher entries; see [`AppConfig::publisher_configs`].
    #[serde(default)]
    pub publishers: Vec<serde_json::Value>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load and validate configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Parse and validate configuration from a JSON string.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check process-wide settings. Publisher entries are validated
    /// separately.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.socket_addr()?;
        self.collector.device.socket_addr(&self.server.address)?;

        if let StorageConfig::File { path } = &self.storage {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(
                    "storage type 'file' requires a path".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Decode and validate each publisher entry independently.
    pub fn publisher_configs(&self) -> Vec<Result<PublisherConfig, ConfigError>> {
        self.publishers
            .iter()
            .enumerate()
            .map(|(i, raw)| {
                let name = raw
                    .get("name")
                    .and_then(|n| n.as_str())
                    .map(String::from)
                    .unwrap_or_else(|| format!("publishers[{i}]"));

                let config: PublisherConfig =
                    serde_json::from_value(raw.clone()).map_err(|e| ConfigError::Publisher {
                        name: name.clone(),
                        reason: e.to_string(),
                    })?;
                config.validate()?;
                Ok(config)
            })
            .collect()
    }
}

/// Data collector settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectorConfig {
    #[serde(default)]
    pub device: DeviceConfig,
}

/// The station device pushing telemetry to us.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    /// Device protocol, e.g. "ecowitt".
    #[serde(rename = "type", default = "default_device_type")]
    pub device_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Port the ingestion endpoint listens on.
    #[serde(default = "default_ingest_port")]
    pub port: u16,
}

impl DeviceConfig {
    /// Listen address for the ingestion endpoint, on the given host.
    pub fn socket_addr(&self, host: &str) -> Result<SocketAddr, ConfigError> {
        parse_socket_addr(host, self.port)
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_type: default_device_type(),
            model: None,
            port: default_ingest_port(),
        }
    }
}

/// HTTP query API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpServerConfig {
    #[serde(default = "default_address")]
    pub address: String,

    #[serde(default = "default_server_port")]
    pub port: u16,
}

impl HttpServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        parse_socket_addr(&self.address, self.port)
    }
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_server_port(),
        }
    }
}

/// Where readings are persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Keep readings in memory only.
    #[default]
    Memory,
    /// Append readings to a JSON-lines file.
    File { path: PathBuf },
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON log lines instead of human-readable text.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// One publish destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublisherConfig {
    pub name: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between publishes.
    #[serde(default)]
    pub interval: u64,

    /// Maximum reading age in seconds; older readings are not published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age_secs: Option<u64>,

    #[serde(flatten)]
    pub destination: DestinationConfig,
}

impl PublisherConfig {
    /// Freshness threshold in seconds.
    pub fn max_age_secs(&self) -> u64 {
        self.max_age_secs.unwrap_or(DEFAULT_MAX_AGE_SECS)
    }

    /// Check required fields for the destination kind.
    ///
    /// Disabled entries only need to be well formed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::Publisher {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if !self.enabled {
            return Ok(());
        }

        if self.interval == 0 {
            return Err(invalid("interval must be greater than 0"));
        }
        if self.interval > MAX_INTERVAL_SECS {
            return Err(invalid(&format!(
                "interval must be at most {MAX_INTERVAL_SECS} seconds"
            )));
        }

        match &self.destination {
            DestinationConfig::Custom { url, .. } => {
                if url.trim().is_empty() {
                    return Err(invalid("custom publisher requires url"));
                }
            }
            DestinationConfig::Wunderground {
                station_id,
                api_key,
                ..
            } => {
                if station_id.trim().is_empty() {
                    return Err(invalid("wunderground publisher requires stationId"));
                }
                if api_key.trim().is_empty() {
                    return Err(invalid("wunderground publisher requires apiKey"));
                }
            }
        }

        Ok(())
    }
}

/// Destination-specific publisher settings, selected by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DestinationConfig {
    /// Any HTTP endpoint accepting a JSON body.
    #[serde(rename_all = "camelCase")]
    Custom {
        #[serde(default)]
        url: String,
        /// HTTP method, POST when omitted.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        method: Option<String>,
        /// Headers applied verbatim to every request.
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },

    /// Weather Underground personal weather station upload.
    #[serde(rename_all = "camelCase")]
    Wunderground {
        #[serde(default)]
        station_id: String,
        #[serde(default)]
        api_key: String,
        /// Override of the upload endpoint.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
    },
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, ConfigError> {
    let ip: IpAddr = host.parse().map_err(|e| {
        ConfigError::Invalid(format!(
            "bad listen address {host} (expected an IP address): {e}"
        ))
    })?;
    Ok(SocketAddr::new(ip, port))
}

fn default_true() -> bool {
    true
}

fn default_device_type() -> String {
    "ecowitt".to_string()
}

fn default_ingest_port() -> u16 {
    8090
}

fn default_address() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}
