//! Bridge configuration: YAML file with per-field defaults.
//!
//! Every field has a default, so an absent or partial file is fine. Command
//! line flags are applied on top (see `runner::Args`).

use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub mqtt: MqttConfig,

    /// Log verbosity: debug, info, warning, error, critical
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Where the base configuration came from, before command line flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    File,
    Defaults,
}

/// Station-facing HTTP listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_bind")]
    pub bind: String,

    #[serde(default = "default_http_port")]
    pub port: u16,
}

/// Broker connection and topic layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MqttConfig {
    #[serde(default = "default_mqtt_host")]
    pub host: String,

    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Root of every published topic (Home Assistant's discovery prefix)
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,

    /// Defaults to `ws2902-mqtt-<hostname>`
    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    /// How long startup waits for the broker's CONNACK
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_log_level() -> String {
    "warning".to_string()
}

fn default_http_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8543
}

fn default_mqtt_host() -> String {
    "localhost".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_topic_prefix() -> String {
    "homeassistant".to_string()
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            mqtt: MqttConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: default_http_bind(),
            port: default_http_port(),
        }
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            username: None,
            password: None,
            topic_prefix: default_topic_prefix(),
            client_id: None,
            keep_alive_secs: default_keep_alive_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl MqttConfig {
    /// Configured client id, or one derived from the hostname.
    pub fn effective_client_id(&self) -> String {
        self.client_id.clone().unwrap_or_else(|| {
            let host = hostname::get()
                .map(|h| h.to_string_lossy().to_string())
                .unwrap_or_else(|_| "unknown".to_string());
            format!("ws2902-mqtt-{}", host)
        })
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&contents)
    }

    /// Load from `path` if it exists, otherwise use defaults.
    ///
    /// Runs before logging is set up, so the caller reports the source.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<(Self, ConfigSource), ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok((Self::default(), ConfigSource::Defaults));
        }
        Ok((Self::from_file(path)?, ConfigSource::File))
    }

    /// Parse configuration from a YAML string
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let prefix = &self.mqtt.topic_prefix;
        if prefix.is_empty() {
            return Err(ConfigError::Invalid("topic prefix must not be empty".into()));
        }
        if prefix.contains(['+', '#']) {
            return Err(ConfigError::Invalid(format!(
                "topic prefix '{}' must not contain MQTT wildcards",
                prefix
            )));
        }
        if prefix.ends_with('/') {
            return Err(ConfigError::Invalid(format!(
                "topic prefix '{}' must not end with '/'",
                prefix
            )));
        }
        if self.mqtt.host.is_empty() {
            return Err(ConfigError::Invalid("MQTT host must not be empty".into()));
        }
        if self.mqtt.port == 0 {
            return Err(ConfigError::Invalid("MQTT port must be non-zero".into()));
        }
        if let Some(id) = &self.mqtt.client_id {
            if id.is_empty() || id.starts_with(' ') {
                return Err(ConfigError::Invalid(format!("invalid MQTT client id '{}'", id)));
            }
        }
        if self.mqtt.password.is_some() && self.mqtt.username.is_none() {
            return Err(ConfigError::Invalid(
                "MQTT password given without a username".into(),
            ));
        }
        parse_log_level(&self.log_level)?;
        Ok(())
    }

    pub fn log_filter(&self) -> Result<LevelFilter, ConfigError> {
        parse_log_level(&self.log_level)
    }
}

/// Map a log level name onto a `log` filter.
///
/// Accepts `warning` and `critical` alongside the `log` crate's own names.
pub fn parse_log_level(level: &str) -> Result<LevelFilter, ConfigError> {
    match level.to_ascii_lowercase().as_str() {
        "trace" | "notset" => Ok(LevelFilter::Trace),
        "debug" => Ok(LevelFilter::Debug),
        "info" => Ok(LevelFilter::Info),
        "warn" | "warning" => Ok(LevelFilter::Warn),
        "error" | "critical" => Ok(LevelFilter::Error),
        "off" => Ok(LevelFilter::Off),
        other => Err(ConfigError::Invalid(format!("unknown log level '{}'", other))),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
