/*!
 * Configuration management for the SDN bridge.
 *
 * Settings are layered: built-in defaults, then an optional configuration
 * file, then environment variables (`SDN__SCHEDULER__DEFAULT_RETRIES=3`).
 */
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use config::{Config as ConfigLib, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Top-level bridge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Serial link configuration
    #[serde(default)]
    pub transport: TransportConfig,

    /// Outbound command scheduling
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Pub-sub forwarding
    #[serde(default)]
    pub mqtt: MqttConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Serial link configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Connection string: `tcp://host:port`, `telnet://host[:port]`,
    /// `rfc2217://host[:port]`, `/dev/ptmx` or a serial device path
    #[serde(default = "default_port")]
    pub port: String,

    /// Log raw frame bytes at trace level
    #[serde(default)]
    pub trace: bool,
}

/// Command scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How long to wait for a response before retrying
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,

    /// Grace window for replies to broadcast and group discovery requests
    #[serde(default = "default_broadcast_timeout_ms")]
    pub broadcast_timeout_ms: u64,

    /// Minimum spacing between two frames on the wire
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// Attempts for commands that do not specify their own count
    #[serde(default = "default_retries")]
    pub default_retries: u32,

    /// Look for new motors on the bus while idle
    #[serde(default = "default_auto_discover")]
    pub auto_discover: bool,

    /// Addresses polled at startup, e.g. `"01.02.03"`
    #[serde(default)]
    pub known_motors: Vec<String>,
}

/// MQTT forwarding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Forward attribute changes to the broker
    #[serde(default = "default_mqtt_enabled")]
    pub enabled: bool,

    /// Broker URI, `mqtt://host[:port]`
    #[serde(default = "default_mqtt_uri")]
    pub uri: String,

    /// Device id under the base topic
    #[serde(default = "default_device_id")]
    pub device_id: String,

    /// Root topic
    #[serde(default = "default_base_topic")]
    pub base_topic: String,
}

impl SchedulerConfig {
    /// Response window as a duration
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    /// Broadcast grace window as a duration
    pub fn broadcast_timeout(&self) -> Duration {
        Duration::from_millis(self.broadcast_timeout_ms)
    }

    /// Minimum inter-frame spacing as a duration
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            trace: false,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            response_timeout_ms: default_response_timeout_ms(),
            broadcast_timeout_ms: default_broadcast_timeout_ms(),
            min_interval_ms: default_min_interval_ms(),
            default_retries: default_retries(),
            auto_discover: default_auto_discover(),
            known_motors: Vec::new(),
        }
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            enabled: default_mqtt_enabled(),
            uri: default_mqtt_uri(),
            device_id: default_device_id(),
            base_topic: default_base_topic(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_port() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_response_timeout_ms() -> u64 {
    250
}

fn default_broadcast_timeout_ms() -> u64 {
    5_000
}

fn default_min_interval_ms() -> u64 {
    100
}

fn default_retries() -> u32 {
    5
}

fn default_auto_discover() -> bool {
    true
}

fn default_mqtt_enabled() -> bool {
    true
}

fn default_mqtt_uri() -> String {
    "mqtt://localhost:1883".to_string()
}

fn default_device_id() -> String {
    "somfy".to_string()
}

fn default_base_topic() -> String {
    "homie".to_string()
}

/// A builder for creating a configuration
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_file: Option<String>,
    environment_prefix: Option<String>,
    override_with: Option<Config>,
}

impl ConfigBuilder {
    /// Create a new ConfigBuilder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the config file path
    pub fn with_config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Set the environment variable prefix for configuration
    pub fn with_environment_prefix<S: AsRef<str>>(mut self, prefix: S) -> Self {
        self.environment_prefix = Some(prefix.as_ref().to_string());
        self
    }

    /// Override with an existing config
    pub fn override_with(mut self, config: Config) -> Self {
        self.override_with = Some(config);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<Config> {
        if let Some(config) = self.override_with {
            return Ok(config);
        }

        let defaults = ConfigLib::try_from(&Config::default())
            .map_err(|e| Error::config(format!("Failed to create default config: {}", e)))?;
        let mut builder = ConfigLib::builder().add_source(defaults);

        if let Some(config_file) = self.config_file {
            if Path::new(&config_file).exists() {
                debug!("Loading configuration from {}", config_file);
                builder = builder.add_source(File::with_name(&config_file));
            } else {
                debug!("Configuration file {} does not exist, using defaults", config_file);
            }
        }

        if let Some(prefix) = self.environment_prefix {
            debug!("Loading configuration from environment variables with prefix {}", prefix);
            builder = builder.add_source(
                Environment::with_prefix(&prefix)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("scheduler.known_motors")
                    .try_parsing(true),
            );
        }

        let config: Config = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build configuration: {}", e)))?
            .try_deserialize()
            .map_err(|e| Error::config(format!("Failed to deserialize configuration: {}", e)))?;

        info!(port = %config.transport.port, "Configuration loaded");
        Ok(config)
    }
}

/// A thread-safe reference to a configuration
#[derive(Debug, Clone)]
pub struct SharedConfig(Arc<Config>);

impl SharedConfig {
    /// Create a new SharedConfig
    pub fn new(config: Config) -> Self {
        Self(Arc::new(config))
    }

    /// Get a reference to the config
    pub fn get(&self) -> &Config {
        &self.0
    }
}

impl From<Config> for SharedConfig {
    fn from(config: Config) -> Self {
        Self::new(config)
    }
}

impl AsRef<Config> for SharedConfig {
    fn as_ref(&self) -> &Config {
        self.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.scheduler.response_timeout(), Duration::from_millis(250));
        assert_eq!(config.scheduler.broadcast_timeout(), Duration::from_secs(5));
        assert_eq!(config.scheduler.min_interval(), Duration::from_millis(100));
        assert_eq!(config.scheduler.default_retries, 5);
        assert!(config.scheduler.auto_discover);
        assert_eq!(config.mqtt.base_topic, "homie");
    }

    #[test]
    fn test_config_builder_defaults() -> Result<()> {
        let config = ConfigBuilder::new().build()?;
        assert_eq!(config.transport.port, "/dev/ttyUSB0");
        assert!(config.scheduler.known_motors.is_empty());
        Ok(())
    }

    #[test]
    fn test_config_builder_with_file() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("bridge.toml");

        {
            let mut file = File::create(&file_path)?;
            file.write_all(
                br#"
                [transport]
                port = "tcp://192.168.1.20:4000"

                [scheduler]
                auto_discover = false
                known_motors = ["01.02.03", "0A0B0C"]

                [logging]
                level = "debug"
            "#,
            )?;
        }

        let config = ConfigBuilder::new().with_config_file(file_path).build()?;

        assert_eq!(config.transport.port, "tcp://192.168.1.20:4000");
        assert!(!config.scheduler.auto_discover);
        assert_eq!(config.scheduler.known_motors, vec!["01.02.03", "0A0B0C"]);
        assert_eq!(config.scheduler.default_retries, 5);
        assert_eq!(config.logging.level, "debug");

        Ok(())
    }

    #[test]
    fn test_config_builder_with_env() -> Result<()> {
        env::set_var("SDNTEST__SCHEDULER__DEFAULT_RETRIES", "3");
        env::set_var("SDNTEST__MQTT__DEVICE_ID", "shades");

        let config = ConfigBuilder::new()
            .with_environment_prefix("SDNTEST")
            .build()?;

        assert_eq!(config.scheduler.default_retries, 3);
        assert_eq!(config.mqtt.device_id, "shades");

        env::remove_var("SDNTEST__SCHEDULER__DEFAULT_RETRIES");
        env::remove_var("SDNTEST__MQTT__DEVICE_ID");

        Ok(())
    }

    #[test]
    fn test_override_skips_sources() -> Result<()> {
        let mut custom = Config::default();
        custom.transport.port = "/dev/ptmx".to_string();

        let config = ConfigBuilder::new()
            .with_config_file("/nonexistent/bridge.toml")
            .override_with(custom)
            .build()?;
        assert_eq!(config.transport.port, "/dev/ptmx");
        Ok(())
    }

    #[test]
    fn test_shared_config() {
        let shared = SharedConfig::new(Config::default());
        let shared2 = shared.clone();
        assert_eq!(shared2.get().mqtt.uri, "mqtt://localhost:1883");
    }
}
