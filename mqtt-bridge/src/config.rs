//! Bridge configuration file.
//!
//! `config.toml` lives in the configuration directory next to the device
//! directory (`devices.toml`) and the state directory (`data/`). Every key
//! is optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bridge_engine::RetryPolicy;
use serde::Deserialize;
use topic_router::NamingConvention;
use url::Url;

pub const CONFIG_FILE: &str = "config.toml";
pub const DEVICES_FILE: &str = "devices.toml";
pub const DATA_DIR: &str = "data";

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MQTT_PORT: u16 = 1883;
pub const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 15 * 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid broker address {host:?}: {reason}")]
    BrokerAddress { host: String, reason: String },
}

/// Files inside the configuration directory
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    dir: PathBuf,
}

impl ConfigPaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn config_file(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    pub fn devices_file(&self) -> PathBuf {
        self.dir.join(DEVICES_FILE)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dir.join(DATA_DIR)
    }
}

/// Top-level `config.toml`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// HTTP port the hub talks to
    pub port: u16,
    /// Log filter directives, e.g. `info` or `bridge_engine=debug`
    pub loglevel: Option<String>,
    /// Read `devices.toml` on every subscribe cycle
    pub deviceconfig: bool,
    pub state_flush_interval_secs: u64,
    pub mqtt: MqttSettings,
    pub notifier: NotifierSettings,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            loglevel: None,
            deviceconfig: false,
            state_flush_interval_secs: DEFAULT_FLUSH_INTERVAL_SECS,
            mqtt: MqttSettings::default(),
            notifier: NotifierSettings::default(),
        }
    }
}

/// Where the configuration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    File,
    Defaults,
}

impl BridgeConfig {
    /// Load `path`, using defaults when the file does not exist
    pub fn load(path: &Path) -> Result<(Self, ConfigSource), ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let config = Self::from_toml(&content).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?;
                Ok((config, ConfigSource::File))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok((Self::default(), ConfigSource::Defaults))
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.state_flush_interval_secs.max(1))
    }
}

/// `[mqtt]` section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MqttSettings {
    /// Broker address, `mqtt://host:port` or bare `host[:port]`
    pub host: String,
    /// Topic preface and direction suffixes
    #[serde(flatten)]
    pub convention: NamingConvention,
    /// Retain flag for publications without a per-device override
    pub retain: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: Option<String>,
    pub keep_alive_secs: u64,
    /// How long a subscribe waits for the broker's acknowledgement
    pub ack_timeout_secs: u64,
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            host: format!("mqtt://localhost:{DEFAULT_MQTT_PORT}"),
            convention: NamingConvention::default(),
            retain: false,
            username: None,
            password: None,
            client_id: None,
            keep_alive_secs: 30,
            ack_timeout_secs: 10,
        }
    }
}

/// Resolved broker host and port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub host: String,
    pub port: u16,
}

impl MqttSettings {
    /// Parse `host`, defaulting the scheme to `mqtt://` and the port to 1883
    pub fn endpoint(&self) -> Result<BrokerEndpoint, ConfigError> {
        let invalid = |reason: String| ConfigError::BrokerAddress {
            host: self.host.clone(),
            reason,
        };

        let address = if self.host.contains("://") {
            self.host.clone()
        } else {
            format!("mqtt://{}", self.host)
        };
        let url = Url::parse(&address).map_err(|e| invalid(e.to_string()))?;

        match url.scheme() {
            "mqtt" | "tcp" => {}
            other => return Err(invalid(format!("unsupported scheme {other:?}"))),
        }
        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| invalid("missing host".to_string()))?;

        Ok(BrokerEndpoint {
            host: host.to_string(),
            port: url.port().unwrap_or(DEFAULT_MQTT_PORT),
        })
    }

    /// Configured client id, or a fresh random one
    pub fn client_id(&self) -> String {
        self.client_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("hub-mqtt-bridge-{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs.max(5))
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_secs(self.ack_timeout_secs.max(1))
    }
}

/// `[notifier]` section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NotifierSettings {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for NotifierSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 500,
            max_backoff_ms: 10_000,
            request_timeout_ms: 5_000,
        }
    }
}

impl NotifierSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use topic_router::DEFAULT_PREFACE;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::from_toml("").unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.port, 8080);
        assert_eq!(config.flush_interval(), Duration::from_secs(900));
        assert_eq!(config.mqtt.convention.preface, DEFAULT_PREFACE);
        assert!(!config.mqtt.retain);
        assert_eq!(config.notifier.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_full_file() {
        let config = BridgeConfig::from_toml(
            r#"
            port = 8081
            loglevel = "debug"
            deviceconfig = true
            state_flush_interval_secs = 60

            [mqtt]
            host = "mqtt://broker.lan:1884"
            preface = "/home"
            state_read_suffix = "state"
            command_suffix = "cmd"
            state_write_suffix = "set"
            retain = true
            username = "bridge"
            password = "secret"

            [notifier]
            max_attempts = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 8081);
        assert_eq!(config.loglevel.as_deref(), Some("debug"));
        assert!(config.deviceconfig);
        assert_eq!(
            config.mqtt.convention,
            NamingConvention::new("/home").with_suffixes("state", "cmd", "set")
        );
        assert!(config.mqtt.retain);
        assert_eq!(config.mqtt.username.as_deref(), Some("bridge"));
        assert_eq!(config.notifier.max_attempts, 3);
        assert_eq!(config.notifier.initial_backoff_ms, 500);
    }

    #[rstest]
    #[case("mqtt://localhost:1883", "localhost", 1883)]
    #[case("mqtt://broker.lan", "broker.lan", 1883)]
    #[case("broker.lan", "broker.lan", 1883)]
    #[case("192.168.1.5:1884", "192.168.1.5", 1884)]
    #[case("tcp://broker.lan:2883", "broker.lan", 2883)]
    fn test_endpoint(#[case] host: &str, #[case] expected_host: &str, #[case] port: u16) {
        let settings = MqttSettings {
            host: host.to_string(),
            ..MqttSettings::default()
        };
        assert_eq!(
            settings.endpoint().unwrap(),
            BrokerEndpoint {
                host: expected_host.to_string(),
                port
            }
        );
    }

    #[test]
    fn test_unsupported_scheme_is_rejected() {
        let settings = MqttSettings {
            host: "ws://broker.lan".to_string(),
            ..MqttSettings::default()
        };
        assert!(matches!(
            settings.endpoint(),
            Err(ConfigError::BrokerAddress { .. })
        ));
    }

    #[test]
    fn test_generated_client_id() {
        let settings = MqttSettings::default();
        assert!(settings.client_id().starts_with("hub-mqtt-bridge-"));
        assert_ne!(settings.client_id(), settings.client_id());

        let fixed = MqttSettings {
            client_id: Some("bridge-1".to_string()),
            ..MqttSettings::default()
        };
        assert_eq!(fixed.client_id(), "bridge-1");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ConfigPaths::new(dir.path());
        let (config, source) = BridgeConfig::load(&paths.config_file()).unwrap();
        assert_eq!(source, ConfigSource::Defaults);
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_unparseable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ConfigPaths::new(dir.path());
        std::fs::write(paths.config_file(), "port = \"eighty\"").unwrap();
        assert!(matches!(
            BridgeConfig::load(&paths.config_file()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_paths() {
        let paths = ConfigPaths::new("/etc/bridge");
        assert_eq!(paths.config_file(), PathBuf::from("/etc/bridge/config.toml"));
        assert_eq!(paths.devices_file(), PathBuf::from("/etc/bridge/devices.toml"));
        assert_eq!(paths.data_dir(), PathBuf::from("/etc/bridge/data"));
    }
}
