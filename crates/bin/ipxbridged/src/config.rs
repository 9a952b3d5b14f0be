//! Configuration loading: TOML file with environment variable overrides.
//!
//! Reads `ipxbridge.toml` from the working directory unless another path is
//! given on the command line or in `IPXBRIDGE_CONFIG`. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use ipxbridge_domain::channel::{Channel, ChannelBuilder, ChannelKind, ChannelRole};
use ipxbridge_domain::device::{DEFAULT_PORT, Device};
use ipxbridge_domain::error::ConfigurationError;

/// Config file used when no path is given.
pub const DEFAULT_CONFIG_PATH: &str = "ipxbridge.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Controllers to synchronize.
    pub devices: Vec<DeviceConfig>,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// One `[[devices]]` table.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Enables the push endpoints for this device.
    pub push_password: Option<String>,
    pub scan_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub channels: Vec<ChannelConfig>,
}

/// One `[[devices.channels]]` table.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub name: String,
    /// `switch`, `light` or `binary_sensor`.
    pub component: String,
    /// `relay` or `digitalin`; inferred from the component when omitted.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub id: Option<u16>,
    pub icon: Option<String>,
    pub device_class: Option<String>,
}

impl Config {
    /// Load configuration from `path` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is unreadable or
    /// malformed, or if process-level settings are invalid.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("IPXBRIDGE_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("IPXBRIDGE_PORT")
            && let Ok(port) = val.parse()
        {
            self.server.port = port;
        }
        if let Ok(val) = std::env::var("IPXBRIDGE_BIND")
            && let Some((host, port)) = val.rsplit_once(':')
        {
            self.server.host = host.to_string();
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(val) = std::env::var("IPXBRIDGE_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Turn every `[[devices]]` table into a [`Device`].
    ///
    /// Invalid tables do not abort the others; they come back in the second
    /// list together with the configured name.
    #[must_use]
    pub fn build_devices(&self) -> (Vec<Device>, Vec<(String, ConfigurationError)>) {
        let mut devices = Vec::new();
        let mut rejected = Vec::new();
        for table in &self.devices {
            match table.to_device() {
                Ok(device) => devices.push(device),
                Err(err) => rejected.push((table.name.clone(), err)),
            }
        }
        (devices, rejected)
    }
}

/// Resolve the config path: CLI argument, then `IPXBRIDGE_CONFIG`, then
/// [`DEFAULT_CONFIG_PATH`].
#[must_use]
pub fn config_path(cli_arg: Option<String>) -> String {
    cli_arg
        .or_else(|| std::env::var("IPXBRIDGE_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
}

impl DeviceConfig {
    /// Validate and convert into a domain [`Device`].
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigurationError`] found in the table or one of
    /// its channels.
    pub fn to_device(&self) -> Result<Device, ConfigurationError> {
        let mut builder = Device::builder()
            .name(&self.name)
            .host(&self.host)
            .port(self.port)
            .scan_interval(Duration::from_secs(self.scan_interval_secs))
            .request_timeout(Duration::from_secs(self.request_timeout_secs));
        if let Some(username) = &self.username {
            builder = builder.credentials(username, self.password.clone().unwrap_or_default());
        }
        if let Some(password) = &self.push_password {
            builder = builder.push_password(password);
        }
        for channel in &self.channels {
            builder = builder.channel(channel.to_builder()?);
        }
        builder.build()
    }
}

impl ChannelConfig {
    fn to_builder(&self) -> Result<ChannelBuilder, ConfigurationError> {
        let role = ChannelRole::from_str(&self.component)?;
        let mut builder = Channel::builder().name(&self.name).role(role);
        if let Some(kind) = &self.kind {
            builder = builder.kind(ChannelKind::from_str(kind)?);
        }
        if let Some(id) = self.id {
            builder = builder.local_id(id);
        }
        if let Some(icon) = &self.icon {
            builder = builder.icon(icon);
        }
        if let Some(device_class) = &self.device_class {
            builder = builder.device_class(device_class);
        }
        Ok(builder)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8123,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "ipxbridged=info,ipxbridge=info,tower_http=debug".to_string(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            host: String::new(),
            port: DEFAULT_PORT,
            username: None,
            password: None,
            push_password: None,
            scan_interval_secs: 10,
            request_timeout_secs: 5,
            channels: Vec::new(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
