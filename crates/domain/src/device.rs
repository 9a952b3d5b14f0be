//! Device: one controller endpoint and the fixed set of channels wired to it.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::channel::{Channel, ChannelBuilder};
use crate::error::ConfigurationError;
use crate::id::{DeviceId, slugify};

/// Default HTTP port of the controller.
pub const DEFAULT_PORT: u16 = 80;
/// Default poll interval.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(10);
/// Poll intervals below this overload the controller.
pub const MIN_RECOMMENDED_SCAN_INTERVAL: Duration = Duration::from_secs(10);
/// Default per-request timeout for controller calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
/// Username the controller uses on push calls; only the password is configurable.
pub const PUSH_USERNAME: &str = "ipx800";

/// HTTP basic-auth credentials. The password never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A configured controller.
#[derive(Debug, Clone)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub credentials: Option<Credentials>,
    /// Credentials expected on push calls; push is disabled when `None`.
    pub push_credentials: Option<Credentials>,
    pub scan_interval: Duration,
    pub request_timeout: Duration,
    pub channels: Vec<Channel>,
}

impl Device {
    /// Create a builder for constructing a [`Device`].
    #[must_use]
    pub fn builder() -> DeviceBuilder {
        DeviceBuilder::default()
    }

    /// `http://host:port`, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Whether the configured poll interval is below what the controller
    /// can sustain.
    #[must_use]
    pub fn scan_interval_too_low(&self) -> bool {
        self.scan_interval < MIN_RECOMMENDED_SCAN_INTERVAL
    }
}

/// Public, credential-free view of a device for read APIs.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSummary {
    pub id: DeviceId,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub push_enabled: bool,
    pub scan_interval_secs: u64,
    pub channel_count: usize,
}

impl From<&Device> for DeviceSummary {
    fn from(device: &Device) -> Self {
        Self {
            id: device.id.clone(),
            name: device.name.clone(),
            host: device.host.clone(),
            port: device.port,
            push_enabled: device.push_credentials.is_some(),
            scan_interval_secs: device.scan_interval.as_secs(),
            channel_count: device.channels.len(),
        }
    }
}

/// Step-by-step builder for [`Device`].
#[derive(Debug, Default)]
pub struct DeviceBuilder {
    name: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    credentials: Option<Credentials>,
    push_credentials: Option<Credentials>,
    scan_interval: Option<Duration>,
    request_timeout: Option<Duration>,
    channels: Vec<ChannelBuilder>,
}

impl DeviceBuilder {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Enable push for this device, authenticated as [`PUSH_USERNAME`].
    #[must_use]
    pub fn push_password(mut self, password: impl Into<String>) -> Self {
        self.push_credentials = Some(Credentials {
            username: PUSH_USERNAME.to_string(),
            password: password.into(),
        });
        self
    }

    #[must_use]
    pub fn scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = Some(interval);
        self
    }

    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn channel(mut self, channel: ChannelBuilder) -> Self {
        self.channels.push(channel);
        self
    }

    /// Consume the builder, validate, and return a [`Device`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::EmptyName`] / [`ConfigurationError::EmptyHost`]
    /// for missing identity, [`ConfigurationError::ZeroInterval`] for a zero
    /// scan interval or timeout, any error from [`ChannelBuilder::build`], and
    /// [`ConfigurationError::DuplicateChannel`] when two channels share a
    /// kind and local id.
    pub fn build(self) -> Result<Device, ConfigurationError> {
        let name = self.name.unwrap_or_default();
        let slug = slugify(&name);
        if slug.is_empty() {
            return Err(ConfigurationError::EmptyName);
        }
        let host = self.host.unwrap_or_default();
        if host.trim().is_empty() {
            return Err(ConfigurationError::EmptyHost);
        }
        let id = DeviceId::new(slug);
        let scan_interval = self.scan_interval.unwrap_or(DEFAULT_SCAN_INTERVAL);
        let request_timeout = self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        if scan_interval.is_zero() || request_timeout.is_zero() {
            return Err(ConfigurationError::ZeroInterval);
        }

        let mut seen = HashSet::new();
        let mut channels = Vec::with_capacity(self.channels.len());
        for builder in self.channels {
            let channel = builder.build(&id)?;
            if !seen.insert((channel.key.kind, channel.key.local_id)) {
                return Err(ConfigurationError::DuplicateChannel {
                    kind: channel.key.kind,
                    local_id: channel.key.local_id,
                });
            }
            channels.push(channel);
        }

        Ok(Device {
            id,
            name,
            host,
            port: self.port.unwrap_or(DEFAULT_PORT),
            credentials: self.credentials,
            push_credentials: self.push_credentials,
            scan_interval,
            request_timeout,
            channels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelKind, ChannelRole};

    fn relay(name: &str, id: u16) -> ChannelBuilder {
        Channel::builder()
            .name(name)
            .role(ChannelRole::Switch)
            .local_id(id)
    }

    #[test]
    fn should_build_device_with_defaults() {
        let device = Device::builder()
            .name("Garage IPX")
            .host("192.168.1.240")
            .channel(relay("Pump", 1))
            .build()
            .unwrap();
        assert_eq!(device.id.as_str(), "garage_ipx");
        assert_eq!(device.port, 80);
        assert_eq!(device.scan_interval, DEFAULT_SCAN_INTERVAL);
        assert_eq!(device.channels.len(), 1);
        assert_eq!(device.channels[0].key.device, device.id);
    }

    #[test]
    fn should_return_error_when_host_is_empty() {
        let result = Device::builder().name("Garage").host(" ").build();
        assert!(matches!(result, Err(ConfigurationError::EmptyHost)));
    }

    #[test]
    fn should_return_error_when_name_is_missing() {
        let result = Device::builder().host("10.0.0.2").build();
        assert!(matches!(result, Err(ConfigurationError::EmptyName)));
    }

    #[test]
    fn should_reject_duplicate_channels() {
        let result = Device::builder()
            .name("Garage")
            .host("10.0.0.2")
            .channel(relay("Pump", 1))
            .channel(relay("Fan", 1))
            .build();
        assert!(matches!(
            result,
            Err(ConfigurationError::DuplicateChannel {
                kind: ChannelKind::Output,
                local_id: 1
            })
        ));
    }

    #[test]
    fn should_allow_same_local_id_on_different_kinds() {
        let device = Device::builder()
            .name("Garage")
            .host("10.0.0.2")
            .channel(relay("Pump", 1))
            .channel(
                Channel::builder()
                    .name("Door")
                    .role(ChannelRole::BinarySensor)
                    .local_id(1),
            )
            .build()
            .unwrap();
        assert_eq!(device.channels.len(), 2);
    }

    #[test]
    fn should_flag_low_scan_interval() {
        let device = Device::builder()
            .name("Garage")
            .host("10.0.0.2")
            .scan_interval(Duration::from_secs(2))
            .build()
            .unwrap();
        assert!(device.scan_interval_too_low());
    }

    #[test]
    fn should_reject_zero_scan_interval() {
        let result = Device::builder()
            .name("Garage")
            .host("10.0.0.2")
            .scan_interval(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(ConfigurationError::ZeroInterval)));
    }

    #[test]
    fn should_enable_push_with_fixed_username() {
        let device = Device::builder()
            .name("Garage")
            .host("10.0.0.2")
            .push_password("pushsecret")
            .build()
            .unwrap();
        let push = device.push_credentials.as_ref().unwrap();
        assert_eq!(push.username, PUSH_USERNAME);
        assert_eq!(push.password, "pushsecret");
        assert!(DeviceSummary::from(&device).push_enabled);
        assert!(!format!("{device:?}").contains("pushsecret"));
    }

    #[test]
    fn should_redact_password_in_debug_output() {
        let device = Device::builder()
            .name("Garage")
            .host("10.0.0.2")
            .credentials("admin", "hunter2")
            .build()
            .unwrap();
        let debug = format!("{device:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("admin"));
    }

    #[test]
    fn should_format_base_url() {
        let device = Device::builder()
            .name("Garage")
            .host("10.0.0.2")
            .port(8080)
            .build()
            .unwrap();
        assert_eq!(device.base_url(), "http://10.0.0.2:8080");
    }
}
