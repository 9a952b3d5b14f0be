//! `reqwest`-based [`DeviceClient`] for IPX800 V3 controllers.

use ipxbridge_app::ports::{DeviceClient, Readings};
use ipxbridge_domain::channel::ChannelKind;
use ipxbridge_domain::device::Device;
use ipxbridge_domain::error::BridgeError;
use ipxbridge_domain::id::ChannelKey;

use crate::error::Ipx800Error;
use crate::response::parse_status;

/// Path and query of the full status document.
pub const STATUS_PATH: &str = "/api/xdevices.json?cmd=10";

/// Stateless HTTP client shared by every configured device.
///
/// Each call carries the device's own address, credentials and timeout, so
/// one instance serves any number of controllers.
#[derive(Debug, Clone)]
pub struct Ipx800Client {
    http: reqwest::Client,
}

impl Ipx800Client {
    /// Create a client with a default `reqwest` connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`Ipx800Error::Client`] when the TLS backend cannot be
    /// initialised.
    pub fn new() -> Result<Self, Ipx800Error> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("ipxbridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Ipx800Error::Client)?;
        Ok(Self { http })
    }

    /// Wrap an existing `reqwest` client.
    #[must_use]
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn get(&self, device: &Device, path: &str) -> Result<reqwest::Response, Ipx800Error> {
        let url = format!("{}{path}", device.base_url());
        let mut request = self.http.get(&url).timeout(device.request_timeout);
        if let Some(credentials) = &device.credentials {
            request = request.basic_auth(&credentials.username, Some(&credentials.password));
        }

        let response = request
            .send()
            .await
            .map_err(|err| Ipx800Error::from_reqwest(err, device.request_timeout))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(Ipx800Error::Unauthorized {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(Ipx800Error::Status {
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    /// Fetch and parse the status document.
    ///
    /// # Errors
    ///
    /// Any [`Ipx800Error`] except [`Ipx800Error::NotWritable`].
    #[tracing::instrument(skip_all, fields(device = %device.id))]
    pub async fn fetch_status(&self, device: &Device) -> Result<Readings, Ipx800Error> {
        let body = self
            .get(device, STATUS_PATH)
            .await?
            .text()
            .await
            .map_err(|err| Ipx800Error::from_reqwest(err, device.request_timeout))?;
        let readings = parse_status(&body)?;
        tracing::trace!(channels = readings.len(), "status fetched");
        Ok(readings)
    }

    /// Drive relay `channel` to `on`.
    ///
    /// # Errors
    ///
    /// Returns [`Ipx800Error::NotWritable`] for input channels, otherwise
    /// the transport and status errors of [`fetch_status`](Self::fetch_status).
    #[tracing::instrument(skip_all, fields(channel = %channel, on))]
    pub async fn send_command(
        &self,
        device: &Device,
        channel: &ChannelKey,
        on: bool,
    ) -> Result<(), Ipx800Error> {
        if channel.kind != ChannelKind::Output {
            return Err(Ipx800Error::NotWritable(channel.to_string()));
        }
        let path = format!("/preset.htm?set{}={}", channel.local_id, u8::from(on));
        self.get(device, &path).await?;
        tracing::debug!("command accepted");
        Ok(())
    }
}

impl DeviceClient for Ipx800Client {
    async fn ping(&self, device: &Device) -> Result<(), BridgeError> {
        self.get(device, STATUS_PATH)
            .await
            .map(|_| ())
            .map_err(Ipx800Error::into_domain)
    }

    async fn query_all(&self, device: &Device) -> Result<Readings, BridgeError> {
        self.fetch_status(device)
            .await
            .map_err(Ipx800Error::into_domain)
    }

    async fn set_state(
        &self,
        device: &Device,
        channel: &ChannelKey,
        on: bool,
    ) -> Result<(), BridgeError> {
        self.send_command(device, channel, on)
            .await
            .map_err(Ipx800Error::into_domain)
    }
}
