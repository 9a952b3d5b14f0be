//! Device client port: the only way the core talks to a controller.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use ipxbridge_domain::channel::ChannelKind;
use ipxbridge_domain::device::Device;
use ipxbridge_domain::error::BridgeError;
use ipxbridge_domain::id::ChannelKey;

/// Raw channel values reported by one full-state query, keyed by
/// `(kind, local_id)`. May contain channels that are not configured.
pub type Readings = HashMap<(ChannelKind, u16), bool>;

/// Network access to a controller.
///
/// Implementations are stateless between calls and never retry; every call
/// is bounded by the device's request timeout.
pub trait DeviceClient {
    /// Connectivity check.
    fn ping(&self, device: &Device) -> impl Future<Output = Result<(), BridgeError>> + Send;

    /// Read every channel the controller exposes.
    fn query_all(&self, device: &Device)
    -> impl Future<Output = Result<Readings, BridgeError>> + Send;

    /// Ask the controller to drive `channel` to `on`.
    ///
    /// `Ok` means the controller accepted the request, not that the relay
    /// actually switched.
    fn set_state(
        &self,
        device: &Device,
        channel: &ChannelKey,
        on: bool,
    ) -> impl Future<Output = Result<(), BridgeError>> + Send;
}

impl<T: DeviceClient + Send + Sync> DeviceClient for Arc<T> {
    fn ping(&self, device: &Device) -> impl Future<Output = Result<(), BridgeError>> + Send {
        (**self).ping(device)
    }

    fn query_all(
        &self,
        device: &Device,
    ) -> impl Future<Output = Result<Readings, BridgeError>> + Send {
        (**self).query_all(device)
    }

    fn set_state(
        &self,
        device: &Device,
        channel: &ChannelKey,
        on: bool,
    ) -> impl Future<Output = Result<(), BridgeError>> + Send {
        (**self).set_state(device, channel, on)
    }
}
