//! Stub ports and fixtures shared by the unit tests of this crate.

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::sync::Mutex;

use ipxbridge_domain::channel::{Channel, ChannelBuilder, ChannelKind, ChannelRole};
use ipxbridge_domain::device::Device;
use ipxbridge_domain::error::BridgeError;
use ipxbridge_domain::event::ChannelChange;
use ipxbridge_domain::id::{ChannelKey, DeviceId};

use crate::ports::{ChangePublisher, DeviceClient, Readings};

pub fn relay(name: &str, id: u16) -> ChannelBuilder {
    Channel::builder()
        .name(name)
        .role(ChannelRole::Switch)
        .local_id(id)
}

pub fn sensor(name: &str, id: u16) -> ChannelBuilder {
    Channel::builder()
        .name(name)
        .role(ChannelRole::BinarySensor)
        .local_id(id)
}

pub fn device(name: &str, channels: Vec<ChannelBuilder>) -> Device {
    channels
        .into_iter()
        .fold(
            Device::builder()
                .name(name)
                .host("10.0.0.2")
                .push_password("secret"),
            ipxbridge_domain::device::DeviceBuilder::channel,
        )
        .build()
        .unwrap()
}

pub fn output(device: &str, id: u16) -> ChannelKey {
    ChannelKey::new(DeviceId::new(device), ChannelKind::Output, id)
}

pub fn readings(values: &[(ChannelKind, u16, bool)]) -> Readings {
    values
        .iter()
        .map(|&(kind, id, on)| ((kind, id), on))
        .collect()
}

/// Publisher that remembers every change it was handed.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    changes: Mutex<Vec<ChannelChange>>,
}

impl RecordingPublisher {
    pub fn changes(&self) -> Vec<ChannelChange> {
        self.changes.lock().unwrap().clone()
    }
}

impl ChangePublisher for RecordingPublisher {
    fn publish(&self, change: ChannelChange) {
        self.changes.lock().unwrap().push(change);
    }
}

/// Scriptable [`DeviceClient`].
///
/// Each device answers from its script queue first, then falls back to its
/// steady readings (empty by default). Hung devices never answer.
#[derive(Debug, Default)]
pub struct StubClient {
    scripts: Mutex<HashMap<DeviceId, VecDeque<Result<Readings, BridgeError>>>>,
    steady: Mutex<HashMap<DeviceId, Readings>>,
    hung: Mutex<HashSet<DeviceId>>,
    queries: Mutex<Vec<DeviceId>>,
    commands: Mutex<Vec<(ChannelKey, bool)>>,
    failing_commands: Mutex<bool>,
}

impl StubClient {
    pub fn script(&self, device: &str, result: Result<Readings, BridgeError>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(DeviceId::new(device))
            .or_default()
            .push_back(result);
    }

    pub fn steady(&self, device: &str, readings: Readings) {
        self.steady
            .lock()
            .unwrap()
            .insert(DeviceId::new(device), readings);
    }

    pub fn hang(&self, device: &str) {
        self.hung.lock().unwrap().insert(DeviceId::new(device));
    }

    pub fn fail_commands(&self) {
        *self.failing_commands.lock().unwrap() = true;
    }

    pub fn query_count(&self, device: &str) -> usize {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .filter(|id| id.as_str() == device)
            .count()
    }

    pub fn commands(&self) -> Vec<(ChannelKey, bool)> {
        self.commands.lock().unwrap().clone()
    }
}

impl DeviceClient for StubClient {
    fn ping(&self, _device: &Device) -> impl Future<Output = Result<(), BridgeError>> + Send {
        async { Ok(()) }
    }

    fn query_all(
        &self,
        device: &Device,
    ) -> impl Future<Output = Result<Readings, BridgeError>> + Send {
        self.queries.lock().unwrap().push(device.id.clone());
        let hung = self.hung.lock().unwrap().contains(&device.id);
        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&device.id)
            .and_then(VecDeque::pop_front);
        let result = scripted.unwrap_or_else(|| {
            Ok(self
                .steady
                .lock()
                .unwrap()
                .get(&device.id)
                .cloned()
                .unwrap_or_default())
        });
        async move {
            if hung {
                std::future::pending::<()>().await;
            }
            result
        }
    }

    fn set_state(
        &self,
        _device: &Device,
        channel: &ChannelKey,
        on: bool,
    ) -> impl Future<Output = Result<(), BridgeError>> + Send {
        self.commands.lock().unwrap().push((channel.clone(), on));
        let failing = *self.failing_commands.lock().unwrap();
        async move {
            if failing {
                Err(ipxbridge_domain::error::CommunicationError::Timeout { after_secs: 5 }.into())
            } else {
                Ok(())
            }
        }
    }
}
