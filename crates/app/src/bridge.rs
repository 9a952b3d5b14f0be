//! Bridge assembly: wires the store, engine, pollers, push receiver and
//! command workers together and owns their tasks.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use ipxbridge_domain::device::{Device, DeviceSummary};
use ipxbridge_domain::health::DeviceHealth;
use ipxbridge_domain::id::{DeviceId, EntityId};

use crate::commands::{CommandHandle, CommandWorker};
use crate::entity::ChannelEntity;
use crate::event_bus::{DEFAULT_CAPACITY, InProcessEventBus};
use crate::poll_coordinator::{DevicePoller, REFRESH_COOLDOWN, RefreshHandle, RefreshScope};
use crate::ports::DeviceClient;
use crate::push_receiver::{PushReceiver, PushWorker};
use crate::reconciler::ReconciliationEngine;
use crate::state_store::StateStore;

struct DeviceHandle {
    device: Arc<Device>,
    health: watch::Receiver<DeviceHealth>,
    refresh: RefreshHandle,
    commands: CommandHandle,
}

/// Running synchronization core.
///
/// Dropping the bridge (or calling [`shutdown`](Self::shutdown)) aborts
/// every background task it spawned.
pub struct Bridge {
    store: Arc<StateStore>,
    bus: InProcessEventBus,
    push: Arc<PushReceiver>,
    devices: BTreeMap<DeviceId, DeviceHandle>,
    tasks: Vec<JoinHandle<()>>,
}

impl Bridge {
    #[must_use]
    pub fn builder() -> BridgeBuilder {
        BridgeBuilder::default()
    }

    #[must_use]
    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    #[must_use]
    pub fn event_bus(&self) -> &InProcessEventBus {
        &self.bus
    }

    #[must_use]
    pub fn push_receiver(&self) -> &Arc<PushReceiver> {
        &self.push
    }

    /// Handle for the channel behind `entity_id`.
    #[must_use]
    pub fn entity(&self, entity_id: &EntityId) -> Option<ChannelEntity> {
        let key = self.store.resolve(entity_id)?;
        let handle = self.devices.get(&key.device)?;
        let channel = self.store.channel(key)?.clone();
        Some(ChannelEntity::new(
            channel,
            Arc::clone(&self.store),
            self.bus.clone(),
            handle.commands.clone(),
            handle.refresh.clone(),
        ))
    }

    /// Handles for every channel, ordered by device then channel.
    #[must_use]
    pub fn entities(&self) -> Vec<ChannelEntity> {
        self.devices
            .values()
            .flat_map(|handle| handle.device.channels.iter())
            .filter_map(|channel| self.entity(&channel.entity_id))
            .collect()
    }

    #[must_use]
    pub fn devices(&self) -> Vec<DeviceSummary> {
        self.devices
            .values()
            .map(|handle| DeviceSummary::from(handle.device.as_ref()))
            .collect()
    }

    /// Current health of every running device.
    #[must_use]
    pub fn health(&self) -> Vec<(DeviceSummary, DeviceHealth)> {
        self.devices
            .values()
            .map(|handle| {
                (
                    DeviceSummary::from(handle.device.as_ref()),
                    handle.health.borrow().clone(),
                )
            })
            .collect()
    }

    /// Health feed of one device.
    #[must_use]
    pub fn health_watch(&self, device: &DeviceId) -> Option<watch::Receiver<DeviceHealth>> {
        self.devices.get(device).map(|handle| handle.health.clone())
    }

    /// Request a full poll of every device. Returns how many accepted.
    pub fn refresh_all(&self) -> usize {
        self.devices
            .values()
            .filter(|handle| handle.refresh.request(RefreshScope::All))
            .count()
    }

    /// Abort every background task.
    pub fn shutdown(&self) {
        for task in &self.tasks {
            task.abort();
        }
        tracing::info!("bridge stopped");
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Collects devices and tuning knobs, then starts a [`Bridge`].
#[derive(Debug)]
pub struct BridgeBuilder {
    devices: Vec<Device>,
    refresh_cooldown: Duration,
    event_capacity: usize,
}

impl Default for BridgeBuilder {
    fn default() -> Self {
        Self {
            devices: Vec::new(),
            refresh_cooldown: REFRESH_COOLDOWN,
            event_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl BridgeBuilder {
    #[must_use]
    pub fn device(mut self, device: Device) -> Self {
        self.devices.push(device);
        self
    }

    #[must_use]
    pub fn devices(mut self, devices: impl IntoIterator<Item = Device>) -> Self {
        self.devices.extend(devices);
        self
    }

    #[must_use]
    pub fn refresh_cooldown(mut self, cooldown: Duration) -> Self {
        self.refresh_cooldown = cooldown;
        self
    }

    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Register every device and spawn its tasks. Must run inside a tokio
    /// runtime.
    ///
    /// A device whose channels clash with an already registered one is
    /// skipped with an error log; the others start normally.
    pub fn start<C>(self, client: C) -> Bridge
    where
        C: DeviceClient + Send + Sync + 'static,
    {
        let mut store_builder = StateStore::builder();
        let mut accepted = Vec::with_capacity(self.devices.len());
        for device in self.devices {
            match store_builder.register(&device) {
                Ok(()) => accepted.push(Arc::new(device)),
                Err(err) => {
                    tracing::error!(device = %device.id, error = %err, "device skipped");
                }
            }
        }

        let store = Arc::new(store_builder.build());
        let bus = InProcessEventBus::new(self.event_capacity);
        let engine = Arc::new(ReconciliationEngine::new(Arc::clone(&store), bus.clone()));
        let client = Arc::new(client);
        let mut push = PushReceiver::new(Arc::clone(&store));
        let mut devices = BTreeMap::new();
        let mut tasks = Vec::new();

        for device in accepted {
            if device.scan_interval_too_low() {
                tracing::warn!(
                    device = %device.id,
                    scan_interval_secs = device.scan_interval.as_secs(),
                    "scan interval below 10s may overload the controller"
                );
            }

            let (poller, refresh, health) =
                DevicePoller::new(Arc::clone(&device), Arc::clone(&client), Arc::clone(&engine));
            tasks.push(tokio::spawn(
                poller.with_cooldown(self.refresh_cooldown).run(),
            ));

            let (worker, commands) =
                CommandWorker::new(Arc::clone(&device), Arc::clone(&client), refresh.clone());
            tasks.push(tokio::spawn(worker.run()));

            if let Some(sessions) = push.register(&device, refresh.clone()) {
                let worker = PushWorker::new(device.id.clone(), Arc::clone(&engine), sessions);
                tasks.push(tokio::spawn(worker.run()));
            }

            devices.insert(
                device.id.clone(),
                DeviceHandle {
                    device,
                    health,
                    refresh,
                    commands,
                },
            );
        }

        tracing::info!(
            devices = devices.len(),
            channels = store.len(),
            push_enabled = push.is_enabled(),
            "bridge started"
        );

        Bridge {
            store,
            bus,
            push: Arc::new(push),
            devices,
            tasks,
        }
    }
}
