//! State store: owner of every channel record.
//!
//! The channel map is built once from configuration and never changes shape
//! afterwards, so lookups are lock-free. Each record carries its own mutex;
//! writes to different channels never contend and writes to the same channel
//! are strictly serialized.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

use ipxbridge_domain::channel::{Channel, ChannelSnapshot, ChannelState};
use ipxbridge_domain::device::Device;
use ipxbridge_domain::error::ConfigurationError;
use ipxbridge_domain::id::{ChannelKey, DeviceId, EntityId};

#[derive(Debug)]
struct ChannelRecord {
    channel: Channel,
    state: Mutex<ChannelState>,
}

impl ChannelRecord {
    fn lock(&self) -> std::sync::MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Process-wide table of channel records.
#[derive(Debug)]
pub struct StateStore {
    records: HashMap<ChannelKey, ChannelRecord>,
    by_entity: HashMap<EntityId, ChannelKey>,
}

impl StateStore {
    #[must_use]
    pub fn builder() -> StateStoreBuilder {
        StateStoreBuilder::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn contains(&self, key: &ChannelKey) -> bool {
        self.records.contains_key(key)
    }

    /// Map a hub-facing entity id to its channel key.
    #[must_use]
    pub fn resolve(&self, entity_id: &EntityId) -> Option<&ChannelKey> {
        self.by_entity.get(entity_id)
    }

    #[must_use]
    pub fn channel(&self, key: &ChannelKey) -> Option<&Channel> {
        self.records.get(key).map(|record| &record.channel)
    }

    /// Copy of the channel's current state.
    #[must_use]
    pub fn state(&self, key: &ChannelKey) -> Option<ChannelState> {
        self.records.get(key).map(|record| record.lock().clone())
    }

    #[must_use]
    pub fn snapshot(&self, key: &ChannelKey) -> Option<ChannelSnapshot> {
        self.records.get(key).map(|record| ChannelSnapshot {
            channel: record.channel.clone(),
            state: record.lock().clone(),
        })
    }

    #[must_use]
    pub fn snapshot_by_entity(&self, entity_id: &EntityId) -> Option<ChannelSnapshot> {
        self.resolve(entity_id).and_then(|key| self.snapshot(key))
    }

    /// Snapshots of every channel, ordered by key.
    #[must_use]
    pub fn snapshots(&self) -> Vec<ChannelSnapshot> {
        let mut keys: Vec<&ChannelKey> = self.records.keys().collect();
        keys.sort();
        keys.into_iter()
            .filter_map(|key| self.snapshot(key))
            .collect()
    }

    /// Run `f` with the channel's record locked.
    ///
    /// Only the reconciliation engine writes through this.
    pub(crate) fn with_record<R>(
        &self,
        key: &ChannelKey,
        f: impl FnOnce(&Channel, &mut ChannelState) -> R,
    ) -> Option<R> {
        let record = self.records.get(key)?;
        let mut state = record.lock();
        Some(f(&record.channel, &mut state))
    }
}

/// Collects devices into a [`StateStore`].
#[derive(Debug, Default)]
pub struct StateStoreBuilder {
    records: HashMap<ChannelKey, ChannelRecord>,
    by_entity: HashMap<EntityId, ChannelKey>,
    devices: HashSet<DeviceId>,
}

impl StateStoreBuilder {
    /// Add every channel of `device`, all or nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::DuplicateDevice`] when a device with the
    /// same id was already registered, and
    /// [`ConfigurationError::DuplicateEntityId`] when one of its channels
    /// would reuse an entity id taken by another device.
    pub fn register(&mut self, device: &Device) -> Result<(), ConfigurationError> {
        if self.devices.contains(&device.id) {
            return Err(ConfigurationError::DuplicateDevice(device.id.to_string()));
        }
        let mut pending = HashSet::new();
        for channel in &device.channels {
            if self.by_entity.contains_key(&channel.entity_id)
                || !pending.insert(&channel.entity_id)
            {
                return Err(ConfigurationError::DuplicateEntityId(
                    channel.entity_id.to_string(),
                ));
            }
        }

        self.devices.insert(device.id.clone());
        for channel in &device.channels {
            self.by_entity
                .insert(channel.entity_id.clone(), channel.key.clone());
            self.records.insert(
                channel.key.clone(),
                ChannelRecord {
                    channel: channel.clone(),
                    state: Mutex::new(ChannelState::default()),
                },
            );
        }
        Ok(())
    }

    #[must_use]
    pub fn build(self) -> StateStore {
        StateStore {
            records: self.records,
            by_entity: self.by_entity,
        }
    }
}
