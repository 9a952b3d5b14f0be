//! Entity-facing handle of one channel.

use std::sync::Arc;

use ipxbridge_domain::channel::{Channel, ChannelSnapshot, ChannelState};
use ipxbridge_domain::error::{BridgeError, CommunicationError, ValidationError};

use crate::commands::CommandHandle;
use crate::event_bus::{ChannelSubscription, InProcessEventBus};
use crate::poll_coordinator::{RefreshHandle, RefreshScope};
use crate::state_store::StateStore;

/// What a hub entity sees of a channel: its current state, a command path,
/// and a change stream.
#[derive(Debug, Clone)]
pub struct ChannelEntity {
    channel: Channel,
    store: Arc<StateStore>,
    bus: InProcessEventBus,
    commands: CommandHandle,
    refresh: RefreshHandle,
}

impl ChannelEntity {
    pub(crate) fn new(
        channel: Channel,
        store: Arc<StateStore>,
        bus: InProcessEventBus,
        commands: CommandHandle,
        refresh: RefreshHandle,
    ) -> Self {
        Self {
            channel,
            store,
            bus,
            commands,
            refresh,
        }
    }

    #[must_use]
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Last reconciled state.
    #[must_use]
    pub fn current_state(&self) -> bool {
        self.store
            .state(&self.channel.key)
            .is_some_and(|state| state.on)
    }

    #[must_use]
    pub fn snapshot(&self) -> ChannelSnapshot {
        self.store
            .snapshot(&self.channel.key)
            .unwrap_or_else(|| ChannelSnapshot {
                channel: self.channel.clone(),
                state: ChannelState::default(),
            })
    }

    /// Ask the controller to drive the channel to `on`.
    ///
    /// Returns once the command is queued; the resulting state arrives later
    /// through [`subscribe`](Self::subscribe).
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ReadOnlyChannel`] for input channels and
    /// [`CommunicationError::Unreachable`] when the device's command worker
    /// has stopped, in which case nothing was queued.
    pub fn request_change(&self, on: bool) -> Result<(), BridgeError> {
        if !self.channel.role.is_writable() {
            return Err(ValidationError::ReadOnlyChannel(self.channel.entity_id.to_string()).into());
        }
        tracing::debug!(entity_id = %self.channel.entity_id, on, "change requested");
        if !self.commands.send(self.channel.key.clone(), on) {
            return Err(CommunicationError::Unreachable {
                message: format!("command worker of {} stopped", self.channel.key.device),
            }
            .into());
        }
        Ok(())
    }

    /// Request the opposite of the current state.
    ///
    /// # Errors
    ///
    /// Same as [`request_change`](Self::request_change).
    pub fn toggle(&self) -> Result<(), BridgeError> {
        self.request_change(!self.current_state())
    }

    /// Re-read this channel from the controller. Returns `false` when the
    /// device's poller is gone.
    pub fn refresh(&self) -> bool {
        self.refresh
            .request(RefreshScope::channel(self.channel.key.clone()))
    }

    /// Change notifications for this channel only.
    #[must_use]
    pub fn subscribe(&self) -> ChannelSubscription {
        self.bus.subscribe_channel(self.channel.key.clone())
    }
}
