//! Command path: entity requests flow to the controller through a
//! per-device queue, one command at a time.
//!
//! Commands are fire-and-forget. The controller's acknowledgement only
//! triggers a refresh; the new state reaches the store through the poll or
//! push path like any other observation.

use std::sync::Arc;

use tokio::sync::mpsc;

use ipxbridge_domain::device::Device;
use ipxbridge_domain::id::{ChannelKey, DeviceId};

use crate::poll_coordinator::{RefreshHandle, RefreshScope};
use crate::ports::DeviceClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCommand {
    pub channel: ChannelKey,
    pub on: bool,
}

/// Sender side of a device's command queue.
#[derive(Debug, Clone)]
pub struct CommandHandle {
    device: DeviceId,
    sender: mpsc::UnboundedSender<DeviceCommand>,
}

impl CommandHandle {
    /// Queue a command. Returns `false` when the worker is gone.
    pub fn send(&self, channel: ChannelKey, on: bool) -> bool {
        if self.sender.send(DeviceCommand { channel, on }).is_err() {
            tracing::warn!(device = %self.device, "command worker stopped, command dropped");
            return false;
        }
        true
    }
}

/// Executes queued commands against one controller.
pub struct CommandWorker<C> {
    device: Arc<Device>,
    client: Arc<C>,
    refresh: RefreshHandle,
    commands: mpsc::UnboundedReceiver<DeviceCommand>,
}

impl<C: DeviceClient + Send + Sync + 'static> CommandWorker<C> {
    #[must_use]
    pub fn new(device: Arc<Device>, client: Arc<C>, refresh: RefreshHandle) -> (Self, CommandHandle) {
        let (sender, commands) = mpsc::unbounded_channel();
        let handle = CommandHandle {
            device: device.id.clone(),
            sender,
        };
        let worker = Self {
            device,
            client,
            refresh,
            commands,
        };
        (worker, handle)
    }

    #[tracing::instrument(name = "commands", skip(self), fields(device = %self.device.id))]
    pub async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            match self
                .client
                .set_state(&self.device, &command.channel, command.on)
                .await
            {
                Ok(()) => {
                    tracing::debug!(channel = %command.channel, on = command.on, "command acknowledged");
                    self.refresh.request(RefreshScope::All);
                }
                Err(err) => {
                    tracing::error!(channel = %command.channel, on = command.on, error = %err, "command failed");
                }
            }
        }
    }
}
