//! In-process event bus backed by a tokio broadcast channel.

use tokio::sync::broadcast;

use ipxbridge_domain::event::ChannelChange;
use ipxbridge_domain::id::ChannelKey;

use crate::ports::ChangePublisher;

/// Default number of buffered notifications per subscriber.
pub const DEFAULT_CAPACITY: usize = 256;

/// In-process event bus using a tokio [`broadcast`] channel.
///
/// Publishing succeeds even when there are no active subscribers
/// (the notification is simply dropped).
#[derive(Debug, Clone)]
pub struct InProcessEventBus {
    sender: broadcast::Sender<ChannelChange>,
}

impl InProcessEventBus {
    /// Create a new event bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to every change on this bus.
    ///
    /// Returns a receiver that will get all changes published *after*
    /// the subscription is created.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChannelChange> {
        self.sender.subscribe()
    }

    /// Subscribe to changes of a single channel.
    #[must_use]
    pub fn subscribe_channel(&self, channel: ChannelKey) -> ChannelSubscription {
        ChannelSubscription {
            channel,
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for InProcessEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChangePublisher for InProcessEventBus {
    fn publish(&self, change: ChannelChange) {
        // send only fails when nobody is listening
        let _ = self.sender.send(change);
    }
}

/// Change stream filtered down to one channel.
#[derive(Debug)]
pub struct ChannelSubscription {
    channel: ChannelKey,
    receiver: broadcast::Receiver<ChannelChange>,
}

impl ChannelSubscription {
    /// Wait for the next change of this channel.
    ///
    /// A slow subscriber that falls behind skips the overwritten
    /// notifications and keeps going. Returns `None` once the bus is gone.
    pub async fn next(&mut self) -> Option<ChannelChange> {
        loop {
            match self.receiver.recv().await {
                Ok(change) if change.channel == self.channel => return Some(change),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(channel = %self.channel, skipped, "subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
