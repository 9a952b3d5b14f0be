//! Change publisher port: fan-out of accepted state flips.

use ipxbridge_domain::event::ChannelChange;

/// Delivers change notifications to interested subscribers.
///
/// Called while the channel's record is locked, so implementations must
/// not block or await.
pub trait ChangePublisher {
    fn publish(&self, change: ChannelChange);
}

impl<T: ChangePublisher + ?Sized> ChangePublisher for std::sync::Arc<T> {
    fn publish(&self, change: ChannelChange) {
        (**self).publish(change);
    }
}
