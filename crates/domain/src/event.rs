//! Change notifications emitted when a channel's boolean flips.

use serde::{Deserialize, Serialize};

use crate::id::{ChannelKey, EntityId};
use crate::time::Timestamp;
use crate::update::UpdateSource;

/// An accepted write that changed a channel's state.
///
/// Accepted writes that leave the boolean untouched never produce one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelChange {
    pub channel: ChannelKey,
    pub entity_id: EntityId,
    pub from: bool,
    pub to: bool,
    pub revision: u64,
    pub source: UpdateSource,
    pub observed_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelKind;
    use crate::id::DeviceId;
    use crate::time::from_millis;

    #[test]
    fn should_serialize_change_with_lowercase_source() {
        let change = ChannelChange {
            channel: ChannelKey::new(DeviceId::new("garage"), ChannelKind::Output, 7),
            entity_id: EntityId::new("switch.pump"),
            from: false,
            to: true,
            revision: 3,
            source: UpdateSource::Push,
            observed_at: from_millis(0),
        };
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["source"], "push");
        assert_eq!(json["channel"]["kind"], "output");
        assert_eq!(json["entity_id"], "switch.pump");
        assert_eq!(json["revision"], 3);
    }
}
