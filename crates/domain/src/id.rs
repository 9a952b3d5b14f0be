//! Typed identifier newtypes.
//!
//! Identifiers are derived from configuration (slugified names), never
//! generated at random, so they stay stable across restarts and can be used
//! in push URLs configured on the controller.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::channel::ChannelKind;

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an already-normalised identifier.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

define_id!(
    /// Identifier of a [`Device`](crate::device::Device), the slug of its name.
    DeviceId
);

define_id!(
    /// Hub-facing identifier of a channel, `<role>.<slug>` (e.g. `switch.garden_pump`).
    EntityId
);

/// Identity of one physical line: `(device, kind, local id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelKey {
    pub device: DeviceId,
    pub kind: ChannelKind,
    pub local_id: u16,
}

impl ChannelKey {
    #[must_use]
    pub fn new(device: DeviceId, kind: ChannelKind, local_id: u16) -> Self {
        Self {
            device,
            kind,
            local_id,
        }
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.device, self.kind, self.local_id)
    }
}

/// Lowercase `name`, replacing every run of non-alphanumeric characters by a
/// single underscore and trimming underscores at both ends.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_separator = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('_');
            }
            pending_separator = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_slugify_spaces_and_case() {
        assert_eq!(slugify("Garden Pump"), "garden_pump");
    }

    #[test]
    fn should_collapse_separator_runs() {
        assert_eq!(slugify("  Hall -- light #2 "), "hall_light_2");
    }

    #[test]
    fn should_return_empty_slug_for_symbols_only() {
        assert_eq!(slugify("--!!"), "");
    }

    #[test]
    fn should_display_channel_key() {
        let key = ChannelKey::new(DeviceId::new("garage"), ChannelKind::Output, 7);
        assert_eq!(key.to_string(), "garage/output/7");
    }

    #[test]
    fn should_serialize_ids_transparently() {
        let id = EntityId::new("light.porch");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"light.porch\"");
    }

    #[test]
    fn should_order_keys_by_device_then_kind_then_id() {
        let a = ChannelKey::new(DeviceId::new("a"), ChannelKind::Output, 9);
        let b = ChannelKey::new(DeviceId::new("a"), ChannelKind::Input, 1);
        let c = ChannelKey::new(DeviceId::new("b"), ChannelKind::Output, 1);
        assert!(a < b);
        assert!(b < c);
    }
}
