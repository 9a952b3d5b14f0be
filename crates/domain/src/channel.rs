//! Channel: one physical line on a controller and its reconciled state.
//!
//! A [`Channel`] is the static description (identity, role, presentation
//! metadata) fixed at configuration time. Its mutable part lives in a
//! [`ChannelState`] owned by the state store and only ever changed through
//! [`ChannelState::apply`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::id::{ChannelKey, DeviceId, EntityId, slugify};
use crate::time::Timestamp;
use crate::update::{ApplyOutcome, OrderingToken, StateUpdate, UpdateSource};

/// Physical direction of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// Output relay (`OUTn`), commandable.
    Output,
    /// Digital input (`INn`), read-only.
    Input,
}

impl ChannelKind {
    /// Key prefix used by the controller's status document (`OUT3`, `IN1`).
    #[must_use]
    pub fn wire_prefix(self) -> &'static str {
        match self {
            Self::Output => "OUT",
            Self::Input => "IN",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Output => f.write_str("output"),
            Self::Input => f.write_str("input"),
        }
    }
}

impl FromStr for ChannelKind {
    type Err = ConfigurationError;

    /// Accepts the controller's type names (`relay`, `digitalin`) as well as
    /// the generic `output` / `input`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "relay" | "output" => Ok(Self::Output),
            "digitalin" | "input" => Ok(Self::Input),
            other => Err(ConfigurationError::UnsupportedType(other.to_string())),
        }
    }
}

/// Host-facing component a channel is exposed as.
///
/// Purely a presentation tag: synchronization never looks at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelRole {
    Switch,
    Light,
    BinarySensor,
}

impl ChannelRole {
    /// The only channel kind this role can be bound to.
    #[must_use]
    pub fn required_kind(self) -> ChannelKind {
        match self {
            Self::Switch | Self::Light => ChannelKind::Output,
            Self::BinarySensor => ChannelKind::Input,
        }
    }

    /// Whether the hub may request state changes for this role.
    #[must_use]
    pub fn is_writable(self) -> bool {
        !matches!(self, Self::BinarySensor)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Switch => "switch",
            Self::Light => "light",
            Self::BinarySensor => "binary_sensor",
        }
    }
}

impl fmt::Display for ChannelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelRole {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "switch" => Ok(Self::Switch),
            "light" => Ok(Self::Light),
            "binary_sensor" => Ok(Self::BinarySensor),
            other => Err(ConfigurationError::UnsupportedComponent(other.to_string())),
        }
    }
}

/// Static description of a configured channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub key: ChannelKey,
    pub entity_id: EntityId,
    pub name: String,
    pub role: ChannelRole,
    pub icon: Option<String>,
    pub device_class: Option<String>,
}

impl Channel {
    /// Create a builder for constructing a [`Channel`].
    #[must_use]
    pub fn builder() -> ChannelBuilder {
        ChannelBuilder::default()
    }
}

/// Step-by-step builder for [`Channel`].
///
/// The owning device is supplied at [`build`](Self::build) time, which lets
/// a device builder collect channel definitions before its own id is known.
#[derive(Debug, Default, Clone)]
pub struct ChannelBuilder {
    name: Option<String>,
    role: Option<ChannelRole>,
    kind: Option<ChannelKind>,
    local_id: Option<u16>,
    icon: Option<String>,
    device_class: Option<String>,
}

impl ChannelBuilder {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn role(mut self, role: ChannelRole) -> Self {
        self.role = Some(role);
        self
    }

    /// Defaults to the role's required kind when not set.
    #[must_use]
    pub fn kind(mut self, kind: ChannelKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn local_id(mut self, local_id: u16) -> Self {
        self.local_id = Some(local_id);
        self
    }

    #[must_use]
    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    #[must_use]
    pub fn device_class(mut self, device_class: impl Into<String>) -> Self {
        self.device_class = Some(device_class.into());
        self
    }

    /// Consume the builder, validate, and return a [`Channel`] owned by `device`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::EmptyName`] when the name is missing or
    /// has no alphanumeric character, [`ConfigurationError::InvalidLocalId`]
    /// when the id is missing or zero, [`ConfigurationError::UnsupportedComponent`]
    /// when no role was given, and [`ConfigurationError::IncompatibleRole`]
    /// when the role cannot be bound to the channel kind.
    pub fn build(self, device: &DeviceId) -> Result<Channel, ConfigurationError> {
        let name = self.name.unwrap_or_default();
        let slug = slugify(&name);
        if slug.is_empty() {
            return Err(ConfigurationError::EmptyName);
        }
        let role = self
            .role
            .ok_or_else(|| ConfigurationError::UnsupportedComponent(String::new()))?;
        let kind = self.kind.unwrap_or_else(|| role.required_kind());
        if role.required_kind() != kind {
            return Err(ConfigurationError::IncompatibleRole { role, kind });
        }
        let local_id = match self.local_id {
            Some(id) if id > 0 => id,
            _ => return Err(ConfigurationError::InvalidLocalId { name }),
        };

        Ok(Channel {
            key: ChannelKey::new(device.clone(), kind, local_id),
            entity_id: EntityId::new(format!("{role}.{slug}")),
            name,
            role,
            icon: self.icon,
            device_class: self.device_class,
        })
    }
}

/// Mutable, reconciled state of a channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelState {
    pub on: bool,
    /// Number of accepted writes so far.
    pub revision: u64,
    /// Path that produced the last accepted write; `None` until the first one.
    pub source: Option<UpdateSource>,
    pub observed_at: Option<Timestamp>,
}

impl ChannelState {
    /// Ordering token of the last accepted write, `None` when never written.
    #[must_use]
    pub fn ordering_token(&self) -> Option<OrderingToken> {
        match (self.observed_at, self.source) {
            (Some(observed_at), Some(source)) => Some(OrderingToken {
                observed_at,
                source,
            }),
            _ => None,
        }
    }

    /// Apply `update` if its ordering token is strictly newer than the
    /// recorded one.
    ///
    /// Accepted updates always bump `revision`, even when the boolean does
    /// not change; the outcome tells the caller whether it did.
    pub fn apply(&mut self, update: &StateUpdate) -> ApplyOutcome {
        let incoming = update.ordering_token();
        if self
            .ordering_token()
            .is_some_and(|current| incoming <= current)
        {
            return ApplyOutcome::Stale;
        }

        let from = self.on;
        self.on = update.on;
        self.revision += 1;
        self.source = Some(update.source);
        self.observed_at = Some(update.observed_at);

        if from == update.on {
            ApplyOutcome::Unchanged
        } else {
            ApplyOutcome::Changed { from, to: update.on }
        }
    }
}

/// A channel description together with its current state, for read APIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    #[serde(flatten)]
    pub channel: Channel,
    pub state: ChannelState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{MonotonicClock, from_millis};
    use std::time::{Duration, Instant};

    fn device() -> DeviceId {
        DeviceId::new("device1")
    }

    fn update(on: bool, millis: i64, source: UpdateSource) -> StateUpdate {
        StateUpdate {
            channel: ChannelKey::new(device(), ChannelKind::Output, 7),
            on,
            observed_at: from_millis(millis),
            source,
        }
    }

    #[test]
    fn should_keep_accepting_updates_after_wall_clock_steps_back() {
        let anchor = Instant::now();
        let clock = MonotonicClock::new(from_millis(7_200_000), anchor);
        let key = ChannelKey::new(device(), ChannelKind::Output, 7);
        let mut state = ChannelState::default();
        state.apply(&StateUpdate::push(
            key.clone(),
            true,
            clock.stamp(anchor + Duration::from_secs(1)),
        ));

        // system time stepped back one hour between the two observations
        let raw_wall = from_millis(7_200_000 + 2_000 - 3_600_000);
        let mut frozen = state.clone();
        assert_eq!(
            frozen.apply(&StateUpdate::poll(key.clone(), false, raw_wall)),
            ApplyOutcome::Stale
        );

        let outcome = state.apply(&StateUpdate::poll(
            key,
            false,
            clock.stamp(anchor + Duration::from_secs(2)),
        ));
        assert_eq!(outcome, ApplyOutcome::Changed { from: true, to: false });
        assert_eq!(state.revision, 2);
    }

    #[test]
    fn should_build_switch_with_derived_entity_id() {
        let channel = Channel::builder()
            .name("Garden Pump")
            .role(ChannelRole::Switch)
            .local_id(3)
            .build(&device())
            .unwrap();
        assert_eq!(channel.entity_id.as_str(), "switch.garden_pump");
        assert_eq!(channel.key.kind, ChannelKind::Output);
        assert_eq!(channel.key.local_id, 3);
    }

    #[test]
    fn should_return_error_when_name_is_empty() {
        let result = Channel::builder()
            .role(ChannelRole::Light)
            .local_id(1)
            .build(&device());
        assert_eq!(result, Err(ConfigurationError::EmptyName));
    }

    #[test]
    fn should_return_error_when_local_id_is_zero() {
        let result = Channel::builder()
            .name("Porch")
            .role(ChannelRole::Light)
            .local_id(0)
            .build(&device());
        assert!(matches!(
            result,
            Err(ConfigurationError::InvalidLocalId { .. })
        ));
    }

    #[test]
    fn should_reject_binary_sensor_on_relay() {
        let result = Channel::builder()
            .name("Door")
            .role(ChannelRole::BinarySensor)
            .kind(ChannelKind::Output)
            .local_id(1)
            .build(&device());
        assert!(matches!(
            result,
            Err(ConfigurationError::IncompatibleRole { .. })
        ));
    }

    #[test]
    fn should_parse_controller_type_names() {
        assert_eq!("relay".parse::<ChannelKind>(), Ok(ChannelKind::Output));
        assert_eq!("digitalin".parse::<ChannelKind>(), Ok(ChannelKind::Input));
        assert!("analogin".parse::<ChannelKind>().is_err());
    }

    #[test]
    fn should_parse_component_names() {
        assert_eq!(
            "binary_sensor".parse::<ChannelRole>(),
            Ok(ChannelRole::BinarySensor)
        );
        assert_eq!(
            "sensor".parse::<ChannelRole>(),
            Err(ConfigurationError::UnsupportedComponent("sensor".to_string()))
        );
    }

    #[test]
    fn should_accept_first_update_on_fresh_state() {
        let mut state = ChannelState::default();
        let outcome = state.apply(&update(true, 10, UpdateSource::Poll));
        assert_eq!(outcome, ApplyOutcome::Changed { from: false, to: true });
        assert_eq!(state.revision, 1);
        assert_eq!(state.source, Some(UpdateSource::Poll));
    }

    #[test]
    fn should_bump_revision_without_change_when_state_is_equal() {
        let mut state = ChannelState::default();
        let outcome = state.apply(&update(false, 10, UpdateSource::Poll));
        assert_eq!(outcome, ApplyOutcome::Unchanged);
        assert_eq!(state.revision, 1);
    }

    #[test]
    fn should_discard_older_update() {
        let mut state = ChannelState::default();
        state.apply(&update(true, 20, UpdateSource::Push));
        let outcome = state.apply(&update(false, 10, UpdateSource::Poll));
        assert_eq!(outcome, ApplyOutcome::Stale);
        assert!(state.on);
        assert_eq!(state.revision, 1);
    }

    #[test]
    fn should_discard_identical_update() {
        let mut state = ChannelState::default();
        let u = update(true, 20, UpdateSource::Push);
        state.apply(&u);
        assert_eq!(state.apply(&u), ApplyOutcome::Stale);
        assert_eq!(state.revision, 1);
    }

    #[test]
    fn should_prefer_push_over_poll_on_equal_timestamps() {
        let mut state = ChannelState::default();
        state.apply(&update(false, 20, UpdateSource::Poll));
        let outcome = state.apply(&update(true, 20, UpdateSource::Push));
        assert_eq!(outcome, ApplyOutcome::Changed { from: false, to: true });

        let outcome = state.apply(&update(false, 20, UpdateSource::Poll));
        assert_eq!(outcome, ApplyOutcome::Stale);
        assert!(state.on);
    }

    #[test]
    fn should_serialize_snapshot_flat() {
        let channel = Channel::builder()
            .name("Porch")
            .role(ChannelRole::Light)
            .local_id(2)
            .build(&device())
            .unwrap();
        let snapshot = ChannelSnapshot {
            channel,
            state: ChannelState::default(),
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["entity_id"], "light.porch");
        assert_eq!(json["role"], "light");
        assert_eq!(json["state"]["on"], false);
    }
}
