//! Update intents and the ordering rule.
//!
//! Every write to a channel starts life as a [`StateUpdate`], produced either
//! by a poll cycle or by a push notification. Updates are ordered by
//! [`OrderingToken`]: first by `observed_at`, then by source, with
//! [`UpdateSource::Push`] ranking above [`UpdateSource::Poll`] so that a
//! device-initiated event wins a timestamp tie.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::ChannelKey;
use crate::time::Timestamp;

/// Path an observation came from.
///
/// Variant order is significant: it is the tie-breaker of [`OrderingToken`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateSource {
    Poll,
    Push,
}

impl fmt::Display for UpdateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Poll => f.write_str("poll"),
            Self::Push => f.write_str("push"),
        }
    }
}

/// Effective ordering of an update. Field order drives the derived `Ord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct OrderingToken {
    pub observed_at: Timestamp,
    pub source: UpdateSource,
}

/// A request to record `on` for `channel`, as observed at `observed_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateUpdate {
    pub channel: ChannelKey,
    pub on: bool,
    pub observed_at: Timestamp,
    pub source: UpdateSource,
}

impl StateUpdate {
    #[must_use]
    pub fn poll(channel: ChannelKey, on: bool, observed_at: Timestamp) -> Self {
        Self {
            channel,
            on,
            observed_at,
            source: UpdateSource::Poll,
        }
    }

    #[must_use]
    pub fn push(channel: ChannelKey, on: bool, observed_at: Timestamp) -> Self {
        Self {
            channel,
            on,
            observed_at,
            source: UpdateSource::Push,
        }
    }

    #[must_use]
    pub fn ordering_token(&self) -> OrderingToken {
        OrderingToken {
            observed_at: self.observed_at,
            source: self.source,
        }
    }
}

/// Result of offering an update to a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Accepted and the boolean flipped.
    Changed { from: bool, to: bool },
    /// Accepted (revision bumped) but the boolean was already `to`.
    Unchanged,
    /// Not newer than the recorded write; discarded.
    Stale,
}

impl ApplyOutcome {
    #[must_use]
    pub fn is_accepted(self) -> bool {
        !matches!(self, Self::Stale)
    }
}

/// One inbound push request targeting a single channel.
///
/// `received_at` is stamped when the request arrives, before any queuing,
/// and becomes the update's `observed_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushSession {
    pub target: ChannelKey,
    pub on: bool,
    pub received_at: Timestamp,
}

impl PushSession {
    #[must_use]
    pub fn into_update(self) -> StateUpdate {
        StateUpdate::push(self.target, self.on, self.received_at)
    }
}

/// Parse the literal `on` / `off` state segment of a push route.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidState`] for anything else.
pub fn parse_switch_state(raw: &str) -> Result<bool, ValidationError> {
    match raw {
        "on" => Ok(true),
        "off" => Ok(false),
        other => Err(ValidationError::InvalidState(other.to_string())),
    }
}

/// Lenient boolean used by the multi-channel push payload: `1`, `on` and
/// `true` mean on, everything else means off.
#[must_use]
pub fn parse_lenient_state(raw: &str) -> bool {
    matches!(raw, "1" | "on" | "true")
}
