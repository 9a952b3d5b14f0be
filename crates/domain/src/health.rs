//! Device health: an observability signal, never a channel state.

use serde::{Deserialize, Serialize};

/// Consecutive failed poll cycles after which a device is reported degraded.
pub const DEGRADED_AFTER_FAILURES: u32 = 3;

/// Health of one controller as seen by its poll loop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeviceHealth {
    #[default]
    Healthy,
    /// Polling keeps failing with transient errors.
    Degraded { consecutive_failures: u32 },
    /// Polling stopped because the controller rejected the credentials.
    Suspended { reason: String },
}

impl DeviceHealth {
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    #[must_use]
    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::Suspended { .. })
    }
}

/// Folds poll-cycle outcomes into a [`DeviceHealth`].
#[derive(Debug, Clone, Default)]
pub struct HealthTracker {
    consecutive_failures: u32,
    suspended: Option<String>,
}

impl HealthTracker {
    /// Record a successful cycle. Clears degradation, not suspension.
    pub fn record_success(&mut self) -> DeviceHealth {
        self.consecutive_failures = 0;
        self.health()
    }

    /// Record a cycle that failed with a transient error.
    pub fn record_failure(&mut self) -> DeviceHealth {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.health()
    }

    /// Record a credential rejection; the device stays suspended from now on.
    pub fn record_auth_failure(&mut self, reason: impl Into<String>) -> DeviceHealth {
        self.suspended = Some(reason.into());
        self.health()
    }

    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    #[must_use]
    pub fn health(&self) -> DeviceHealth {
        if let Some(reason) = &self.suspended {
            return DeviceHealth::Suspended {
                reason: reason.clone(),
            };
        }
        if self.consecutive_failures >= DEGRADED_AFTER_FAILURES {
            DeviceHealth::Degraded {
                consecutive_failures: self.consecutive_failures,
            }
        } else {
            DeviceHealth::Healthy
        }
    }
}
