//! Time and timestamp helpers.

use std::sync::LazyLock;
use std::time::Instant;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};

/// UTC timestamp used for `observed_at` and change notifications.
///
/// Controllers do not timestamp their responses or push calls, so every
/// timestamp in the system is a local receipt time.
pub type Timestamp = DateTime<Utc>;

static PROCESS_CLOCK: LazyLock<MonotonicClock> = LazyLock::new(MonotonicClock::start);

/// Return the current UTC time as seen by the process clock.
///
/// Readings never go backwards, even when the system clock is stepped.
#[must_use]
pub fn now() -> Timestamp {
    PROCESS_CLOCK.stamp(Instant::now())
}

/// Wall-clock reading pinned to a monotonic instant.
///
/// Stamps are the anchor's wall time plus the monotonic time elapsed since
/// the anchor, so later system clock adjustments do not affect them.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    wall: Timestamp,
    instant: Instant,
}

impl MonotonicClock {
    #[must_use]
    pub fn new(wall: Timestamp, instant: Instant) -> Self {
        Self { wall, instant }
    }

    /// Anchor on the current system time.
    #[must_use]
    pub fn start() -> Self {
        Self::new(Utc::now(), Instant::now())
    }

    /// Timestamp of `instant`. Instants before the anchor map to the anchor.
    #[must_use]
    pub fn stamp(&self, instant: Instant) -> Timestamp {
        TimeDelta::from_std(instant.saturating_duration_since(self.instant))
            .ok()
            .and_then(|elapsed| self.wall.checked_add_signed(elapsed))
            .unwrap_or(self.wall)
    }
}

/// Build a timestamp from milliseconds since the Unix epoch.
///
/// Out-of-range values clamp to the epoch.
#[must_use]
pub fn from_millis(millis: i64) -> Timestamp {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
