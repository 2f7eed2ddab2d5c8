//! Timestamp type used throughout the protocol.
//!
//! Timestamps are Unix epoch nanoseconds (UTC). Sub-blocks of a single
//! generation session are spaced by fractions of a second, so seconds are too coarse.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A Unix timestamp in nanoseconds since epoch (UTC).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The epoch (time zero).
    pub const EPOCH: Self = Self(0);

    pub fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Get the current system time as a `Timestamp`.
    ///
    /// A clock set before the epoch reads as the epoch.
    pub fn now() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Self(nanos)
    }

    pub fn as_nanos(&self) -> u64 {
        self.0
    }

    pub fn saturating_add(self, d: Duration) -> Self {
        Self(self.0.saturating_add(d.as_nanos() as u64))
    }

    /// Absolute distance between two timestamps.
    pub fn abs_diff(&self, other: Timestamp) -> Duration {
        Duration::from_nanos(self.0.abs_diff(other.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

/// Source of the current time. Nodes take the clock as a dependency so tests
/// can drive time by hand.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// The wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abs_diff_is_symmetric() {
        let a = Timestamp::from_nanos(1_000);
        let b = Timestamp::from_nanos(4_000);
        assert_eq!(a.abs_diff(b), Duration::from_nanos(3_000));
        assert_eq!(b.abs_diff(a), Duration::from_nanos(3_000));
    }

    #[test]
    fn saturating_add_advances() {
        let t = Timestamp::from_nanos(10).saturating_add(Duration::from_millis(1));
        assert_eq!(t.as_nanos(), 1_000_010);
    }
}
