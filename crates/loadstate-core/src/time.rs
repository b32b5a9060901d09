//! Time primitives for loading trees
//!
//! A loading tree keeps its own timeline. Every timing decision (debounce,
//! minimum loading time) is measured on that timeline, which only moves when
//! the owner advances it. Real-time drivers map wall time onto it.

use std::ops::{Add, Sub};
use std::time::Duration;

/// Position on a tree timeline
/// Represented as microseconds since the timeline epoch
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);
    pub const MAX: Timestamp = Timestamp(u64::MAX);

    #[inline]
    pub fn from_micros(micros: u64) -> Self {
        Timestamp(micros)
    }

    #[inline]
    pub fn from_millis(millis: u64) -> Self {
        Timestamp(millis.saturating_mul(1000))
    }

    #[inline]
    pub fn from_duration(since_epoch: Duration) -> Self {
        Timestamp(u64::try_from(since_epoch.as_micros()).unwrap_or(u64::MAX))
    }

    #[inline]
    pub fn as_micros(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn as_millis(self) -> u64 {
        self.0 / 1000
    }

    /// Offset from the timeline epoch
    #[inline]
    pub fn as_duration(self) -> Duration {
        Duration::from_micros(self.0)
    }

    #[inline]
    pub fn saturating_add(self, duration: Duration) -> Self {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        Timestamp(self.0.saturating_add(micros))
    }

    /// Time elapsed since `earlier`, zero if `earlier` is in the future
    #[inline]
    pub fn saturating_duration_since(self, earlier: Timestamp) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    #[inline]
    fn add(self, rhs: Duration) -> Self::Output {
        self.saturating_add(rhs)
    }
}

impl Sub<Timestamp> for Timestamp {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: Timestamp) -> Self::Output {
        self.saturating_duration_since(rhs)
    }
}

impl std::fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t({:.3}ms)", self.0 as f64 / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_arithmetic() {
        let t = Timestamp::from_millis(100);
        let later = t + Duration::from_millis(50);

        assert_eq!(later.as_millis(), 150);
        assert_eq!(later - t, Duration::from_millis(50));
        // Subtraction never goes negative
        assert_eq!(t - later, Duration::ZERO);
    }

    #[test]
    fn test_timestamp_saturates() {
        let t = Timestamp::MAX;
        assert_eq!(t + Duration::from_secs(1), Timestamp::MAX);
        assert_eq!(Timestamp::from_duration(Duration::MAX), Timestamp::MAX);
    }

    #[test]
    fn test_timestamp_duration_roundtrip() {
        let d = Duration::from_micros(1_234_567);
        assert_eq!(Timestamp::from_duration(d).as_duration(), d);
    }
}
