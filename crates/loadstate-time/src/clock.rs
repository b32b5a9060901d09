//! Clock implementations for loading trees

use std::time::{Duration, Instant};

use loadstate_core::Timestamp;

/// Timeline clock - monotonic, advanced explicitly
/// INVARIANT: the clock never moves backwards
#[derive(Clone, Debug, Default)]
pub struct TimelineClock {
    value: Timestamp,
}

impl TimelineClock {
    /// Create a new clock at the timeline epoch
    pub fn new() -> Self {
        TimelineClock {
            value: Timestamp::ZERO,
        }
    }

    /// Current timeline position
    pub fn now(&self) -> Timestamp {
        self.value
    }

    /// Advance by a duration
    /// Returns the new position
    pub fn advance(&mut self, dt: Duration) -> Timestamp {
        self.value = self.value.saturating_add(dt);
        self.value
    }

    /// Move to `target` if it lies ahead; earlier targets are ignored
    pub fn advance_to(&mut self, target: Timestamp) -> Timestamp {
        if target > self.value {
            self.value = target;
        }
        self.value
    }
}

/// Wall clock - projects OS instants onto a timeline
#[derive(Clone, Copy, Debug)]
pub struct WallClock {
    epoch: Instant,
}

impl WallClock {
    /// Timeline epoch is "now"
    pub fn new() -> Self {
        Self::with_epoch(Instant::now())
    }

    pub fn with_epoch(epoch: Instant) -> Self {
        WallClock { epoch }
    }

    pub fn epoch(&self) -> Instant {
        self.epoch
    }

    /// Timeline position of `instant` (epoch if it predates the epoch)
    pub fn timestamp_at(&self, instant: Instant) -> Timestamp {
        Timestamp::from_duration(instant.saturating_duration_since(self.epoch))
    }

    /// Instant at which the timeline reaches `t`
    pub fn instant_at(&self, t: Timestamp) -> Instant {
        self.epoch + t.as_duration()
    }

    pub fn now(&self) -> Timestamp {
        self.timestamp_at(Instant::now())
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeline_advance() {
        let mut clock = TimelineClock::new();
        assert_eq!(clock.now(), Timestamp::ZERO);

        clock.advance(Duration::from_millis(100));
        assert_eq!(clock.now(), Timestamp::from_millis(100));
    }

    #[test]
    fn test_timeline_never_rewinds() {
        let mut clock = TimelineClock::new();
        clock.advance_to(Timestamp::from_millis(500));
        clock.advance_to(Timestamp::from_millis(200));

        assert_eq!(clock.now(), Timestamp::from_millis(500));
    }

    #[test]
    fn test_wall_clock_projection() {
        let epoch = Instant::now();
        let wall = WallClock::with_epoch(epoch);

        let later = epoch + Duration::from_millis(250);
        let t = wall.timestamp_at(later);
        assert_eq!(t, Timestamp::from_millis(250));
        assert_eq!(wall.instant_at(t), later);
    }

    #[test]
    fn test_wall_clock_before_epoch_is_zero() {
        let epoch = Instant::now() + Duration::from_secs(10);
        let wall = WallClock::with_epoch(epoch);
        assert_eq!(wall.now(), Timestamp::ZERO);
    }
}
