//! Time sources for rotation buckets and entry expiry.

use chrono::{DateTime, FixedOffset, Local};
use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Supplies wall-clock time (for rotation buckets) and monotonic time (for TTLs).
pub trait Clock: Send + Sync {
    /// Current wall-clock time in the zone rotation buckets are cut in.
    fn now(&self) -> DateTime<FixedOffset>;

    /// Current monotonic instant.
    fn monotonic(&self) -> Instant;
}

/// The real clock: local time zone and `Instant::now()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }

    fn monotonic(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
///
/// # Examples
///
/// ```rust
/// use chrono::{FixedOffset, TimeZone};
/// use hotswap_runtime::pool::{Clock, ManualClock};
/// use std::time::Duration;
///
/// let start = FixedOffset::east_opt(0).unwrap()
///     .with_ymd_and_hms(2024, 1, 2, 23, 30, 0)
///     .unwrap();
/// let clock = ManualClock::new(start);
/// clock.advance(Duration::from_secs(3600));
/// assert_eq!(clock.now().format("%Y%m%d").to_string(), "20240103");
/// ```
#[derive(Debug)]
pub struct ManualClock {
    state: Mutex<ManualState>,
}

#[derive(Debug)]
struct ManualState {
    wall: DateTime<FixedOffset>,
    monotonic: Instant,
}

impl ManualClock {
    /// Start the clock at `wall`.
    pub fn new(wall: DateTime<FixedOffset>) -> Self {
        Self {
            state: Mutex::new(ManualState {
                wall,
                monotonic: Instant::now(),
            }),
        }
    }

    /// Move both wall and monotonic time forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut state = self.state.lock();
        state.wall += chrono::Duration::from_std(by).unwrap_or(chrono::Duration::zero());
        state.monotonic += by;
    }

    /// Jump the wall clock to `wall` without moving monotonic time.
    pub fn set_wall(&self, wall: DateTime<FixedOffset>) {
        self.state.lock().wall = wall;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.state.lock().wall
    }

    fn monotonic(&self) -> Instant {
        self.state.lock().monotonic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manual_clock_advances_both_readings() {
        let start = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 2, 0, 0, 0)
            .unwrap();
        let clock = ManualClock::new(start);
        let before = clock.monotonic();

        clock.advance(Duration::from_secs(90));

        assert_eq!(clock.monotonic() - before, Duration::from_secs(90));
        assert_eq!(clock.now() - start, chrono::Duration::seconds(90));
    }

    #[test]
    fn test_set_wall_keeps_monotonic() {
        let start = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 2, 0, 0, 0)
            .unwrap();
        let clock = ManualClock::new(start);
        let before = clock.monotonic();

        clock.set_wall(start + chrono::Duration::days(1));

        assert_eq!(clock.monotonic(), before);
        assert_eq!(clock.now().format("%d").to_string(), "03");
    }
}
