//! Wall-clock abstraction for the dosing scheduler.
//!
//! - `WallTime` is a plain seconds-since-epoch value with day/minute helpers,
//!   so window rollover is a pure function and testable without a real clock.
//! - `WallClock::now()` returns `None` while the host has no valid time
//!   (e.g. before the first NTP sync); the scheduler skips those ticks.

/// A wall-clock instant in whole seconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct WallTime {
    secs: u64,
}

impl WallTime {
    pub const SECS_PER_DAY: u64 = 86_400;

    #[inline]
    pub fn from_unix(secs: u64) -> Self {
        Self { secs }
    }

    #[inline]
    pub fn as_unix(self) -> u64 {
        self.secs
    }

    /// Whole days since the epoch; the scheduler's day-ordinal.
    #[inline]
    pub fn day_ordinal(self) -> u64 {
        self.secs / Self::SECS_PER_DAY
    }

    #[inline]
    pub fn second_of_day(self) -> u32 {
        (self.secs % Self::SECS_PER_DAY) as u32
    }

    /// Minute of day in 0..1440.
    #[inline]
    pub fn minute_of_day(self) -> u16 {
        (self.second_of_day() / 60) as u16
    }

    /// Build an instant from a day ordinal and a minute of day.
    #[inline]
    pub fn from_day_minute(day: u64, minute: u16) -> Self {
        Self {
            secs: day * Self::SECS_PER_DAY + u64::from(minute) * 60,
        }
    }

    /// Seconds elapsed since `earlier`, saturating at 0 on clock regression.
    #[inline]
    pub fn saturating_secs_since(self, earlier: WallTime) -> u64 {
        self.secs.saturating_sub(earlier.secs)
    }

    /// Fractional days elapsed since `earlier` (0 on regression).
    #[inline]
    pub fn days_since(self, earlier: WallTime) -> f32 {
        self.saturating_secs_since(earlier) as f32 / Self::SECS_PER_DAY as f32
    }
}

/// Time source providing wall-clock date/time with a validity flag.
pub trait WallClock {
    /// Current wall time, or `None` while the clock is not yet valid.
    fn now(&self) -> Option<WallTime>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_and_minute_decomposition() {
        let t = WallTime::from_day_minute(19_000, 11 * 60 + 45);
        assert_eq!(t.day_ordinal(), 19_000);
        assert_eq!(t.minute_of_day(), 705);
        assert_eq!(t.second_of_day(), 705 * 60);
    }

    #[test]
    fn elapsed_saturates_on_regression() {
        let a = WallTime::from_unix(1_000);
        let b = WallTime::from_unix(500);
        assert_eq!(b.saturating_secs_since(a), 0);
        assert_eq!(a.saturating_secs_since(b), 500);
    }

    #[test]
    fn days_since_is_fractional() {
        let a = WallTime::from_day_minute(100, 0);
        let b = WallTime::from_day_minute(102, 0);
        let d = b.days_since(a);
        assert!((d - 2.0).abs() < 1e-6);
    }
}
