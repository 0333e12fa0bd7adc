//! Injectable time source for the aggregation cycle.
//!
//! Every timestamp in the core (sample stamps, `last_updated`, calendar
//! bucketing) flows through a [`Clock`] so tests can run without real
//! wall-clock waits.

use std::sync::Mutex;

use chrono::{DateTime, Duration, TimeZone, Utc};

/// A source of the current UTC time.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time via `Utc::now()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// # Examples
///
/// ```
/// use homewatt::clock::{Clock, ManualClock};
/// use chrono::Duration;
///
/// let clock = ManualClock::starting_at_ymd_hms(2025, 7, 1, 8, 0, 0);
/// let before = clock.now();
/// clock.advance(Duration::seconds(5));
/// assert_eq!(clock.now() - before, Duration::seconds(5));
/// ```
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Creates a clock frozen at the given UTC calendar instant.
    ///
    /// # Panics
    ///
    /// Panics if the components do not form a valid UTC datetime.
    pub fn starting_at_ymd_hms(year: i32, month: u32, day: u32, h: u32, m: u32, s: u32) -> Self {
        let start = Utc
            .with_ymd_and_hms(year, month, day, h, m, s)
            .single()
            .unwrap_or_else(|| panic!("invalid datetime {year}-{month:02}-{day:02} {h}:{m}:{s}"));
        Self::starting_at(start)
    }

    /// Moves the clock forward by `step`.
    pub fn advance(&self, step: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += step;
    }

    /// Jumps the clock to an absolute instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = instant;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
