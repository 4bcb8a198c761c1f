use std::fmt::{Debug, Formatter};

use chrono::{DateTime, Days, NaiveTime, TimeDelta, Timelike, Utc};
use chrono_tz::Tz;

use crate::core::settings::Settings;

/// Retrieval window of a request, always aligned to UTC midnights.
#[derive(Copy, Clone, Eq, PartialEq)]
#[must_use]
pub struct Window {
    /// Inclusive.
    pub start: DateTime<Utc>,

    /// Exclusive.
    pub end: DateTime<Utc>,
}

impl Debug for Window {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}..{:?}", self.start, self.end)
    }
}

impl Window {
    pub const fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn duration(self) -> TimeDelta {
        self.end - self.start
    }

    #[must_use]
    pub fn contains(self, time: DateTime<Utc>) -> bool {
        (self.start <= time) && (time < self.end)
    }
}

#[must_use]
#[derive(Copy, Clone, Debug)]
pub struct WindowCalculator {
    timezone: Tz,
    cutoff_hour: u32,
}

impl WindowCalculator {
    pub const fn new(settings: &Settings) -> Self {
        Self { timezone: settings.timezone, cutoff_hour: settings.cutoff_hour }
    }

    /// Two days back and two days ahead of the current UTC midnight.
    ///
    /// With the day-ahead cutoff rule active, the window ends one day ahead
    /// until the local cutoff hour has been reached.
    pub fn compute_window(self, now: DateTime<Utc>, day_ahead_cutoff: bool) -> Window {
        let midnight = now.date_naive().and_time(NaiveTime::MIN).and_utc();
        let days_ahead = if day_ahead_cutoff && self.is_before_cutoff(now) { 1 } else { 2 };
        Window::new(midnight - Days::new(2), midnight + Days::new(days_ahead))
    }

    fn is_before_cutoff(self, now: DateTime<Utc>) -> bool {
        now.with_timezone(&self.timezone).hour() < self.cutoff_hour
    }
}
