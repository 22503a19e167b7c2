//! Clock abstraction supplying "today" in a challenge's reference timezone.

use chrono::{Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use nourish_core::Time;
use std::sync::RwLock;

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Time;

    /// Calendar date at `offset`.
    fn today(&self, offset: FixedOffset) -> NaiveDate {
        self.now().with_timezone(&offset).date_naive()
    }
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Time {
        Utc::now()
    }
}

/// A settable clock for replays and tests.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<Time>,
}

impl FixedClock {
    /// A clock frozen at `now`.
    pub fn new(now: Time) -> Self {
        Self { now: RwLock::new(now) }
    }

    /// A clock frozen at noon UTC on `date`.
    pub fn at_date(date: NaiveDate) -> Self {
        Self::new(noon(date))
    }

    /// Move to noon UTC on `date`.
    pub fn set_date(&self, date: NaiveDate) {
        let mut now = self.now.write().unwrap_or_else(|e| e.into_inner());
        *now = noon(date);
    }

    /// Move forward by whole days.
    pub fn advance_days(&self, days: i64) {
        let mut now = self.now.write().unwrap_or_else(|e| e.into_inner());
        *now += Duration::days(days);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Time {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }
}

fn noon(date: NaiveDate) -> Time {
    date.and_time(NaiveTime::MIN + Duration::hours(12)).and_utc()
}
