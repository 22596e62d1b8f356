//! Injectable time source.
//!
//! Cache expiry, day rollover and rate-limit windows all read the wall clock
//! through the [`Clock`] trait so that tests can drive expiry deterministically
//! instead of sleeping.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::sync::Mutex;

/// Wall-clock abstraction.
///
/// Implementations must be cheap: the clock is read inside short mutex-held
/// critical sections.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Current accounting day (UTC calendar date).
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for tests.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Start at midnight of an arbitrary fixed date.
    pub fn fixed() -> Self {
        let start = NaiveDate::from_ymd_opt(2024, 7, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            .and_utc();
        Self::new(start)
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
