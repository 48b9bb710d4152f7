//! Time source for relative date defaults ("last 30 days", "today").

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Days, Local, NaiveDate, NaiveTime, TimeZone, Utc};

/// Wall clock as seen by the user.
///
/// Date ranges are expressed as local calendar days, so the clock answers in
/// local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;

    /// Local calendar date.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Settable clock for tests.
#[derive(Debug, Clone)]
pub struct MockClock {
    instant: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self {
            instant: Arc::new(Mutex::new(instant)),
        }
    }

    /// Clock reading local noon on `date`, so `today()` is `date` in any
    /// timezone.
    pub fn on_date(date: NaiveDate) -> Self {
        let noon = date.and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN));
        let instant = Local
            .from_local_datetime(&noon)
            .earliest()
            .map_or_else(|| Utc.from_utc_datetime(&noon), |t| t.with_timezone(&Utc));
        Self::new(instant)
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.instant.lock().unwrap_or_else(PoisonError::into_inner) = instant;
    }

    /// Move forward by whole days.
    pub fn advance_days(&self, days: u64) {
        let mut instant = self.instant.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(next) = instant.checked_add_days(Days::new(days)) {
            *instant = next;
        }
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Local> {
        self.instant
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .with_timezone(&Local)
    }
}
