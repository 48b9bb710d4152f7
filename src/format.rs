//! Date and value formatting for display surfaces.

use chrono::{Days, NaiveDate, NaiveDateTime};

use crate::traits::Clock;

/// `Jan 15, 2025`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}

/// `Jan 15, 2025 10:05`
pub fn format_date_time(dt: NaiveDateTime) -> String {
    dt.format("%b %-d, %Y %H:%M").to_string()
}

/// `Jan 15`
pub fn format_short_date(date: NaiveDate) -> String {
    date.format("%b %-d").to_string()
}

/// Local calendar date `n` days before now.
pub fn days_ago(clock: &dyn Clock, n: u64) -> NaiveDate {
    let today = clock.today();
    today.checked_sub_days(Days::new(n)).unwrap_or(today)
}

/// Fixed-decimal rendering for sensor values; `--` when missing.
pub fn format_value(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{v:.decimals$}"),
        None => "--".to_string(),
    }
}
