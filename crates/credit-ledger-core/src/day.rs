//! UTC calendar day windows used by the daily grant.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

/// The `[start, end]` bounds of one UTC calendar day.
///
/// `end` is the last millisecond of the day (23:59:59.999), which is also the
/// expiry of a daily grant issued that day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    /// The calendar date.
    pub date: NaiveDate,
    /// Midnight UTC.
    pub start: DateTime<Utc>,
    /// 23:59:59.999 UTC.
    pub end: DateTime<Utc>,
}

impl DayWindow {
    /// The UTC day containing `instant`.
    #[must_use]
    pub fn containing(instant: DateTime<Utc>) -> Self {
        let date = instant.date_naive();
        let start = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
        let end = start + Duration::days(1) - Duration::milliseconds(1);
        Self { date, start, end }
    }

    /// Check if `instant` falls inside this day.
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }

    /// The `YYYY-MM-DD` key used for per-day uniqueness.
    #[must_use]
    pub fn key(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn window_spans_the_utc_day() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 9, 17, 45, 12).unwrap();
        let day = DayWindow::containing(instant);

        assert_eq!(day.start, Utc.with_ymd_and_hms(2024, 3, 9, 0, 0, 0).unwrap());
        assert_eq!(day.end.hour(), 23);
        assert_eq!(day.end.minute(), 59);
        assert_eq!(day.end.second(), 59);
        assert_eq!(day.end.timestamp_subsec_millis(), 999);
        assert_eq!(day.key(), "2024-03-09");
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let day = DayWindow::containing(Utc.with_ymd_and_hms(2024, 12, 31, 8, 0, 0).unwrap());
        assert!(day.contains(day.start));
        assert!(day.contains(day.end));
        assert!(!day.contains(day.end + Duration::milliseconds(1)));
        assert!(!day.contains(day.start - Duration::milliseconds(1)));
    }

    #[test]
    fn midnight_starts_a_new_day() {
        let midnight = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(DayWindow::containing(midnight).key(), "2025-01-01");
        assert_eq!(
            DayWindow::containing(midnight - Duration::milliseconds(1)).key(),
            "2024-12-31"
        );
    }
}
