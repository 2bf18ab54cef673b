//! Calendar bucketing.

use std::fmt;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use orgpulse_core::Granularity;
use serde::Serialize;

/// Floor `date` to the start of its containing window.
///
/// - week: the most recent `week_start` on or before `date`
/// - month: the first of the month
/// - quarter: Jan 1, Apr 1, Jul 1 or Oct 1
/// - half-year: Jan 1 or Jul 1
/// - year: Jan 1
///
/// # Examples
///
/// ```
/// use chrono::{NaiveDate, Weekday};
/// use orgpulse_core::Granularity;
/// use orgpulse_activity::bucket::floor_date;
///
/// let date = NaiveDate::from_ymd_opt(2018, 2, 26).unwrap();
/// let start = floor_date(date, Granularity::Month, Weekday::Mon);
/// assert_eq!(start, NaiveDate::from_ymd_opt(2018, 2, 1).unwrap());
/// ```
pub fn floor_date(date: NaiveDate, granularity: Granularity, week_start: Weekday) -> NaiveDate {
    match granularity {
        Granularity::Week => {
            let back = (7 + date.weekday().num_days_from_monday()
                - week_start.num_days_from_monday())
                % 7;
            date - Duration::days(i64::from(back))
        }
        Granularity::Month => first_of(date.year(), date.month()).unwrap_or(date),
        Granularity::Quarter => {
            first_of(date.year(), (date.month() - 1) / 3 * 3 + 1).unwrap_or(date)
        }
        Granularity::HalfYear => {
            first_of(date.year(), (date.month() - 1) / 6 * 6 + 1).unwrap_or(date)
        }
        Granularity::Year => first_of(date.year(), 1).unwrap_or(date),
    }
}

fn first_of(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// A calendar window identified by its granularity and start date.
///
/// # Examples
///
/// ```
/// use chrono::{NaiveDate, Weekday};
/// use orgpulse_core::Granularity;
/// use orgpulse_activity::bucket::TimeBucket;
///
/// let date = NaiveDate::from_ymd_opt(2021, 8, 15).unwrap();
/// let bucket = TimeBucket::containing(date, Granularity::Quarter, Weekday::Mon);
/// assert_eq!(bucket.to_string(), "2021-07-01 (quarter)");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeBucket {
    /// First day of the window.
    pub start: NaiveDate,
    /// Width of the window.
    pub granularity: Granularity,
}

impl TimeBucket {
    /// The bucket of `granularity` that contains `date`.
    pub fn containing(date: NaiveDate, granularity: Granularity, week_start: Weekday) -> Self {
        Self {
            start: floor_date(date, granularity, week_start),
            granularity,
        }
    }
}

impl fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.start, self.granularity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_floor() {
        assert_eq!(
            floor_date(day(2018, 2, 26), Granularity::Month, Weekday::Mon),
            day(2018, 2, 1)
        );
        assert_eq!(
            floor_date(day(2018, 2, 1), Granularity::Month, Weekday::Mon),
            day(2018, 2, 1)
        );
    }

    #[test]
    fn week_floor_respects_week_start() {
        // 2018-02-26 is a Monday.
        assert_eq!(
            floor_date(day(2018, 2, 26), Granularity::Week, Weekday::Mon),
            day(2018, 2, 26)
        );
        assert_eq!(
            floor_date(day(2018, 2, 26), Granularity::Week, Weekday::Sun),
            day(2018, 2, 25)
        );
        assert_eq!(
            floor_date(day(2018, 3, 4), Granularity::Week, Weekday::Mon),
            day(2018, 2, 26)
        );
        assert_eq!(
            floor_date(day(2018, 2, 27), Granularity::Week, Weekday::Wed),
            day(2018, 2, 21)
        );
    }

    #[test]
    fn quarter_and_half_year_floors() {
        let cases = [
            (day(2020, 1, 31), day(2020, 1, 1), day(2020, 1, 1)),
            (day(2020, 3, 31), day(2020, 1, 1), day(2020, 1, 1)),
            (day(2020, 4, 1), day(2020, 4, 1), day(2020, 1, 1)),
            (day(2020, 6, 30), day(2020, 4, 1), day(2020, 1, 1)),
            (day(2020, 7, 1), day(2020, 7, 1), day(2020, 7, 1)),
            (day(2020, 9, 30), day(2020, 7, 1), day(2020, 7, 1)),
            (day(2020, 12, 31), day(2020, 10, 1), day(2020, 7, 1)),
        ];
        for (date, quarter, half) in cases {
            assert_eq!(floor_date(date, Granularity::Quarter, Weekday::Mon), quarter, "{date}");
            assert_eq!(floor_date(date, Granularity::HalfYear, Weekday::Mon), half, "{date}");
        }
    }

    #[test]
    fn year_floor() {
        assert_eq!(
            floor_date(day(1999, 12, 31), Granularity::Year, Weekday::Mon),
            day(1999, 1, 1)
        );
    }

    #[test]
    fn floor_is_idempotent_and_not_after_date() {
        let date = day(2016, 2, 29);
        for g in [
            Granularity::Week,
            Granularity::Month,
            Granularity::Quarter,
            Granularity::HalfYear,
            Granularity::Year,
        ] {
            let start = floor_date(date, g, Weekday::Thu);
            assert!(start <= date);
            assert_eq!(floor_date(start, g, Weekday::Thu), start);
        }
    }

    #[test]
    fn buckets_order_by_start() {
        let a = TimeBucket::containing(day(2020, 1, 5), Granularity::Month, Weekday::Mon);
        let b = TimeBucket::containing(day(2020, 2, 5), Granularity::Month, Weekday::Mon);
        assert!(a < b);
        assert_eq!(
            a,
            TimeBucket::containing(day(2020, 1, 31), Granularity::Month, Weekday::Mon)
        );
    }
}
