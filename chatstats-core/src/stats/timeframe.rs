//! Calendar-aligned bucket generation.
//!
//! Buckets are calendar units in an explicit timezone, not fixed-length
//! windows: a week list that starts on a Thursday still begins at the Monday
//! on or before it, and a month list begins on the 1st.

use chrono::{
    DateTime, Datelike, Days, Duration, LocalResult, Months, NaiveDate, NaiveTime, TimeZone, Utc,
};
use chrono_tz::Tz;

use crate::error::{Error, Result};
use crate::types::Granularity;

/// One time slot of a timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bucket {
    /// Position in the timeline
    pub index: usize,
    /// Instant the bucket opens (local midnight, as UTC)
    pub start: DateTime<Utc>,
    /// Local calendar date of `start`
    pub date: NaiveDate,
}

/// Generate the bucket list covering `[start, end]`.
///
/// The first bucket opens at or before `start`; the last one has no upper
/// bound. Always returns at least one bucket.
pub fn generate(
    granularity: Granularity,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    tz: Tz,
) -> Result<Vec<Bucket>> {
    if end < start {
        return Err(Error::InvalidRange { start, end });
    }

    let last_date = local_date(end, tz);
    let mut date = align(local_date(start, tz), granularity);
    let mut buckets = Vec::new();

    while date <= last_date {
        buckets.push(Bucket {
            index: buckets.len(),
            start: local_midnight(date, tz),
            date,
        });
        date = match advance(date, granularity) {
            Some(next) => next,
            None => break,
        };
    }

    tracing::trace!(
        granularity = %granularity,
        buckets = buckets.len(),
        first = %buckets[0].date,
        "generated timeline"
    );

    Ok(buckets)
}

/// Start of the calendar unit containing `date`.
pub fn align(date: NaiveDate, granularity: Granularity) -> NaiveDate {
    match granularity {
        Granularity::Day => date,
        Granularity::Week => {
            date - Duration::days(date.weekday().num_days_from_monday() as i64)
        }
        Granularity::Month => date.with_day(1).unwrap_or(date),
    }
}

fn advance(date: NaiveDate, granularity: Granularity) -> Option<NaiveDate> {
    match granularity {
        Granularity::Day => date.checked_add_days(Days::new(1)),
        Granularity::Week => date.checked_add_days(Days::new(7)),
        Granularity::Month => date.checked_add_months(Months::new(1)),
    }
}

/// Local calendar date of an instant.
pub fn local_date(ts: DateTime<Utc>, tz: Tz) -> NaiveDate {
    ts.with_timezone(&tz).date_naive()
}

/// First instant of a local calendar day.
///
/// Ambiguous midnights take the earliest instant. When a DST jump skips
/// midnight the day starts at the first valid local hour.
pub fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&midnight) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => (1..=3)
            .filter_map(|hour| date.and_hms_opt(hour, 0, 0))
            .find_map(|local| tz.from_local_datetime(&local).earliest())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| midnight.and_utc()),
    }
}

/// Last instant of a local calendar day.
pub fn end_of_day(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    match date.checked_add_days(Days::new(1)) {
        Some(next) => local_midnight(next, tz) - Duration::nanoseconds(1),
        None => DateTime::<Utc>::MAX_UTC,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_month_buckets_start_on_first() {
        let buckets = generate(
            Granularity::Month,
            utc(2021, 1, 15, 8),
            utc(2021, 3, 2, 0),
            chrono_tz::UTC,
        )
        .unwrap();

        let dates: Vec<_> = buckets.iter().map(|b| b.date).collect();
        assert_eq!(dates, vec![ymd(2021, 1, 1), ymd(2021, 2, 1), ymd(2021, 3, 1)]);
        assert_eq!(buckets[0].start, utc(2021, 1, 1, 0));
        assert!(buckets.iter().all(|b| b.date.day() == 1));
    }

    #[test]
    fn test_week_buckets_start_on_monday() {
        // 2021-01-07 is a Thursday
        let buckets = generate(
            Granularity::Week,
            utc(2021, 1, 7, 12),
            utc(2021, 1, 20, 0),
            chrono_tz::UTC,
        )
        .unwrap();

        assert_eq!(buckets[0].date, ymd(2021, 1, 4));
        assert_eq!(buckets.len(), 3);
        assert!(buckets.iter().all(|b| b.date.weekday() == Weekday::Mon));
    }

    #[test]
    fn test_day_buckets_are_strictly_increasing() {
        let buckets = generate(
            Granularity::Day,
            utc(2021, 2, 27, 5),
            utc(2021, 3, 2, 23),
            chrono_tz::UTC,
        )
        .unwrap();

        assert_eq!(buckets.len(), 4);
        for (i, pair) in buckets.windows(2).enumerate() {
            assert!(pair[0].start < pair[1].start);
            assert_eq!(pair[0].index, i);
        }
    }

    #[test]
    fn test_degenerate_range_has_one_bucket() {
        let ts = utc(2021, 6, 9, 14);
        for granularity in Granularity::ALL {
            let buckets = generate(granularity, ts, ts, chrono_tz::UTC).unwrap();
            assert_eq!(buckets.len(), 1);
            assert!(buckets[0].start <= ts);
        }
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let result = generate(
            Granularity::Day,
            utc(2021, 1, 2, 0),
            utc(2021, 1, 1, 0),
            chrono_tz::UTC,
        );
        assert!(matches!(result, Err(Error::InvalidRange { .. })));
    }

    #[test]
    fn test_buckets_follow_local_midnight() {
        // 23:30 UTC on Jan 31 is already Feb 1 in Madrid
        let buckets = generate(
            Granularity::Month,
            utc(2021, 1, 31, 23) + Duration::minutes(30),
            utc(2021, 2, 10, 0),
            chrono_tz::Europe::Madrid,
        )
        .unwrap();

        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].date, ymd(2021, 2, 1));
        assert_eq!(buckets[0].start, utc(2021, 1, 31, 23));
    }

    #[test]
    fn test_day_buckets_across_dst_change() {
        let buckets = generate(
            Granularity::Day,
            utc(2021, 3, 27, 12),
            utc(2021, 3, 29, 12),
            chrono_tz::Europe::Madrid,
        )
        .unwrap();

        // Midnight is 23:00 UTC before the switch and 22:00 UTC after it
        assert_eq!(buckets[0].start, utc(2021, 3, 26, 23));
        assert_eq!(buckets[1].start, utc(2021, 3, 27, 23));
        assert_eq!(buckets[2].start, utc(2021, 3, 28, 22));
    }

    #[test]
    fn test_skipped_midnight_uses_first_valid_hour() {
        // Brazil moved clocks from 00:00 to 01:00 on 2018-11-04
        let start = local_midnight(ymd(2018, 11, 4), chrono_tz::America::Sao_Paulo);
        assert_eq!(start, utc(2018, 11, 4, 3));
    }

    #[test]
    fn test_ambiguous_midnight_uses_earliest_instant() {
        // Havana fell back from 01:00 CDT to 00:00 CST on 2012-11-04,
        // so local midnight happened twice
        let start = local_midnight(ymd(2012, 11, 4), chrono_tz::America::Havana);
        assert_eq!(start, utc(2012, 11, 4, 4));
    }

    #[test]
    fn test_end_of_day_is_inclusive_upper_bound() {
        let end = end_of_day(ymd(2021, 1, 31), chrono_tz::UTC);
        assert_eq!(end, utc(2021, 2, 1, 0) - Duration::nanoseconds(1));
        assert_eq!(local_date(end, chrono_tz::UTC), ymd(2021, 1, 31));
    }
}
