//! Per-bucket metric calculators built on [`BucketSweep`].
//!
//! - [`raw_counts`]: events per bucket
//! - [`new_entity_counts`]: first occurrences per bucket plus running total
//! - [`ratio`]: bucket-wise ratio of two cumulative series

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

use super::sweep::BucketSweep;
use super::timeframe::Bucket;
use crate::error::{Error, Result};
use crate::types::{CountEntry, CumulativeEntry, Event, RatioEntry};

/// Earliest timestamp per entity over the full, unfiltered history.
pub type FirstSeen = HashMap<String, DateTime<Utc>>;

/// Build the first-seen index. Input order does not matter.
pub fn first_seen<'e>(history: impl IntoIterator<Item = &'e Event>) -> FirstSeen {
    let mut index = FirstSeen::new();
    for event in history {
        index
            .entry(event.entity_id.clone())
            .and_modify(|ts| *ts = (*ts).min(event.created_at))
            .or_insert(event.created_at);
    }
    index
}

/// Which events count as "new".
#[derive(Debug, Clone, Copy)]
pub enum NewEntityPolicy<'a> {
    /// Only an entity's first-ever event, once per entity
    FirstSeen(&'a FirstSeen),
    /// Every event is new
    EveryRecord,
}

/// Count events per bucket.
///
/// `events` must be sorted ascending. The counts always add up to the number
/// of events.
pub fn raw_counts<'e>(
    events: impl IntoIterator<Item = &'e Event>,
    buckets: &[Bucket],
) -> Vec<CountEntry> {
    let mut counts = vec![0u64; buckets.len()];
    let mut sweep = BucketSweep::new(buckets);
    for event in events {
        counts[sweep.advance(event.created_at)] += 1;
    }

    buckets
        .iter()
        .zip(counts)
        .map(|(bucket, count)| CountEntry {
            date: bucket.date,
            count,
        })
        .collect()
}

/// Count new entities per bucket with a running total.
///
/// `events` must be sorted ascending and already restricted to the query
/// window. With [`NewEntityPolicy::FirstSeen`] an entity whose first event
/// predates the window is never new, even if it shows up inside it.
pub fn new_entity_counts<'e>(
    events: impl IntoIterator<Item = &'e Event>,
    buckets: &[Bucket],
    policy: NewEntityPolicy<'_>,
) -> Vec<CumulativeEntry> {
    let mut new = vec![0u64; buckets.len()];
    let mut counted: HashSet<&str> = HashSet::new();
    let mut sweep = BucketSweep::new(buckets);

    for event in events {
        let index = sweep.advance(event.created_at);
        let is_new = match policy {
            NewEntityPolicy::FirstSeen(first_seen) => {
                first_seen.get(&event.entity_id) == Some(&event.created_at)
                    && counted.insert(event.entity_id.as_str())
            }
            NewEntityPolicy::EveryRecord => true,
        };
        if is_new {
            new[index] += 1;
        }
    }

    let mut total = 0u64;
    buckets
        .iter()
        .zip(new)
        .map(|(bucket, new)| {
            total += new;
            CumulativeEntry {
                date: bucket.date,
                new,
                total,
            }
        })
        .collect()
}

/// Bucket-wise ratio of two cumulative series.
///
/// Fails if the series do not share the same ordered dates.
pub fn ratio(
    numerator: &[CumulativeEntry],
    denominator: &[CumulativeEntry],
) -> Result<Vec<RatioEntry>> {
    let aligned = numerator.len() == denominator.len()
        && numerator
            .iter()
            .zip(denominator)
            .all(|(n, d)| n.date == d.date);
    if !aligned {
        return Err(Error::MisalignedSeries {
            numerator: numerator.iter().map(|e| e.date).collect(),
            denominator: denominator.iter().map(|e| e.date).collect(),
        });
    }

    Ok(numerator
        .iter()
        .zip(denominator)
        .map(|(n, d)| RatioEntry {
            date: n.date,
            new: round_ratio(n.new, d.new),
            total: round_ratio(n.total, d.total),
        })
        .collect())
}

/// `numerator / denominator` rounded half-up to two decimals.
///
/// A zero denominator yields 0.
pub fn round_ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    let value = numerator as f64 / denominator as f64;
    ((value + f64::EPSILON) * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::timeframe::generate;
    use crate::types::Granularity;
    use chrono::{NaiveDate, TimeZone};

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn month_buckets(from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<Bucket> {
        generate(Granularity::Month, from, to, chrono_tz::UTC).unwrap()
    }

    #[test]
    fn test_raw_counts_by_month() {
        let events = vec![
            Event::new("a", utc(2021, 1, 1)),
            Event::new("b", utc(2021, 1, 2)),
            Event::new("a", utc(2021, 2, 5)),
        ];
        let buckets = month_buckets(utc(2021, 1, 1), utc(2021, 2, 28));

        let counts = raw_counts(&events, &buckets);

        assert_eq!(
            counts,
            vec![
                CountEntry {
                    date: ymd(2021, 1, 1),
                    count: 2
                },
                CountEntry {
                    date: ymd(2021, 2, 1),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn test_raw_counts_sum_to_event_count() {
        let events: Vec<Event> = (0..50)
            .map(|i| {
                Event::new(
                    format!("u{}", i % 7),
                    utc(2021, 1, 1) + chrono::Duration::hours(i * 37),
                )
            })
            .collect();
        let buckets = generate(
            Granularity::Week,
            events[0].created_at,
            events[49].created_at,
            chrono_tz::UTC,
        )
        .unwrap();

        let counts = raw_counts(&events, &buckets);

        assert_eq!(counts.iter().map(|c| c.count).sum::<u64>(), 50);
        assert_eq!(counts.len(), buckets.len());
    }

    #[test]
    fn test_new_entities_ignore_history_before_window() {
        let history = vec![
            Event::new("a", utc(2020, 12, 31)),
            Event::new("a", utc(2021, 1, 5)),
            Event::new("b", utc(2021, 1, 10)),
        ];
        let seen = first_seen(&history);
        let buckets = month_buckets(utc(2021, 1, 1), utc(2021, 1, 31));

        let series = new_entity_counts(&history[1..], &buckets, NewEntityPolicy::FirstSeen(&seen));

        assert_eq!(
            series,
            vec![CumulativeEntry {
                date: ymd(2021, 1, 1),
                new: 1,
                total: 1
            }]
        );
    }

    #[test]
    fn test_new_entities_count_once_and_accumulate() {
        let history = vec![
            Event::new("a", utc(2021, 1, 3)),
            Event::new("a", utc(2021, 1, 3)),
            Event::new("b", utc(2021, 1, 20)),
            Event::new("a", utc(2021, 2, 4)),
            Event::new("c", utc(2021, 3, 9)),
            Event::new("b", utc(2021, 3, 10)),
        ];
        let seen = first_seen(history.iter().rev());
        let buckets = month_buckets(utc(2021, 1, 1), utc(2021, 3, 31));

        let series = new_entity_counts(&history, &buckets, NewEntityPolicy::FirstSeen(&seen));

        let new: Vec<_> = series.iter().map(|e| e.new).collect();
        let total: Vec<_> = series.iter().map(|e| e.total).collect();
        assert_eq!(new, vec![2, 0, 1]);
        assert_eq!(total, vec![2, 2, 3]);
    }

    #[test]
    fn test_every_record_policy_counts_all() {
        let events = vec![
            Event::new("a", utc(2021, 1, 3)),
            Event::new("a", utc(2021, 2, 3)),
        ];
        let buckets = month_buckets(utc(2021, 1, 1), utc(2021, 2, 28));

        let series = new_entity_counts(&events, &buckets, NewEntityPolicy::EveryRecord);

        assert_eq!(series[0].new, 1);
        assert_eq!(series[1].new, 1);
        assert_eq!(series[1].total, 2);
    }

    #[test]
    fn test_round_ratio() {
        assert_eq!(round_ratio(0, 0), 0.0);
        assert_eq!(round_ratio(3, 0), 0.0);
        assert_eq!(round_ratio(1, 3), 0.33);
        assert_eq!(round_ratio(2, 3), 0.67);
        assert_eq!(round_ratio(1, 8), 0.13);
        assert_eq!(round_ratio(4, 4), 1.0);
    }

    #[test]
    fn test_ratio_of_aligned_series() {
        let entry = |d, new, total| CumulativeEntry {
            date: ymd(2021, d, 1),
            new,
            total,
        };
        let numerator = vec![entry(1, 1, 1), entry(2, 0, 1)];
        let denominator = vec![entry(1, 3, 3), entry(2, 0, 3)];

        let result = ratio(&numerator, &denominator).unwrap();

        assert_eq!(result[0].new, 0.33);
        assert_eq!(result[0].total, 0.33);
        assert_eq!(result[1].new, 0.0);
        assert_eq!(result[1].total, 0.33);
    }

    #[test]
    fn test_ratio_rejects_misaligned_series() {
        let entry = |d| CumulativeEntry {
            date: ymd(2021, d, 1),
            new: 1,
            total: 1,
        };

        let result = ratio(&[entry(1), entry(2)], &[entry(1), entry(3)]);
        assert!(matches!(result, Err(Error::MisalignedSeries { .. })));

        let result = ratio(&[entry(1)], &[entry(1), entry(2)]);
        assert!(matches!(result, Err(Error::MisalignedSeries { .. })));
    }
}
