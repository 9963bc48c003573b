//! Monotonic bucket assignment.
//!
//! Events sorted by `created_at` are walked once alongside the bucket list.
//! A single cursor only ever moves forward, so assigning `n` events to `m`
//! buckets costs O(n + m).
//!
//! ```text
//!   buckets:  |  0        |  1        |  2 ...
//!   events:     e e   e      e          e e
//!   cursor:     0 0   0      1          2 2     (never decreases)
//! ```

use chrono::{DateTime, Utc};

use super::timeframe::Bucket;
use crate::types::Event;

/// Forward-only cursor over a bucket list.
///
/// Feed timestamps in ascending order; the cursor is never re-validated, so
/// feeding an earlier timestamp after a later one keeps the later bucket.
#[derive(Debug)]
pub struct BucketSweep<'a> {
    buckets: &'a [Bucket],
    cursor: usize,
}

impl<'a> BucketSweep<'a> {
    /// `buckets` must be non-empty and strictly increasing.
    pub fn new(buckets: &'a [Bucket]) -> Self {
        debug_assert!(!buckets.is_empty(), "sweep needs at least one bucket");
        Self { buckets, cursor: 0 }
    }

    /// Bucket index for the next timestamp.
    ///
    /// A timestamp equal to a bucket start belongs to that bucket. Anything
    /// before the first bucket is clamped to index 0; anything after the last
    /// start lands in the last bucket.
    pub fn advance(&mut self, ts: DateTime<Utc>) -> usize {
        while self.cursor + 1 < self.buckets.len() && ts >= self.buckets[self.cursor + 1].start {
            self.cursor += 1;
        }
        self.cursor
    }

    /// Current bucket index.
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

/// Assign each event to a bucket index.
///
/// Precondition: `events` is sorted ascending by `created_at`. This is not
/// checked. The result is parallel to `events`.
pub fn assign(events: &[Event], buckets: &[Bucket]) -> Vec<usize> {
    let mut sweep = BucketSweep::new(buckets);
    events.iter().map(|e| sweep.advance(e.created_at)).collect()
}
