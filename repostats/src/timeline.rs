//! Dense, gapless per-day or per-hour event timelines.
//!
//! A [`Timeline`] is allocated up front with one zeroed [`TimeBucket`] for every
//! calendar unit between a start instant and an end instant (both truncated to
//! the unit boundary), so buckets without events still show up in charts.
//! Events are then recorded into their bucket and running totals computed
//! either forward from zero (full history) or backward from a known current
//! total (short windows).

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Granularity {
    #[default]
    Day,
    Hour,
}

impl Granularity {
    pub fn seconds(self) -> i64 {
        match self {
            Granularity::Day => 24 * 60 * 60,
            Granularity::Hour => 60 * 60,
        }
    }

    pub fn unit(self) -> Duration {
        Duration::seconds(self.seconds())
    }

    /// Truncates to the start of the UTC day or hour containing `instant`.
    pub fn truncate(self, instant: DateTime<Utc>) -> DateTime<Utc> {
        let secs = instant.timestamp();
        let truncated = secs - secs.rem_euclid(self.seconds());
        Utc.timestamp_opt(truncated, 0).single().unwrap_or(instant)
    }

    /// Day buckets print as `DD-MM-YYYY`, hour buckets as `DD-MM-YYYY HH:00`.
    pub fn format(self, instant: DateTime<Utc>) -> String {
        match self {
            Granularity::Day => instant.format("%d-%m-%Y").to_string(),
            Granularity::Hour => instant.format("%d-%m-%Y %H:00").to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeBucket {
    pub timestamp: DateTime<Utc>,
    pub count: u64,
    pub running_total: u64,
}

impl TimeBucket {
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        TimeBucket {
            timestamp,
            count: 0,
            running_total: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timeline {
    pub granularity: Granularity,
    pub buckets: Vec<TimeBucket>,
}

impl Timeline {
    /// Zeroed buckets covering `[start, end]` truncated to `granularity`.
    ///
    /// Yields `floor((trunc(end) - trunc(start)) / unit) + 1` buckets, or none
    /// when `start > end`.
    pub fn build(start: DateTime<Utc>, end: DateTime<Utc>, granularity: Granularity) -> Self {
        if start > end {
            return Timeline {
                granularity,
                buckets: Vec::new(),
            };
        }
        let first = granularity.truncate(start);
        let last = granularity.truncate(end);
        let len = (last - first).num_seconds() / granularity.seconds() + 1;
        let buckets = (0..len)
            .map(|i| TimeBucket::empty(first + Duration::seconds(i * granularity.seconds())))
            .collect();
        Timeline { granularity, buckets }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.buckets.first().map(|bucket| bucket.timestamp)
    }

    /// Position of the bucket containing `instant`, `None` outside the timeline.
    pub fn bucket_index(&self, instant: DateTime<Utc>) -> Option<usize> {
        let start = self.start()?;
        let truncated = self.granularity.truncate(instant);
        if truncated < start {
            return None;
        }
        let index = ((truncated - start).num_seconds() / self.granularity.seconds()) as usize;
        (index < self.buckets.len()).then(|| index)
    }

    /// Counts one event at `instant`. Returns `false` when it falls outside the timeline.
    pub fn record(&mut self, instant: DateTime<Utc>) -> bool {
        match self.bucket_index(instant) {
            Some(index) => {
                self.buckets[index].count += 1;
                true
            }
            None => false,
        }
    }

    pub fn total_count(&self) -> u64 {
        self.buckets.iter().map(|bucket| bucket.count).sum()
    }

    /// `running_total[i] = running_total[i-1] + count[i]`, starting from `count[0]`.
    pub fn accumulate_forward(&mut self) {
        let mut total = 0;
        for bucket in self.buckets.iter_mut() {
            total += bucket.count;
            bucket.running_total = total;
        }
    }

    /// Anchors the last bucket at `current_total` and walks back:
    /// `running_total[i] = running_total[i+1] - count[i+1]`.
    pub fn accumulate_backward(&mut self, current_total: u64) {
        let mut total = current_total;
        let mut later_count = 0;
        for bucket in self.buckets.iter_mut().rev() {
            total = total.saturating_sub(later_count);
            bucket.running_total = total;
            later_count = bucket.count;
        }
    }
}

/// Buckets serialize as compact `[date, count, total]` tuples.
impl Serialize for Timeline {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.buckets.len()))?;
        for bucket in &self.buckets {
            seq.serialize_element(&(
                self.granularity.format(bucket.timestamp),
                bucket.count,
                bucket.running_total,
            ))?;
        }
        seq.end()
    }
}
