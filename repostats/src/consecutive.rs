use chrono::{DateTime, Utc};
use derive_more::Constructor;
use serde::Serialize;

use crate::timeline::TimeBucket;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Constructor)]
pub struct MaxPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub total: u64,
}

/// Returns every `width`-long run of buckets whose summed count is maximal.
///
/// # Arguments
/// * `timeline` - finalized buckets in chronological order
/// * `width` - number of consecutive buckets per window
///
/// Ties are all kept, in chronological order. Empty when `width` is zero or
/// exceeds the timeline.
pub fn max_consecutive_periods(timeline: &[TimeBucket], width: usize) -> Vec<MaxPeriod> {
    if width == 0 || timeline.len() < width {
        return Vec::new();
    }
    let period = |start: usize, total: u64| MaxPeriod::new(timeline[start].timestamp, timeline[start + width - 1].timestamp, total);

    let mut sum: u64 = timeline[..width].iter().map(|bucket| bucket.count).sum();
    let mut max = sum;
    let mut periods = vec![period(0, sum)];
    for start in 1..=timeline.len() - width {
        sum = sum + timeline[start + width - 1].count - timeline[start - 1].count;
        if sum > max {
            max = sum;
            periods.clear();
            periods.push(period(start, sum));
        } else if sum == max {
            periods.push(period(start, sum));
        }
    }
    periods
}

/// Buckets tied at the highest single count.
pub fn peak_days(timeline: &[TimeBucket]) -> Vec<TimeBucket> {
    let max = match timeline.iter().map(|bucket| bucket.count).max() {
        Some(max) => max,
        None => return Vec::new(),
    };
    timeline.iter().filter(|bucket| bucket.count == max).cloned().collect()
}

/// Tests

#[cfg(test)]
fn buckets(counts: &[u64]) -> Vec<TimeBucket> {
    use chrono::{Duration, TimeZone};
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    counts
        .iter()
        .enumerate()
        .map(|(i, count)| TimeBucket {
            timestamp: start + Duration::days(i as i64),
            count: *count,
            running_total: 0,
        })
        .collect()
}

#[cfg(test)]
fn brute_force_max(timeline: &[TimeBucket], width: usize) -> Option<u64> {
    timeline
        .windows(width)
        .map(|window| window.iter().map(|bucket| bucket.count).sum())
        .max()
}

#[test]
fn max_window_matches_brute_force() {
    let timeline = buckets(&[3, 1, 4, 1, 5, 9, 2, 6]);
    let periods = max_consecutive_periods(&timeline, 3);
    assert_eq!(Some(periods[0].total), brute_force_max(&timeline, 3));
    assert_eq!(periods.len(), 1);
    assert_eq!(periods[0].total, 17);
    assert_eq!(periods[0].start, timeline[5].timestamp);
    assert_eq!(periods[0].end, timeline[7].timestamp);
    // [4, 1, 5] sums to 10, well below the real maximum.
    assert!(periods.iter().all(|period| period.start != timeline[2].timestamp));
}

#[test]
fn max_window_keeps_ties() {
    let timeline = buckets(&[5, 1, 1, 5, 0, 2]);
    let periods = max_consecutive_periods(&timeline, 2);
    let starts: Vec<_> = periods.iter().map(|period| period.start).collect();
    assert_eq!(starts, vec![timeline[0].timestamp, timeline[3].timestamp]);
    assert!(periods.iter().all(|period| period.total == 6));
}

#[test]
fn max_window_on_every_width() {
    let timeline = buckets(&[0, 7, 2, 2, 9, 1, 0, 0, 3, 4, 4]);
    for width in 1..=timeline.len() {
        let periods = max_consecutive_periods(&timeline, width);
        assert!(!periods.is_empty());
        for period in &periods {
            assert_eq!(Some(period.total), brute_force_max(&timeline, width));
        }
    }
}

#[test]
fn window_wider_than_timeline_is_empty() {
    assert!(max_consecutive_periods(&buckets(&[1, 2]), 3).is_empty());
    assert!(max_consecutive_periods(&buckets(&[1, 2]), 0).is_empty());
    assert!(max_consecutive_periods(&[], 1).is_empty());
}

#[test]
fn peak_days_returns_all_ties() {
    let timeline = buckets(&[2, 8, 1, 8, 3]);
    let peaks = peak_days(&timeline);
    assert_eq!(peaks.len(), 2);
    assert_eq!(peaks[0].timestamp, timeline[1].timestamp);
    assert_eq!(peaks[1].timestamp, timeline[3].timestamp);
    assert!(peak_days(&[]).is_empty());
}
