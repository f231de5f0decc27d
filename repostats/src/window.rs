//! Bounded lookbacks walked backward from the newest event.

use std::ops::ControlFlow;

use chrono::{DateTime, Duration, Utc};
use log::debug;

use crate::api::{Direction, Event, EventKind, EventSource, HistoryResult, Partial, PartialResult, RepoId};
use crate::timeline::{Granularity, Timeline};
use crate::walker::EventWalker;

pub const DEFAULT_LOOKBACK_DAYS: u32 = 30;

/// Longest lookback accepted, in days. Longer ones are clamped.
pub const MAX_LOOKBACK_DAYS: u32 = 36_500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lookback {
    units: u32,
    granularity: Granularity,
}

impl Lookback {
    pub fn days(days: u32) -> Self {
        Lookback {
            units: days.clamp(1, MAX_LOOKBACK_DAYS),
            granularity: Granularity::Day,
        }
    }

    pub fn hours(hours: u32) -> Self {
        Lookback {
            units: hours.clamp(1, MAX_LOOKBACK_DAYS * 24),
            granularity: Granularity::Hour,
        }
    }

    pub fn units(&self) -> u32 {
        self.units
    }

    pub fn span(&self) -> Duration {
        Duration::seconds(self.granularity.seconds() * i64::from(self.units))
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Buckets in the window timeline: one per unit plus the partial unit at
    /// the far end of the window, the newest one holding `now`.
    pub fn buckets(&self) -> usize {
        self.units as usize + 1
    }

    /// Calendar buckets from the unit holding `now - span` to the one holding `now`.
    pub fn timeline(&self, now: DateTime<Utc>) -> Timeline {
        Timeline::build(now - self.span(), now, self.granularity)
    }

    /// Whether an event at `date` is older than the window.
    pub fn excludes(&self, now: DateTime<Utc>, date: DateTime<Utc>) -> bool {
        now - date > self.span()
    }
}

impl Default for Lookback {
    fn default() -> Self {
        Lookback::days(DEFAULT_LOOKBACK_DAYS)
    }
}

/// Rolling counts and window timeline for the newest events of `kind`.
///
/// # Arguments
/// * `total` - event count at query time; anchors the backward running totals
/// * `lookback` - window length and bucket granularity
/// * `now` - instant ages are measured from
///
/// Nothing is queried when `total` is zero. A failure after the first page
/// keeps what was counted so far, marked incomplete.
pub async fn recent_history<S>(
    source: &S,
    repo: &RepoId,
    kind: EventKind,
    total: u64,
    lookback: Lookback,
    now: DateTime<Utc>,
) -> PartialResult<HistoryResult>
where
    S: EventSource + ?Sized,
{
    if total == 0 {
        return Ok(skipped(lookback, now, 0, None));
    }
    let mut window = WindowAccumulator::new(lookback, now);
    let walked = EventWalker::new(source, repo, kind, Direction::Backward)
        .walk(|events| window.absorb(events))
        .await;
    match walked {
        Ok(summary) => {
            debug!(
                "{} {} window: {} events in {} pages",
                repo, kind, window.added_last_30d, summary.pages
            );
            Ok(window.finish(total, true))
        }
        Err(Partial { value: None, error }) => Err(Partial::none(error)),
        Err(Partial { value: Some(_), error }) => Err(Partial::some(window.finish(total, false), error)),
    }
}

/// Window result without walking: zero counts, totals back-filled from `total`.
///
/// Used when the newest event is already known to be older than the window.
pub fn skipped(lookback: Lookback, now: DateTime<Utc>, total: u64, last_event: Option<DateTime<Utc>>) -> HistoryResult {
    let mut timeline = lookback.timeline(now);
    timeline.accumulate_backward(total);
    HistoryResult {
        timeline,
        last_event_date: last_event,
        added_last_24h: 0,
        added_last_7d: 0,
        added_last_14d: 0,
        added_last_30d: 0,
        added_per_mille_30d: 0.0,
        complete: true,
    }
}

struct WindowAccumulator {
    lookback: Lookback,
    now: DateTime<Utc>,
    timeline: Timeline,
    last_event_date: Option<DateTime<Utc>>,
    added_last_24h: u64,
    added_last_7d: u64,
    added_last_14d: u64,
    added_last_30d: u64,
}

impl WindowAccumulator {
    fn new(lookback: Lookback, now: DateTime<Utc>) -> Self {
        WindowAccumulator {
            lookback,
            now,
            timeline: lookback.timeline(now),
            last_event_date: None,
            added_last_24h: 0,
            added_last_7d: 0,
            added_last_14d: 0,
            added_last_30d: 0,
        }
    }

    /// Events arrive newest first, so the first one past the window ends the walk.
    fn absorb(&mut self, events: &[Event]) -> ControlFlow<()> {
        for event in events {
            if self.last_event_date.is_none() {
                self.last_event_date = Some(event.timestamp);
            }
            if self.lookback.excludes(self.now, event.timestamp) {
                return ControlFlow::Break(());
            }
            let age = self.now - event.timestamp;
            if age <= Duration::days(1) {
                self.added_last_24h += 1;
            }
            if age <= Duration::days(7) {
                self.added_last_7d += 1;
            }
            if age <= Duration::days(14) {
                self.added_last_14d += 1;
            }
            if age <= Duration::days(30) {
                self.added_last_30d += 1;
            }
            self.timeline.record(event.timestamp);
        }
        ControlFlow::Continue(())
    }

    fn finish(self, total: u64, complete: bool) -> HistoryResult {
        let mut timeline = self.timeline;
        timeline.accumulate_backward(total);
        let added_per_mille_30d = if total > 0 {
            1000.0 * (self.added_last_30d as f32 / total as f32)
        } else {
            0.0
        };
        HistoryResult {
            timeline,
            last_event_date: self.last_event_date,
            added_last_24h: self.added_last_24h,
            added_last_7d: self.added_last_7d,
            added_last_14d: self.added_last_14d,
            added_last_30d: self.added_last_30d,
            added_per_mille_30d,
            complete,
        }
    }
}
