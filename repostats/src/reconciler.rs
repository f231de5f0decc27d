//! Full event histories fetched from both ends at once.
//!
//! A forward walker starts at the oldest event and a backward walker at the
//! newest. Each is bounded by a page count so that together they cover the
//! reported total with some overlap near the middle; a shared cursor set makes
//! sure overlapping events are counted once.

use std::collections::HashSet;
use std::ops::ControlFlow;
use std::sync::Arc;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinSet;

use crate::api::{Direction, Error, Event, EventKind, EventSource, RepoId, Result};
use crate::progress::Progress;
use crate::timeline::{Granularity, Timeline};
use crate::walker::{EventWalker, WalkSummary, PAGE_SIZE};

/// Pages allowed to the forward and backward walkers for `total` events.
///
/// The half is taken with integer division before rounding. Small histories
/// give the forward walker enough pages to cover everything on its own.
pub fn page_limits(total: u64) -> (usize, usize) {
    let page = PAGE_SIZE as u64;
    let half = total / 2;
    if total < 300 {
        ((total / page + 1) as usize, (ceil_div(half, page) + 1) as usize)
    } else {
        ((ceil_div(half, page) + 1) as usize, (half / page) as usize)
    }
}

fn ceil_div(value: u64, divisor: u64) -> u64 {
    (value + divisor - 1) / divisor
}

/// Cursors seen so far and the timeline they were counted into.
struct Tally {
    seen: HashSet<String>,
    timeline: Timeline,
}

impl Tally {
    /// Check, insert and count under one lock so the two walkers never double count.
    fn absorb(&mut self, events: &[Event]) {
        for event in events {
            if self.seen.insert(event.cursor.clone()) && !self.timeline.record(event.timestamp) {
                debug!("Event at {} falls outside the timeline", event.timestamp);
            }
        }
    }
}

/// Daily timeline of every `kind` event from `created_at` to `now`.
///
/// Runs both walkers as separate tasks. The first failure cancels the other
/// walker and is returned; nothing partial is kept. Page counts are published
/// to `progress` when given, and the channel is closed once this returns.
pub async fn full_history_from<S>(
    source: Arc<S>,
    repo: &RepoId,
    kind: EventKind,
    total: u64,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
    progress: Option<UnboundedSender<usize>>,
) -> Result<Timeline>
where
    S: EventSource + ?Sized + 'static,
{
    let tally = Arc::new(Mutex::new(Tally {
        seen: HashSet::new(),
        timeline: Timeline::build(created_at, now, Granularity::Day),
    }));
    let progress = Arc::new(Progress::new(progress));
    let (forward_limit, backward_limit) = page_limits(total);
    debug!(
        "{} {}: {} total, {} forward and {} backward pages",
        repo, kind, total, forward_limit, backward_limit
    );

    let mut tasks = JoinSet::new();
    for (direction, limit) in [(Direction::Forward, forward_limit), (Direction::Backward, backward_limit)] {
        if limit == 0 {
            continue;
        }
        let source = Arc::clone(&source);
        let repo = repo.clone();
        let tally = Arc::clone(&tally);
        let progress = Arc::clone(&progress);
        tasks.spawn(async move {
            let walked = EventWalker::new(&*source, &repo, kind, direction)
                .with_page_limit(limit)
                .with_progress(&progress)
                .walk(|events| {
                    tally.lock().absorb(events);
                    ControlFlow::Continue(())
                })
                .await;
            walked.map_err(|partial| partial.error)
        });
    }
    drop(progress);

    while let Some(joined) = tasks.join_next().await {
        let walked: Result<WalkSummary> = joined.map_err(|err| Error::Other(anyhow!("walker task failed: {}", err)))?;
        if let Err(err) = walked {
            warn!("{} {} history failed, cancelling the other walker: {}", repo, kind, err);
            tasks.shutdown().await;
            return Err(err);
        }
    }

    let mut timeline = std::mem::take(&mut tally.lock().timeline);
    timeline.accumulate_forward();
    Ok(timeline)
}

/// Daily timeline walked from the oldest event only.
///
/// Slower than [`full_history_from`] on large histories but needs a single
/// cursor protocol.
pub async fn forward_history<S>(
    source: &S,
    repo: &RepoId,
    kind: EventKind,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
    progress: Option<&Progress>,
) -> Result<Timeline>
where
    S: EventSource + ?Sized,
{
    let mut tally = Tally {
        seen: HashSet::new(),
        timeline: Timeline::build(created_at, now, Granularity::Day),
    };
    let mut walker = EventWalker::new(source, repo, kind, Direction::Forward);
    if let Some(progress) = progress {
        walker = walker.with_progress(progress);
    }
    walker
        .walk(|events| {
            tally.absorb(events);
            ControlFlow::Continue(())
        })
        .await
        .map_err(|partial| partial.error)?;
    let mut timeline = tally.timeline;
    timeline.accumulate_forward();
    Ok(timeline)
}
