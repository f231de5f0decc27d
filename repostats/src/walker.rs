use std::ops::ControlFlow;

use futures::stream::{self, BoxStream};
use futures::StreamExt;
use log::debug;

use crate::api::{Direction, Event, EventKind, EventSource, PageRequest, Partial, RepoId, Result};
use crate::progress::Progress;

/// Largest page the GitHub APIs hand out.
pub const PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkSummary {
    pub pages: usize,
    pub events: usize,
    /// The visitor asked to stop before the source ran out of pages.
    pub stopped_early: bool,
}

/// Walks one direction of a cursor-paginated [`EventSource`].
pub struct EventWalker<'a, S: ?Sized> {
    source: &'a S,
    repo: &'a RepoId,
    kind: EventKind,
    direction: Direction,
    page_size: u32,
    page_limit: Option<usize>,
    progress: Option<&'a Progress>,
}

struct Cursor {
    next: Option<String>,
    fetched: usize,
    exhausted: bool,
}

impl<'a, S> EventWalker<'a, S>
where
    S: EventSource + ?Sized,
{
    pub fn new(source: &'a S, repo: &'a RepoId, kind: EventKind, direction: Direction) -> Self {
        EventWalker {
            source,
            repo,
            kind,
            direction,
            page_size: PAGE_SIZE,
            page_limit: None,
            progress: None,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_page_limit(mut self, page_limit: usize) -> Self {
        self.page_limit = Some(page_limit);
        self
    }

    pub fn with_progress(mut self, progress: &'a Progress) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Pages of events in walk direction.
    ///
    /// Ends after an empty page, after the last page, after `page_limit` pages,
    /// or right after yielding an error.
    pub fn pages(self) -> BoxStream<'a, Result<Vec<Event>>> {
        let EventWalker {
            source,
            repo,
            kind,
            direction,
            page_size,
            page_limit,
            progress,
        } = self;
        let start = Cursor {
            next: None,
            fetched: 0,
            exhausted: false,
        };
        stream::unfold(start, move |mut cursor| async move {
            if cursor.exhausted || page_limit.map_or(false, |limit| cursor.fetched >= limit) {
                return None;
            }
            let request = PageRequest::new(cursor.next.take(), page_size, direction);
            match source.page(repo, kind, request).await {
                Err(err) => {
                    cursor.exhausted = true;
                    Some((Err(err), cursor))
                }
                Ok(page) => {
                    cursor.fetched += 1;
                    if page.events.is_empty() {
                        return None;
                    }
                    if let Some(progress) = progress {
                        progress.page_done();
                    }
                    cursor.exhausted = !page.page_info.has_more || page.page_info.cursor.is_none();
                    cursor.next = page.page_info.cursor;
                    Some((Ok(page.events), cursor))
                }
            }
        })
        .boxed()
    }

    /// Feeds every page to `visit` until the walk ends or `visit` breaks.
    ///
    /// On error the summary of pages already visited is returned inside the
    /// [`Partial`]; it is `None` when the very first page failed.
    pub async fn walk<F>(self, mut visit: F) -> std::result::Result<WalkSummary, Partial<WalkSummary>>
    where
        F: FnMut(&[Event]) -> ControlFlow<()>,
    {
        let repo = self.repo;
        let kind = self.kind;
        let direction = self.direction;
        let mut summary = WalkSummary::default();
        let mut pages = self.pages();
        while let Some(page) = pages.next().await {
            let events = match page {
                Ok(events) => events,
                Err(error) if summary.pages == 0 => return Err(Partial::none(error)),
                Err(error) => return Err(Partial::some(summary, error)),
            };
            summary.pages += 1;
            summary.events += events.len();
            if visit(&events).is_break() {
                summary.stopped_early = true;
                break;
            }
        }
        debug!(
            "Walked {} {} {}: {} pages, {} events",
            repo, kind, direction, summary.pages, summary.events
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{days_ago, MockSource};
    use chrono::Utc;

    fn repo() -> RepoId {
        "owner/repo".parse().unwrap()
    }

    #[tokio::test]
    async fn forward_walk_sees_events_oldest_first() {
        let now = Utc::now();
        let source = MockSource::with_stars((0..250).rev().map(|i| days_ago(now, i as f64)).collect());
        let repo = repo();
        let mut seen = Vec::new();
        let summary = EventWalker::new(&source, &repo, EventKind::Stars, Direction::Forward)
            .walk(|events| {
                seen.extend(events.iter().map(|event| event.timestamp));
                ControlFlow::Continue(())
            })
            .await
            .unwrap();
        assert_eq!(summary.pages, 3);
        assert_eq!(summary.events, 250);
        assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn backward_walk_sees_events_newest_first() {
        let now = Utc::now();
        let source = MockSource::with_stars((0..150).rev().map(|i| days_ago(now, i as f64)).collect());
        let repo = repo();
        let mut seen = Vec::new();
        EventWalker::new(&source, &repo, EventKind::Stars, Direction::Backward)
            .walk(|events| {
                seen.extend(events.iter().map(|event| event.timestamp));
                ControlFlow::Continue(())
            })
            .await
            .unwrap();
        assert_eq!(seen.len(), 150);
        assert!(seen.windows(2).all(|pair| pair[0] >= pair[1]));
    }

    #[tokio::test]
    async fn page_limit_and_progress() {
        let now = Utc::now();
        let source = MockSource::with_stars((0..1000).map(|_| now).collect());
        let repo = repo();
        let (progress, mut receiver) = Progress::channel();
        let summary = EventWalker::new(&source, &repo, EventKind::Stars, Direction::Forward)
            .with_page_limit(4)
            .with_progress(&progress)
            .walk(|_| ControlFlow::Continue(()))
            .await
            .unwrap();
        drop(progress);
        assert_eq!(summary.pages, 4);
        let mut updates = Vec::new();
        while let Some(pages) = receiver.recv().await {
            updates.push(pages);
        }
        assert_eq!(updates, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn visitor_can_stop_the_walk() {
        let now = Utc::now();
        let source = MockSource::with_stars((0..500).map(|_| now).collect());
        let repo = repo();
        let summary = EventWalker::new(&source, &repo, EventKind::Stars, Direction::Backward)
            .walk(|_| ControlFlow::Break(()))
            .await
            .unwrap();
        assert!(summary.stopped_early);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn empty_source_stops_after_one_call() {
        let source = MockSource::with_stars(Vec::new());
        let repo = repo();
        let summary = EventWalker::new(&source, &repo, EventKind::Stars, Direction::Forward)
            .walk(|_| ControlFlow::Continue(()))
            .await
            .unwrap();
        assert_eq!(summary, WalkSummary::default());
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn first_page_failure_has_no_partial_value() {
        let source = MockSource::with_stars(vec![Utc::now(); 300]).failing_on_call(1);
        let repo = repo();
        let partial = EventWalker::new(&source, &repo, EventKind::Stars, Direction::Forward)
            .walk(|_| ControlFlow::Continue(()))
            .await
            .unwrap_err();
        assert!(partial.value.is_none());
    }

    #[tokio::test]
    async fn later_page_failure_keeps_the_summary() {
        let source = MockSource::with_stars(vec![Utc::now(); 300]).failing_on_call(3);
        let repo = repo();
        let mut visited = 0;
        let partial = EventWalker::new(&source, &repo, EventKind::Stars, Direction::Forward)
            .walk(|events| {
                visited += events.len();
                ControlFlow::Continue(())
            })
            .await
            .unwrap_err();
        assert_eq!(partial.value.map(|summary| summary.pages), Some(2));
        assert_eq!(visited, 200);
        assert_eq!(source.calls(), 3);
    }
}
