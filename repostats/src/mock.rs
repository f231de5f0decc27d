//! In-memory client with GitHub-like cursor semantics for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::api::{
    Direction, Error, Event, EventKind, EventSource, ManifestSource, MetadataSource, Page, PageInfo, PageRequest,
    RateLimit, RepoId, RepoSnapshot, Result,
};

pub(crate) fn days_ago(now: DateTime<Utc>, days: f64) -> DateTime<Utc> {
    now - Duration::seconds((days * 86_400.0) as i64)
}

pub(crate) fn snapshot(now: DateTime<Utc>) -> RepoSnapshot {
    RepoSnapshot {
        description: "mock".to_string(),
        stars: 0,
        forks: 0,
        open_issues: 0,
        issues: 0,
        pull_requests: 0,
        commits: 0,
        releases: 0,
        archived: false,
        language: String::new(),
        default_branch: "main".to_string(),
        created_at: days_ago(now, 400.0),
        last_commit_date: None,
        last_release_date: None,
        last_star_date: None,
        disk_usage: 42,
        mentionable_users: 3,
    }
}

#[derive(Default)]
pub(crate) struct MockSource {
    /// Oldest first, like the GitHub connections.
    events: HashMap<EventKind, Vec<Event>>,
    calls: AtomicUsize,
    fail_on_call: Option<usize>,
    snapshot: Option<RepoSnapshot>,
    manifests: HashMap<String, String>,
}

impl MockSource {
    pub(crate) fn with_stars(timestamps: Vec<DateTime<Utc>>) -> Self {
        MockSource::default().with_events(EventKind::Stars, timestamps)
    }

    pub(crate) fn with_events(self, kind: EventKind, mut timestamps: Vec<DateTime<Utc>>) -> Self {
        timestamps.sort();
        let events = timestamps
            .into_iter()
            .enumerate()
            .map(|(i, timestamp)| Event::new(timestamp, format!("{}-{}", kind, i)))
            .collect();
        self.with_raw_events(kind, events)
    }

    /// Events taken as-is, duplicated cursors included.
    pub(crate) fn with_raw_events(mut self, kind: EventKind, events: Vec<Event>) -> Self {
        self.events.insert(kind, events);
        self
    }

    pub(crate) fn failing_on_call(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    pub(crate) fn with_snapshot(mut self, snapshot: RepoSnapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    pub(crate) fn with_manifest(mut self, file: &str, content: &str) -> Self {
        self.manifests.insert(file.to_string(), content.to_string());
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSource for MockSource {
    async fn page(&self, _repo: &RepoId, kind: EventKind, request: PageRequest) -> Result<Page> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        // Lets the other reconciler walker run between pages.
        tokio::task::yield_now().await;
        if self.fail_on_call == Some(call) {
            return Err(Error::Api(format!("mock failure on call {}", call)));
        }
        let events = self.events.get(&kind).map(Vec::as_slice).unwrap_or_default();
        let size = request.page_size as usize;
        let position = |cursor: Option<String>, default: usize| -> Result<usize> {
            cursor.map_or(Ok(default), |cursor| {
                cursor
                    .parse::<usize>()
                    .map_err(|_| Error::Decode(format!("bad cursor {}", cursor)))
            })
        };
        let page = match request.direction {
            Direction::Forward => {
                let start = position(request.cursor, 0)?.min(events.len());
                let end = (start + size).min(events.len());
                Page::new(
                    events[start..end].to_vec(),
                    PageInfo::new(end < events.len(), Some(end.to_string())),
                )
            }
            Direction::Backward => {
                let end = position(request.cursor, events.len())?.min(events.len());
                let start = end.saturating_sub(size);
                let mut page = events[start..end].to_vec();
                page.reverse();
                Page::new(page, PageInfo::new(start > 0, Some(start.to_string())))
            }
        };
        Ok(page)
    }
}

#[async_trait]
impl MetadataSource for MockSource {
    async fn snapshot(&self, repo: &RepoId) -> Result<RepoSnapshot> {
        self.snapshot
            .clone()
            .ok_or_else(|| Error::Api(format!("Could not resolve to a Repository with the name '{}'", repo)))
    }

    async fn rate_limit(&self) -> Result<RateLimit> {
        Ok(RateLimit::new(5000, 1, 4999, Utc::now()))
    }
}

#[async_trait]
impl ManifestSource for MockSource {
    async fn manifest(&self, _repo: &RepoId, _branch: &str, file: &str) -> Result<Option<String>> {
        Ok(self.manifests.get(file).cloned())
    }
}
