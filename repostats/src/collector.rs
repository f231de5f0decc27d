use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::{stream, Stream, StreamExt};
use log::{debug, error, info};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinError;

use crate::api::{
    Client, DepsList, Error, EventKind, HistoryResult, Partial, PartialResult, RateLimit, RepoId, RepoSnapshot,
    RepoStats, Result,
};
use crate::deps::FetcherRegistry;
use crate::liveness::{self, Signals};
use crate::reconciler;
use crate::telemetry::{traced, LogTelemetry, Telemetry};
use crate::timeline::Timeline;
use crate::window::{self, Lookback};

pub const DEFAULT_CONCURRENCY: usize = 10;

pub type RepoStatsStream = Pin<Box<dyn Stream<Item = (String, PartialResult<RepoStats>)> + Send>>;

/// Collects metadata, short-window activity, dependencies and liveness for repositories.
pub struct StatsCollector<CLIENT>
where
    CLIENT: 'static + Client,
{
    client: Arc<CLIENT>,
    fetchers: FetcherRegistry,
    telemetry: Arc<dyn Telemetry>,
    lookback: Lookback,
}

impl<CLIENT> Clone for StatsCollector<CLIENT>
where
    CLIENT: 'static + Client,
{
    fn clone(&self) -> Self {
        StatsCollector {
            client: Arc::clone(&self.client),
            fetchers: self.fetchers.clone(),
            telemetry: Arc::clone(&self.telemetry),
            lookback: self.lookback,
        }
    }
}

impl<CLIENT> StatsCollector<CLIENT>
where
    CLIENT: 'static + Client,
{
    pub fn new(client: CLIENT) -> Self {
        StatsCollector {
            client: Arc::new(client),
            fetchers: FetcherRegistry::default(),
            telemetry: Arc::new(LogTelemetry),
            lookback: Lookback::default(),
        }
    }

    pub fn with_fetchers(mut self, fetchers: FetcherRegistry) -> Self {
        self.fetchers = fetchers;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_lookback(mut self, lookback: Lookback) -> Self {
        self.lookback = lookback;
        self
    }

    pub fn client(&self) -> &CLIENT {
        &self.client
    }

    pub async fn rate_limit(&self) -> Result<RateLimit> {
        self.client.rate_limit().await
    }

    pub async fn repo_stats(&self, path: &str) -> PartialResult<RepoStats> {
        self.repo_stats_at(path, Utc::now()).await
    }

    /// Stats for `path` (`owner/name`) with window ages measured from `now`.
    ///
    /// A malformed path or a failed metadata query gives nothing. A failure
    /// after that stops the remaining queries and returns the stats assembled
    /// so far, unfinished histories marked incomplete.
    pub async fn repo_stats_at(&self, path: &str, now: DateTime<Utc>) -> PartialResult<RepoStats> {
        let repo: RepoId = path.parse()?;
        let telemetry = self.telemetry.as_ref();
        let snapshot = traced(telemetry, "metadata", &repo, self.client.snapshot(&repo)).await?;

        let mut failure = None;
        let stars = traced(telemetry, "stars", &repo, self.window(&repo, EventKind::Stars, &snapshot, now)).await;
        let stars = self.settle(stars, &mut failure, now, snapshot.stars);
        let commits = if failure.is_none() {
            let commits =
                traced(telemetry, "commits", &repo, self.window(&repo, EventKind::Commits, &snapshot, now)).await;
            self.settle(commits, &mut failure, now, snapshot.commits)
        } else {
            self.unfinished(now, snapshot.commits)
        };
        let deps = if failure.is_none() {
            self.fetchers
                .fetch(&*self.client, &repo, &snapshot.language, &snapshot.default_branch)
                .await
        } else {
            DepsList::default()
        };

        let liveness_score = liveness::score(now, &Signals::from_stats(&snapshot, &stars, Some(&commits)));
        let stats = RepoStats {
            repo,
            snapshot,
            stars,
            commits,
            deps,
            liveness_score,
        };
        match failure {
            None => {
                info!("Collected {}: liveness {:.2}", stats.repo, stats.liveness_score);
                Ok(stats)
            }
            Some(error) => Err(Partial::some(stats, error)),
        }
    }

    /// Stats for every path, at most `concurrency` repositories in flight.
    ///
    /// Results keep the order of `repos`; a failed repository is reported in
    /// its slot and does not stop the others.
    pub fn collect_all(&self, repos: Vec<String>, concurrency: usize) -> RepoStatsStream {
        let collector = self.clone();
        stream::iter(repos)
            .map(move |path| {
                let collector = collector.clone();
                tokio::spawn(async move {
                    let stats = collector.repo_stats(&path).await;
                    (path, stats)
                })
            })
            .buffered(concurrency.max(1))
            .filter_map(map_join_result)
            .boxed()
    }

    /// Short-window history of `kind` for `path` with a custom lookback.
    pub async fn recent(&self, path: &str, kind: EventKind, lookback: Lookback) -> PartialResult<HistoryResult> {
        let repo: RepoId = path.parse()?;
        let snapshot = traced(self.telemetry.as_ref(), "metadata", &repo, self.client.snapshot(&repo)).await?;
        window::recent_history(
            &*self.client,
            &repo,
            kind,
            snapshot.total(kind),
            lookback,
            Utc::now(),
        )
        .await
    }

    /// Daily history of `kind` since the repository was created, fetched from both ends.
    pub async fn full_history(
        &self,
        path: &str,
        kind: EventKind,
        progress: Option<UnboundedSender<usize>>,
    ) -> Result<Timeline> {
        let repo: RepoId = path.parse()?;
        let telemetry = self.telemetry.as_ref();
        let snapshot = traced(telemetry, "metadata", &repo, self.client.snapshot(&repo)).await?;
        let history = reconciler::full_history_from(
            Arc::clone(&self.client),
            &repo,
            kind,
            snapshot.total(kind),
            snapshot.created_at,
            Utc::now(),
            progress,
        );
        traced(telemetry, "full_history", &repo, history).await
    }

    async fn window(
        &self,
        repo: &RepoId,
        kind: EventKind,
        snapshot: &RepoSnapshot,
        now: DateTime<Utc>,
    ) -> PartialResult<HistoryResult> {
        let total = snapshot.total(kind);
        match snapshot.last_event(kind) {
            Some(last) if self.lookback.excludes(now, last) => {
                debug!("{} last {} event {} is outside the window", repo, kind, last);
                Ok(window::skipped(self.lookback, now, total, Some(last)))
            }
            _ => window::recent_history(&*self.client, repo, kind, total, self.lookback, now).await,
        }
    }

    /// Keeps the first error and whatever the failed window collected.
    fn settle(
        &self,
        result: PartialResult<HistoryResult>,
        failure: &mut Option<Error>,
        now: DateTime<Utc>,
        total: u64,
    ) -> HistoryResult {
        match result {
            Ok(history) => history,
            Err(Partial { value, error }) => {
                failure.get_or_insert(error);
                value.unwrap_or_else(|| self.unfinished(now, total))
            }
        }
    }

    fn unfinished(&self, now: DateTime<Utc>, total: u64) -> HistoryResult {
        let mut history = window::skipped(self.lookback, now, total, None);
        history.complete = false;
        history
    }
}

async fn map_join_result(
    joined: std::result::Result<(String, PartialResult<RepoStats>), JoinError>,
) -> Option<(String, PartialResult<RepoStats>)> {
    match joined {
        Ok(stats) => Some(stats),
        Err(err) => {
            error!("Repository stats task failed: {}", err);
            None
        }
    }
}
