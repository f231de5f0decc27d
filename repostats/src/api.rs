use std::fmt::{self, Debug, Display};
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use derive_more::Constructor;
use serde::Serialize;
use strum_macros::{Display as StrumDisplay, EnumIter, EnumString};
use thiserror::Error;

use crate::timeline::Timeline;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Repository should be provided as owner/name, got '{0}'")]
    InvalidRepo(String),
    #[error("Request error: {0}")]
    Transport(#[source] anyhow::Error),
    #[error("Unexpected response: {0}")]
    Decode(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("{kind} events cannot be walked {direction} by this source")]
    Unsupported { kind: EventKind, direction: Direction },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Error carrying whatever was collected before the failure.
///
/// `value` is `None` when nothing usable was gathered (validation failure,
/// metadata failure, first page failure).
pub struct Partial<T> {
    pub value: Option<T>,
    pub error: Error,
}

pub type PartialResult<T> = std::result::Result<T, Partial<T>>;

impl<T> Partial<T> {
    pub fn none(error: Error) -> Self {
        Partial { value: None, error }
    }

    pub fn some(value: T, error: Error) -> Self {
        Partial {
            value: Some(value),
            error,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Partial<U> {
        Partial {
            value: self.value.map(f),
            error: self.error,
        }
    }
}

impl<T> From<Error> for Partial<T> {
    fn from(error: Error) -> Self {
        Partial::none(error)
    }
}

impl<T> Debug for Partial<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Partial")
            .field("has_value", &self.value.is_some())
            .field("error", &self.error)
            .finish()
    }
}

impl<T> Display for Partial<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.error, f)
    }
}

impl<T> std::error::Error for Partial<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// `owner/name` repository identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl FromStr for RepoId {
    type Err = Error;

    fn from_str(path: &str) -> Result<Self> {
        let mut parts = path.trim().split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty() => Ok(RepoId {
                owner: owner.to_string(),
                name: name.to_string(),
            }),
            _ => Err(Error::InvalidRepo(path.to_string())),
        }
    }
}

impl Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, EnumString, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum EventKind {
    Stars,
    Commits,
    Issues,
    PullRequests,
    Forks,
    Releases,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay)]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    /// Oldest first.
    Forward,
    /// Newest first.
    Backward,
}

/// One timestamped occurrence. `cursor` identifies the occurrence itself and is
/// what deduplication keys on.
#[derive(Debug, Clone, PartialEq, Eq, Constructor)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub cursor: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Constructor)]
pub struct PageRequest {
    pub cursor: Option<String>,
    pub page_size: u32,
    pub direction: Direction,
}

/// `cursor` continues the walk in the requested direction when `has_more`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Constructor)]
pub struct PageInfo {
    pub has_more: bool,
    pub cursor: Option<String>,
}

/// Events are ordered in walk direction: oldest first going forward, newest
/// first going backward.
#[derive(Debug, Clone, Default, PartialEq, Eq, Constructor)]
pub struct Page {
    pub events: Vec<Event>,
    pub page_info: PageInfo,
}

/// Point-in-time repository metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct RepoSnapshot {
    pub description: String,
    pub stars: u64,
    pub forks: u64,
    pub open_issues: u64,
    pub issues: u64,
    pub pull_requests: u64,
    pub commits: u64,
    pub releases: u64,
    pub archived: bool,
    pub language: String,
    pub default_branch: String,
    pub created_at: DateTime<Utc>,
    pub last_commit_date: Option<DateTime<Utc>>,
    pub last_release_date: Option<DateTime<Utc>>,
    pub last_star_date: Option<DateTime<Utc>>,
    pub disk_usage: u64,
    pub mentionable_users: u64,
}

impl RepoSnapshot {
    pub fn total(&self, kind: EventKind) -> u64 {
        match kind {
            EventKind::Stars => self.stars,
            EventKind::Commits => self.commits,
            EventKind::Issues => self.issues,
            EventKind::PullRequests => self.pull_requests,
            EventKind::Forks => self.forks,
            EventKind::Releases => self.releases,
        }
    }

    /// Newest event date the metadata query peeked at, if any.
    pub fn last_event(&self, kind: EventKind) -> Option<DateTime<Utc>> {
        match kind {
            EventKind::Stars => self.last_star_date,
            EventKind::Commits => self.last_commit_date,
            EventKind::Releases => self.last_release_date,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryResult {
    pub timeline: Timeline,
    pub last_event_date: Option<DateTime<Utc>>,
    pub added_last_24h: u64,
    pub added_last_7d: u64,
    pub added_last_14d: u64,
    pub added_last_30d: u64,
    pub added_per_mille_30d: f32,
    /// `false` when the walk stopped on an error and counts cover only the pages fetched.
    pub complete: bool,
}

impl Display for HistoryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let last = self
            .last_event_date
            .map(|date| date.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        writeln!(f, "Last Event Date: {}", last)?;
        writeln!(f, "Added Last 24H: {}", self.added_last_24h)?;
        writeln!(f, "Added Last 7d: {}", self.added_last_7d)?;
        writeln!(f, "Added Last 14d: {}", self.added_last_14d)?;
        writeln!(f, "Added Last 30d: {}", self.added_last_30d)?;
        write!(f, "Added Per Mille 30d: {:.2}", self.added_per_mille_30d)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DepsList {
    /// Toolchain version declared by the manifest (`go 1.21` in go.mod).
    pub ecosystem_version: Option<String>,
    pub direct_dependencies: std::collections::BTreeSet<String>,
}

impl DepsList {
    pub fn len(&self) -> usize {
        self.direct_dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.direct_dependencies.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Constructor)]
pub struct RateLimit {
    pub limit: u32,
    pub cost: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

/// Everything collected for one repository.
#[derive(Debug, Clone, PartialEq)]
pub struct RepoStats {
    pub repo: RepoId,
    pub snapshot: RepoSnapshot,
    pub stars: HistoryResult,
    pub commits: HistoryResult,
    pub deps: DepsList,
    pub liveness_score: f32,
}

impl Display for RepoStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let date = |date: Option<DateTime<Utc>>| date.map(|d| d.to_rfc3339()).unwrap_or_else(|| "-".to_string());
        writeln!(f, "GH Repo: {}", self.repo)?;
        writeln!(f, "Created: {}", self.snapshot.created_at.to_rfc3339())?;
        writeln!(f, "Last Commit: {}", date(self.snapshot.last_commit_date))?;
        writeln!(f, "Last Release: {}", date(self.snapshot.last_release_date))?;
        writeln!(f, "Stars: {}", self.snapshot.stars)?;
        writeln!(f, "Size: {}", self.snapshot.disk_usage)?;
        writeln!(f, "Language: {}", self.snapshot.language)?;
        writeln!(f, "Open Issues: {}", self.snapshot.open_issues)?;
        writeln!(f, "Forks: {}", self.snapshot.forks)?;
        writeln!(f, "Archived: {}", self.snapshot.archived)?;
        writeln!(f, "Mentionable Users: {}", self.snapshot.mentionable_users)?;
        writeln!(f, "Default Branch: {}", self.snapshot.default_branch)?;
        writeln!(f, "{}", self.stars)?;
        writeln!(f, "Liveness Score: {:.2}", self.liveness_score)?;
        if let Some(version) = &self.deps.ecosystem_version {
            writeln!(f, "Toolchain version: {}", version)?;
        }
        write!(f, "Direct dependencies: {}", self.deps.len())
    }
}

/// Paged timestamp-event query. Any cursor-paginated source fits.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn page(&self, repo: &RepoId, kind: EventKind, request: PageRequest) -> Result<Page>;
}

#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn snapshot(&self, repo: &RepoId) -> Result<RepoSnapshot>;

    async fn rate_limit(&self) -> Result<RateLimit>;
}

/// Raw file access used by the dependency fetchers. `Ok(None)` when the file does not exist.
#[async_trait]
pub trait ManifestSource: Send + Sync {
    async fn manifest(&self, repo: &RepoId, branch: &str, file: &str) -> Result<Option<String>>;
}

pub trait Client: EventSource + MetadataSource + ManifestSource {}

impl<T> Client for T where T: EventSource + MetadataSource + ManifestSource {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_id_parses_owner_and_name() {
        let repo: RepoId = "kubernetes/kubernetes".parse().unwrap();
        assert_eq!(repo.owner, "kubernetes");
        assert_eq!(repo.name, "kubernetes");
        assert_eq!(repo.to_string(), "kubernetes/kubernetes");
    }

    #[test]
    fn repo_id_rejects_malformed_paths() {
        for path in ["kubernetes", "a/b/c", "/name", "owner/", ""] {
            assert!(
                matches!(path.parse::<RepoId>(), Err(Error::InvalidRepo(_))),
                "{} should be rejected",
                path
            );
        }
    }

    #[test]
    fn event_kind_round_trips_through_strings() {
        assert_eq!(EventKind::PullRequests.to_string(), "pull-requests");
        assert_eq!("stars".parse::<EventKind>().unwrap(), EventKind::Stars);
    }

    #[test]
    fn partial_displays_underlying_error() {
        let partial: Partial<u32> = Partial::some(3, Error::Api("boom".to_string()));
        assert_eq!(partial.to_string(), "API error: boom");
        assert_eq!(partial.map(|v| v * 2).value, Some(6));
    }
}
