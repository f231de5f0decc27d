use chrono::{DateTime, Utc};
use repostats::api::{RateLimit, RepoSnapshot};
use serde::Deserialize;

/// GraphQL response envelope.
#[derive(Deserialize, Debug)]
pub struct GraphqlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphqlError>,
}

#[derive(Deserialize, Debug)]
pub struct GraphqlError {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Any event connection, aliased as `connection` in the queries.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub edges: Vec<Edge>,
    pub page_info: PageInfo,
}

/// Stargazer edges carry the timestamp on the edge, the others on the node.
/// Both are aliased to `at`.
#[derive(Deserialize, Debug)]
pub struct Edge {
    pub cursor: String,
    pub at: Option<DateTime<Utc>>,
    pub node: Option<Node>,
}

impl Edge {
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.at.or_else(|| self.node.as_ref().and_then(|node| node.at))
    }
}

#[derive(Deserialize, Debug)]
pub struct Node {
    pub at: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct RepositoryData {
    pub repository: Option<Repository>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub description: Option<String>,
    pub stargazer_count: u64,
    pub created_at: DateTime<Utc>,
    pub fork_count: u64,
    pub is_archived: bool,
    pub disk_usage: Option<u64>,
    pub primary_language: Option<Language>,
    pub mentionable_users: TotalCount,
    pub open_issues: TotalCount,
    pub issues: TotalCount,
    pub pull_requests: TotalCount,
    pub releases: Releases,
    pub stargazers: Stargazers,
    pub default_branch_ref: Option<BranchRef>,
}

#[derive(Deserialize, Debug)]
pub struct Language {
    pub name: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TotalCount {
    pub total_count: u64,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Releases {
    pub total_count: u64,
    pub nodes: Vec<Node>,
}

#[derive(Deserialize, Debug)]
pub struct Stargazers {
    pub edges: Vec<Edge>,
}

#[derive(Deserialize, Debug)]
pub struct BranchRef {
    pub name: String,
    pub target: Option<Target>,
}

#[derive(Deserialize, Debug)]
pub struct Target {
    pub history: Option<History>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct History {
    pub total_count: u64,
    pub nodes: Vec<Node>,
}

impl From<Repository> for RepoSnapshot {
    fn from(repo: Repository) -> Self {
        let (default_branch, history) = match repo.default_branch_ref {
            Some(branch) => (branch.name, branch.target.and_then(|target| target.history)),
            None => (String::new(), None),
        };
        RepoSnapshot {
            description: repo.description.unwrap_or_default(),
            stars: repo.stargazer_count,
            forks: repo.fork_count,
            open_issues: repo.open_issues.total_count,
            issues: repo.issues.total_count,
            pull_requests: repo.pull_requests.total_count,
            commits: history.as_ref().map_or(0, |history| history.total_count),
            releases: repo.releases.total_count,
            archived: repo.is_archived,
            language: repo.primary_language.map(|language| language.name).unwrap_or_default(),
            default_branch,
            created_at: repo.created_at,
            last_commit_date: history.and_then(|history| history.nodes.first().and_then(|node| node.at)),
            last_release_date: repo.releases.nodes.first().and_then(|node| node.at),
            last_star_date: repo.stargazers.edges.last().and_then(Edge::timestamp),
            disk_usage: repo.disk_usage.unwrap_or_default(),
            mentionable_users: repo.mentionable_users.total_count,
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitData {
    pub rate_limit: RateLimitBody,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitBody {
    pub limit: u32,
    pub cost: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl From<RateLimitBody> for RateLimit {
    fn from(body: RateLimitBody) -> Self {
        RateLimit::new(body.limit, body.cost, body.remaining, body.reset_at)
    }
}

/// `application/vnd.github.star+json` stargazer.
#[derive(Deserialize, Debug)]
pub struct Stargazer {
    pub starred_at: DateTime<Utc>,
    pub user: User,
}

#[derive(Deserialize, Debug)]
pub struct User {
    pub login: String,
}

#[derive(Deserialize, Debug)]
pub struct RestRepo {
    pub stargazers_count: u64,
}
