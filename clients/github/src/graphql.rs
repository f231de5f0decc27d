//! GraphQL documents for the event connections and repository metadata.

use repostats::api::{Direction, EventKind};

pub const METADATA_QUERY: &str = r#"query($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    description
    stargazerCount
    createdAt
    forkCount
    isArchived
    diskUsage
    primaryLanguage { name }
    mentionableUsers { totalCount }
    openIssues: issues(states: OPEN) { totalCount }
    issues { totalCount }
    pullRequests { totalCount }
    releases(first: 1, orderBy: {field: CREATED_AT, direction: DESC}) { totalCount nodes { at: createdAt } }
    stargazers(last: 1, orderBy: {field: STARRED_AT, direction: ASC}) { edges { cursor at: starredAt } }
    defaultBranchRef {
      name
      target { ... on Commit { history(first: 1) { totalCount nodes { at: committedDate } } } }
    }
  }
}"#;

pub const RATE_LIMIT_QUERY: &str = "query { rateLimit { limit cost remaining resetAt } }";

/// How a walk direction maps onto a connection's cursor arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    /// `first`/`after` when true, `last`/`before` otherwise.
    pub next: bool,
    /// Edges come back against the walk direction and must be reversed.
    pub reversed: bool,
}

/// Commit history is served newest first, every other connection oldest first.
pub fn paging(kind: EventKind, direction: Direction) -> Paging {
    let newest_first = kind == EventKind::Commits;
    let forward = direction == Direction::Forward;
    Paging {
        next: forward != newest_first,
        reversed: forward == newest_first,
    }
}

/// Page query for `kind`, the connection aliased `connection` and each edge's
/// timestamp aliased `at`.
pub fn event_query(kind: EventKind, paging: Paging) -> String {
    let window = if paging.next {
        "first: $size, after: $cursor"
    } else {
        "last: $size, before: $cursor"
    };
    let page_info = "pageInfo { hasNextPage hasPreviousPage startCursor endCursor }";
    let node_edges = "edges { cursor node { at: createdAt } }";
    let connection = match kind {
        EventKind::Stars => format!(
            "connection: stargazers({}, orderBy: {{field: STARRED_AT, direction: ASC}}) {{ edges {{ cursor at: starredAt }} {} }}",
            window, page_info
        ),
        EventKind::Commits => format!(
            "defaultBranchRef {{ target {{ ... on Commit {{ connection: history({}) {{ edges {{ cursor node {{ at: committedDate }} }} {} }} }} }} }}",
            window, page_info
        ),
        EventKind::Issues => format!(
            "connection: issues({}, orderBy: {{field: CREATED_AT, direction: ASC}}) {{ {} {} }}",
            window, node_edges, page_info
        ),
        EventKind::PullRequests => format!(
            "connection: pullRequests({}, orderBy: {{field: CREATED_AT, direction: ASC}}) {{ {} {} }}",
            window, node_edges, page_info
        ),
        EventKind::Forks => format!(
            "connection: forks({}, orderBy: {{field: CREATED_AT, direction: ASC}}) {{ {} {} }}",
            window, node_edges, page_info
        ),
        EventKind::Releases => format!(
            "connection: releases({}, orderBy: {{field: CREATED_AT, direction: ASC}}) {{ {} {} }}",
            window, node_edges, page_info
        ),
    };
    format!(
        "query($owner: String!, $name: String!, $size: Int!, $cursor: String) {{ repository(owner: $owner, name: $name) {{ {} }} }}",
        connection
    )
}

/// JSON pointer to the aliased connection inside `data`.
pub fn connection_pointer(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Commits => "/repository/defaultBranchRef/target/connection",
        _ => "/repository/connection",
    }
}
