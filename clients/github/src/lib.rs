//! GitHub transport for `repostats`.
//!
//! Metadata and event pages come from the GraphQL API, stars optionally from
//! the REST stargazers endpoint, and dependency manifests from raw content.

use anyhow::anyhow;
use async_trait::async_trait;
use log::debug;
use repostats::api::{
    Error, Event, EventKind, EventSource, ManifestSource, MetadataSource, Page, PageInfo, PageRequest, RateLimit,
    RepoId, RepoSnapshot, Result,
};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use url::Url;

mod builder;
mod graphql;
mod limits;
mod payload;
mod rest;

pub use builder::{GithubClientBuilder, GITHUB_URL, GRAPHQL_URL, RAW_URL};
pub use limits::HeaderLimit;
pub use rest::MAX_REST_PAGE;

use limits::LimitTracker;
use payload::{Connection, GraphqlResponse, RateLimitData, RepositoryData};

pub struct GithubClient {
    client: reqwest::Client,
    github_url: Url,
    graphql_url: Url,
    raw_url: Url,
    rest_stars: bool,
    limits: LimitTracker,
}

pub(crate) fn transport(err: reqwest::Error) -> Error {
    Error::Transport(err.into())
}

/// `base` with `segments` appended to its path, each one percent-encoded.
pub(crate) fn endpoint<'a>(base: &Url, segments: impl IntoIterator<Item = &'a str>) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| Error::Other(anyhow!("{} cannot be a base URL", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

impl GithubClient {
    /// Quota from the rate-limit headers of the most recent response, if any carried them.
    pub async fn last_seen_limits(&self) -> Option<HeaderLimit> {
        self.limits.latest().await
    }

    pub(crate) async fn read_response<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        self.limits.record(response.headers()).await;
        let status = response.status();
        if !status.is_success() {
            let url = response.url().clone();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(format!("{} from {}: {}", status, url, body)));
        }
        response.json::<T>().await.map_err(|err| {
            if err.is_decode() {
                Error::Decode(err.to_string())
            } else {
                transport(err)
            }
        })
    }

    async fn graphql<T: DeserializeOwned>(&self, query: &str, variables: serde_json::Value) -> Result<T> {
        let response = self
            .client
            .post(self.graphql_url.clone())
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(transport)?;
        let response: GraphqlResponse<T> = self.read_response(response).await?;
        if !response.errors.is_empty() {
            let messages: Vec<String> = response.errors.into_iter().map(|error| error.message).collect();
            return Err(Error::Api(messages.join("; ")));
        }
        response
            .data
            .ok_or_else(|| Error::Decode("GraphQL response without data".to_string()))
    }

    async fn graphql_page(&self, repo: &RepoId, kind: EventKind, request: PageRequest) -> Result<Page> {
        let paging = graphql::paging(kind, request.direction);
        let query = graphql::event_query(kind, paging);
        let variables = json!({
            "owner": repo.owner,
            "name": repo.name,
            "size": request.page_size,
            "cursor": request.cursor,
        });
        let mut data: serde_json::Value = self.graphql(&query, variables).await?;
        let connection = data
            .pointer_mut(graphql::connection_pointer(kind))
            .map(serde_json::Value::take)
            .filter(|connection| !connection.is_null())
            .ok_or_else(|| Error::Api(format!("{} has no {} to page through", repo, kind)))?;
        let connection: Connection =
            serde_json::from_value(connection).map_err(|err| Error::Decode(err.to_string()))?;

        let mut events = connection
            .edges
            .into_iter()
            .map(|edge| match edge.timestamp() {
                Some(timestamp) => Ok(Event::new(timestamp, edge.cursor)),
                None => Err(Error::Decode(format!("{} edge {} has no timestamp", kind, edge.cursor))),
            })
            .collect::<Result<Vec<_>>>()?;
        if paging.reversed {
            events.reverse();
        }
        let info = connection.page_info;
        let page_info = if paging.next {
            PageInfo::new(info.has_next_page, info.end_cursor)
        } else {
            PageInfo::new(info.has_previous_page, info.start_cursor)
        };
        debug!("{} {} page: {} events", repo, kind, events.len());
        Ok(Page::new(events, page_info))
    }
}

#[async_trait]
impl EventSource for GithubClient {
    async fn page(&self, repo: &RepoId, kind: EventKind, request: PageRequest) -> Result<Page> {
        if self.rest_stars && kind == EventKind::Stars {
            rest::stargazers_page(self, repo, kind, request).await
        } else {
            self.graphql_page(repo, kind, request).await
        }
    }
}

#[async_trait]
impl MetadataSource for GithubClient {
    async fn snapshot(&self, repo: &RepoId) -> Result<RepoSnapshot> {
        let variables = json!({ "owner": repo.owner, "name": repo.name });
        let data: RepositoryData = self.graphql(graphql::METADATA_QUERY, variables).await?;
        let repository = data
            .repository
            .ok_or_else(|| Error::Api(format!("Could not resolve to a Repository with the name '{}'", repo)))?;
        Ok(repository.into())
    }

    async fn rate_limit(&self) -> Result<RateLimit> {
        let data: RateLimitData = self.graphql(graphql::RATE_LIMIT_QUERY, json!({})).await?;
        Ok(data.rate_limit.into())
    }
}

#[async_trait]
impl ManifestSource for GithubClient {
    async fn manifest(&self, repo: &RepoId, branch: &str, file: &str) -> Result<Option<String>> {
        let segments = [repo.owner.as_str(), repo.name.as_str()]
            .into_iter()
            .chain(branch.split('/'))
            .chain(file.split('/'));
        let url = endpoint(&self.raw_url, segments)?;
        let response = self.client.get(url).send().await.map_err(transport)?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.text().await.map_err(transport)?)),
            status => Err(Error::Api(format!("{} fetching {} of {}", status, file, repo))),
        }
    }
}
