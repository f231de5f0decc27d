use repostats::api::{
    Direction, Error, EventKind, EventSource, ManifestSource, MetadataSource, PageRequest, RepoId,
};
use repostats_github_client::{GithubClient, GithubClientBuilder, HeaderLimit, MAX_REST_PAGE};
use wiremock::http::Method;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

/// POST to `/graphql` whose body contains `fragment`.
pub struct GraphqlMatcher(&'static str);

impl Match for GraphqlMatcher {
    fn matches(&self, request: &Request) -> bool {
        request.method == Method::Post
            && request.url.path() == "/graphql"
            && String::from_utf8_lossy(&request.body).contains(self.0)
    }
}

/// GET of a stargazers page numbered above `self.0`.
pub struct PageAbove(u64);

impl Match for PageAbove {
    fn matches(&self, request: &Request) -> bool {
        request.method == Method::Get
            && request.url.path().ends_with("/stargazers")
            && request
                .url
                .query_pairs()
                .any(|(key, value)| key == "page" && value.parse::<u64>().map_or(false, |page| page > self.0))
    }
}

fn client(server: &MockServer) -> GithubClient {
    GithubClientBuilder::default()
        .with_github_url(server.uri())
        .with_graphql_url(format!("{}/graphql", server.uri()))
        .with_raw_url(server.uri())
        .build()
        .unwrap()
}

fn repo() -> RepoId {
    "owner/repo".parse().unwrap()
}

fn json(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_string(), "application/json")
}

#[tokio::test]
async fn backward_star_pages_are_newest_first() {
    let server = MockServer::start().await;
    Mock::given(GraphqlMatcher("connection: stargazers(last: $size, before: $cursor"))
        .respond_with(json(
            r#"{ "data": { "repository": { "connection": {
                "edges": [
                    { "cursor": "c1", "at": "2024-05-01T10:00:00Z" },
                    { "cursor": "c2", "at": "2024-05-02T10:00:00Z" }
                ],
                "pageInfo": { "hasNextPage": false, "hasPreviousPage": true, "startCursor": "c1", "endCursor": "c2" }
            } } } }"#,
        ))
        .mount(&server)
        .await;

    let page = client(&server)
        .page(&repo(), EventKind::Stars, PageRequest::new(None, 100, Direction::Backward))
        .await
        .unwrap();
    let cursors: Vec<&str> = page.events.iter().map(|event| event.cursor.as_str()).collect();
    assert_eq!(cursors, vec!["c2", "c1"]);
    assert!(page.page_info.has_more);
    assert_eq!(page.page_info.cursor.as_deref(), Some("c1"));
}

#[tokio::test]
async fn backward_commit_pages_use_the_next_page_protocol() {
    let server = MockServer::start().await;
    Mock::given(GraphqlMatcher("connection: history(first: $size, after: $cursor)"))
        .respond_with(json(
            r#"{ "data": { "repository": { "defaultBranchRef": { "target": { "connection": {
                "edges": [
                    { "cursor": "h1", "node": { "at": "2024-05-03T10:00:00Z" } },
                    { "cursor": "h2", "node": { "at": "2024-05-02T10:00:00Z" } }
                ],
                "pageInfo": { "hasNextPage": true, "hasPreviousPage": false, "startCursor": "h1", "endCursor": "h2" }
            } } } } } }"#,
        ))
        .mount(&server)
        .await;

    let page = client(&server)
        .page(&repo(), EventKind::Commits, PageRequest::new(None, 100, Direction::Backward))
        .await
        .unwrap();
    assert!(page.events[0].timestamp > page.events[1].timestamp);
    assert_eq!(page.page_info.cursor.as_deref(), Some("h2"));
}

#[tokio::test]
async fn graphql_errors_become_api_errors() {
    let server = MockServer::start().await;
    Mock::given(GraphqlMatcher("stargazerCount"))
        .respond_with(json(
            r#"{ "data": { "repository": null },
                 "errors": [{ "type": "NOT_FOUND", "message": "Could not resolve to a Repository with the name 'owner/repo'." }] }"#,
        ))
        .mount(&server)
        .await;

    let result = client(&server).snapshot(&repo()).await;
    assert!(matches!(result, Err(Error::Api(message)) if message.contains("Could not resolve")));
}

#[tokio::test]
async fn rate_limit_query_and_headers() {
    let server = MockServer::start().await;
    Mock::given(GraphqlMatcher("rateLimit"))
        .respond_with(
            json(r#"{ "data": { "rateLimit": { "limit": 5000, "cost": 1, "remaining": 4321, "resetAt": "2024-05-01T11:00:00Z" } } }"#)
                .insert_header("x-ratelimit-limit", "5000")
                .insert_header("x-ratelimit-remaining", "4321")
                .insert_header("x-ratelimit-reset", "1714561200"),
        )
        .mount(&server)
        .await;

    let client = client(&server);
    let limit = client.rate_limit().await.unwrap();
    assert_eq!(limit.remaining, 4321);
    assert_eq!(client.last_seen_limits().await, Some(HeaderLimit::new(5000, 4321, 1714561200)));
}

#[tokio::test]
async fn rest_stars_walk_back_from_the_last_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/owner/repo"))
        .respond_with(json(r#"{ "stargazers_count": 150 }"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/owner/repo/stargazers"))
        .and(query_param("page", "2"))
        .and(query_param("per_page", "100"))
        .respond_with(json(
            r#"[
                { "starred_at": "2024-05-01T10:00:00Z", "user": { "login": "alice" } },
                { "starred_at": "2024-05-02T10:00:00Z", "user": { "login": "bob" } }
            ]"#,
        ))
        .mount(&server)
        .await;

    let client = GithubClientBuilder::default()
        .with_github_url(server.uri())
        .with_rest_stars(true)
        .build()
        .unwrap();
    let page = client
        .page(&repo(), EventKind::Stars, PageRequest::new(None, 100, Direction::Backward))
        .await
        .unwrap();
    let cursors: Vec<&str> = page.events.iter().map(|event| event.cursor.as_str()).collect();
    assert_eq!(cursors, vec!["bob", "alice"]);
    assert!(page.page_info.has_more);
    assert_eq!(page.page_info.cursor.as_deref(), Some("1"));
}

#[tokio::test]
async fn missing_manifest_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/owner/repo/main/go.mod"))
        .respond_with(ResponseTemplate::new(200).set_body_string("module example.com/demo\n"))
        .mount(&server)
        .await;

    let client = client(&server);
    let found = client.manifest(&repo(), "main", "go.mod").await.unwrap();
    assert_eq!(found.as_deref(), Some("module example.com/demo\n"));
    let missing = client.manifest(&repo(), "main", "Cargo.toml").await.unwrap();
    assert!(missing.is_none());
}

fn rest_client(server: &MockServer) -> GithubClient {
    GithubClientBuilder::default()
        .with_github_url(server.uri())
        .with_rest_stars(true)
        .build()
        .unwrap()
}

#[tokio::test]
async fn rest_stars_never_go_past_the_page_limit() {
    let server = MockServer::start().await;
    Mock::given(PageAbove(MAX_REST_PAGE))
        .respond_with(ResponseTemplate::new(422))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/owner/repo"))
        .respond_with(json(r#"{ "stargazers_count": 50000 }"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/owner/repo/stargazers"))
        .and(query_param("page", "400"))
        .respond_with(json(
            r#"[{ "starred_at": "2021-02-01T10:00:00Z", "user": { "login": "carol" } }]"#,
        ))
        .mount(&server)
        .await;

    let client = rest_client(&server);
    let backward = client
        .page(&repo(), EventKind::Stars, PageRequest::new(None, 100, Direction::Backward))
        .await
        .unwrap();
    assert_eq!(backward.events.len(), 1);
    assert_eq!(backward.page_info.cursor.as_deref(), Some("399"));

    let forward = client
        .page(
            &repo(),
            EventKind::Stars,
            PageRequest::new(Some("401".to_string()), 100, Direction::Forward),
        )
        .await
        .unwrap();
    assert!(forward.events.is_empty());
}

#[tokio::test]
async fn rest_forward_walk_ends_at_the_page_limit() {
    let server = MockServer::start().await;
    let full_page: Vec<String> = (0..100)
        .map(|i| format!(r#"{{ "starred_at": "2021-02-01T10:00:00Z", "user": {{ "login": "user{}" }} }}"#, i))
        .collect();
    Mock::given(method("GET"))
        .and(path("/repos/owner/repo/stargazers"))
        .and(query_param("page", "400"))
        .respond_with(json(&format!("[{}]", full_page.join(","))))
        .mount(&server)
        .await;

    let page = rest_client(&server)
        .page(
            &repo(),
            EventKind::Stars,
            PageRequest::new(Some("400".to_string()), 100, Direction::Forward),
        )
        .await
        .unwrap();
    assert_eq!(page.events.len(), 100);
    assert!(!page.page_info.has_more);
}
