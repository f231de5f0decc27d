use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::ClientBuilder;
use repostats::api::{Error, Result};
use secrecy::ExposeSecret;
use url::Url;

use crate::limits::LimitTracker;
use crate::{transport, GithubClient};

pub const GITHUB_URL: &str = "https://api.github.com";
pub const GRAPHQL_URL: &str = "https://api.github.com/graphql";
pub const RAW_URL: &str = "https://raw.githubusercontent.com";

pub struct GithubClientBuilder {
    client_builder: ClientBuilder,
    github_url: String,
    graphql_url: String,
    raw_url: String,
    headers: HeaderMap,
    rest_stars: bool,
}

impl Default for GithubClientBuilder {
    fn default() -> Self {
        let mut headers = HeaderMap::default();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("repostats"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/vnd.github.v3+json"));
        Self {
            client_builder: ClientBuilder::default(),
            github_url: GITHUB_URL.to_string(),
            graphql_url: GRAPHQL_URL.to_string(),
            raw_url: RAW_URL.to_string(),
            headers,
            rest_stars: false,
        }
    }
}

impl GithubClientBuilder {
    /// GraphQL requires a token; REST works without one at a much lower quota.
    pub fn try_with_token(self, token: secrecy::SecretString) -> Result<GithubClientBuilder> {
        self.try_with_header(header::AUTHORIZATION, format!("Bearer {}", token.expose_secret()))
    }

    pub fn try_with_user_agent<STR: AsRef<str>>(self, user_agent: STR) -> Result<GithubClientBuilder> {
        self.try_with_header(header::USER_AGENT, user_agent)
    }

    pub fn with_github_url<STR: AsRef<str>>(mut self, url: STR) -> GithubClientBuilder {
        self.github_url = url.as_ref().to_string();
        self
    }

    pub fn with_graphql_url<STR: AsRef<str>>(mut self, url: STR) -> GithubClientBuilder {
        self.graphql_url = url.as_ref().to_string();
        self
    }

    pub fn with_raw_url<STR: AsRef<str>>(mut self, url: STR) -> GithubClientBuilder {
        self.raw_url = url.as_ref().to_string();
        self
    }

    /// Serve stars from the REST stargazers endpoint instead of GraphQL.
    pub fn with_rest_stars(mut self, rest_stars: bool) -> GithubClientBuilder {
        self.rest_stars = rest_stars;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> GithubClientBuilder {
        self.client_builder = self.client_builder.timeout(timeout);
        self
    }

    fn try_with_header(mut self, key: HeaderName, val: impl AsRef<str>) -> Result<GithubClientBuilder> {
        let val = HeaderValue::from_str(val.as_ref()).map_err(|err| Error::Other(err.into()))?;
        self.headers.insert(key, val);
        Ok(self)
    }

    pub fn build(self) -> Result<GithubClient> {
        let client = self
            .client_builder
            .default_headers(self.headers)
            .build()
            .map_err(transport)?;
        Ok(GithubClient {
            client,
            github_url: parse_url(&self.github_url)?,
            graphql_url: parse_url(&self.graphql_url)?,
            raw_url: parse_url(&self.raw_url)?,
            rest_stars: self.rest_stars,
            limits: LimitTracker::default(),
        })
    }
}

fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|err| Error::Other(anyhow::anyhow!("Invalid URL {}: {}", url, err)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_urls() {
        let built = GithubClientBuilder::default().with_github_url("not a url").build();
        assert!(matches!(built, Err(Error::Other(_))));
    }

    #[test]
    fn rejects_tokens_that_are_not_header_safe() {
        let token = secrecy::SecretString::new("line\nbreak".to_string());
        assert!(GithubClientBuilder::default().try_with_token(token).is_err());
    }
}
