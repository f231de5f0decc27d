use std::str::FromStr;

use derive_more::Constructor;
use log::debug;
use repostats::api::{Error, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use tokio::sync::Mutex;

/// Quota reported by the `x-ratelimit-*` headers of the last response.
#[derive(Constructor, Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderLimit {
    pub limit: u32,
    pub remaining: u32,
    pub reset: i64,
}

/// Keeps the most recent quota seen on any response. Nothing waits on it.
#[derive(Default)]
pub struct LimitTracker {
    latest: Mutex<Option<HeaderLimit>>,
}

impl LimitTracker {
    pub async fn latest(&self) -> Option<HeaderLimit> {
        *self.latest.lock().await
    }

    /// Responses without the headers (raw content, mocks) are ignored.
    pub(crate) async fn record(&self, headers: &HeaderMap<HeaderValue>) {
        let limit = match read_limit(headers) {
            Ok(limit) => limit,
            Err(_) => return,
        };
        let mut latest = self.latest.lock().await;
        let merged = match *latest {
            // Concurrent responses may arrive out of order: keep the lowest remaining for a reset window.
            Some(previous) if previous.reset == limit.reset => HeaderLimit {
                remaining: previous.remaining.min(limit.remaining),
                ..limit
            },
            _ => limit,
        };
        debug!("Updated limits: {:?}", merged);
        *latest = Some(merged);
    }
}

fn read_limit(headers: &HeaderMap<HeaderValue>) -> Result<HeaderLimit> {
    Ok(HeaderLimit::new(
        read_header(headers, "x-ratelimit-limit")?,
        read_header(headers, "x-ratelimit-remaining")?,
        read_header(headers, "x-ratelimit-reset")?,
    ))
}

fn read_header<T: FromStr>(headers: &HeaderMap<HeaderValue>, header: &str) -> Result<T> {
    let value = headers
        .get(header)
        .ok_or_else(|| Error::Decode(format!("Header {} not found", header)))?
        .to_str()
        .map_err(|err| Error::Decode(format!("Header {}: {}", header, err)))?;
    value
        .parse::<T>()
        .map_err(|_| Error::Decode(format!("Header {} has unexpected value {}", header, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(limit: &str, remaining: &str, reset: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-limit", HeaderValue::from_str(limit).unwrap());
        headers.insert("x-ratelimit-remaining", HeaderValue::from_str(remaining).unwrap());
        headers.insert("x-ratelimit-reset", HeaderValue::from_str(reset).unwrap());
        headers
    }

    #[tokio::test]
    async fn keeps_lowest_remaining_within_a_window() {
        let tracker = LimitTracker::default();
        tracker.record(&headers("5000", "4990", "1700000000")).await;
        tracker.record(&headers("5000", "4995", "1700000000")).await;
        assert_eq!(tracker.latest().await, Some(HeaderLimit::new(5000, 4990, 1700000000)));

        tracker.record(&headers("5000", "4999", "1700003600")).await;
        assert_eq!(tracker.latest().await, Some(HeaderLimit::new(5000, 4999, 1700003600)));
    }

    #[tokio::test]
    async fn ignores_responses_without_headers() {
        let tracker = LimitTracker::default();
        tracker.record(&HeaderMap::new()).await;
        tracker.record(&headers("5000", "many", "1700000000")).await;
        assert_eq!(tracker.latest().await, None);
    }
}
