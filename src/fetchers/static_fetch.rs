use crate::error::FetchError;
use crate::fetchers::headers::{self, HeaderTransform, ResourceType};
use crate::results::FetchResult;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, redirect::Policy};
use std::time::{Duration, Instant};

/// Single-request HTML fetcher, no script execution
///
/// Sends one GET per call with browser-like headers. Any 2xx response is a
/// success; everything else is [`FetchError::Unreachable`]. Retries belong to
/// the caller.
pub struct StaticFetcher {
    client: Client,
    user_agent: String,
    transform: Option<HeaderTransform>,
}

impl StaticFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .brotli(true)
            .redirect(Policy::limited(8))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            user_agent: user_agent.to_string(),
            transform: None,
        })
    }

    /// Shape the headers of every request this fetcher sends
    pub fn with_header_transform(mut self, transform: HeaderTransform) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Fetch the raw HTML of `url`
    pub async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError> {
        let start = Instant::now();
        ::log::debug!("Static fetch: {}", url);

        let base = headers::browser_headers(&self.user_agent);
        let shaped = headers::apply(self.transform.as_ref(), ResourceType::Document, &base);

        let response = self
            .client
            .get(url)
            .headers(to_header_map(&shaped))
            .send()
            .await
            .map_err(|e| FetchError::unreachable(url, None, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            ::log::warn!("Static fetch of {} returned {}", url, status);
            return Err(FetchError::unreachable(
                url,
                Some(status.as_u16()),
                status.canonical_reason().unwrap_or("unexpected status"),
            ));
        }

        let html = response
            .text()
            .await
            .map_err(|e| FetchError::unreachable(url, Some(status.as_u16()), e.to_string()))?;

        ::log::debug!(
            "Fetched {} ({} bytes) in {:.2} seconds",
            url,
            html.len(),
            start.elapsed().as_secs_f64()
        );

        Ok(FetchResult::html_only(html))
    }
}

fn to_header_map(headers: &headers::Headers) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => ::log::warn!("Dropping invalid header {}: {}", name, value),
        }
    }
    map
}
