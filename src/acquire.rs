//! Page acquisition pipeline.
//!
//! An [`Acquirer`] ties the fetchers to the normalizer, the result cache, the
//! URL policy and the rate limiter. Every request runs the same steps:
//! parse the URL, check policy, count against the host's rate limit, look in
//! the cache, fetch, normalize and store.

use crate::cache::{ResultCache, cache_key};
use crate::config::AcquireConfig;
use crate::error::{ConfigError, FetchError};
use crate::fetchers::browser::{BrowserLauncher, WebDriverLauncher};
use crate::fetchers::headers::HeaderTransform;
use crate::fetchers::rendered::RenderedFetcher;
use crate::fetchers::static_fetch::StaticFetcher;
use crate::filter::UrlPolicy;
use crate::limiter::RateLimiter;
use crate::parsers::{self, text::looks_script_driven};
use crate::results::{ExtractedElement, NormalizedPage, PageSnapshot};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use url::Url;

/// How a page should be fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Plain HTTP request, no script execution; rendered instead when a selector is awaited
    Static,
    /// Full browser session
    Rendered,
    /// Static first, rendered when a selector is awaited or the page looks script-driven
    #[default]
    Auto,
}

impl Strategy {
    fn cache_class(self) -> &'static str {
        match self {
            Strategy::Static => "static",
            Strategy::Rendered => "rendered",
            Strategy::Auto => "auto",
        }
    }
}

/// One acquisition request
#[derive(Debug, Clone, Default)]
pub struct AcquireRequest {
    pub url: String,
    pub wait_selector: Option<String>,
    pub strategy: Strategy,
    /// Budget for a rendered fetch; the configured default when absent
    pub timeout: Option<Duration>,
}

impl AcquireRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn wait_for(mut self, selector: impl Into<String>) -> Self {
        self.wait_selector = Some(selector.into());
        self
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Fetches, normalizes and caches pages
pub struct Acquirer<L: BrowserLauncher = WebDriverLauncher> {
    config: AcquireConfig,
    static_fetcher: StaticFetcher,
    rendered_fetcher: RenderedFetcher<L>,
    cache: Arc<ResultCache<PageSnapshot>>,
    policy: Arc<UrlPolicy>,
    limiter: Option<Arc<RateLimiter>>,
    browsers: Arc<Semaphore>,
}

impl Acquirer<WebDriverLauncher> {
    /// Build an acquirer that renders through the configured WebDriver server
    pub fn new(config: AcquireConfig) -> Result<Self, ConfigError> {
        let static_fetcher = StaticFetcher::new(&config.user_agent, config.request_timeout())?;
        let policy = UrlPolicy::new(config.policy.clone())?;
        let cache = ResultCache::new(config.cache.capacity, config.cache_ttl());
        let limiter = config.rate_limit.map(|limits| Arc::new(RateLimiter::new(limits)));

        Ok(Self {
            rendered_fetcher: RenderedFetcher::webdriver(&config),
            static_fetcher,
            cache: Arc::new(cache),
            policy: Arc::new(policy),
            limiter,
            browsers: Arc::new(Semaphore::new(config.max_concurrent_browsers.max(1))),
            config,
        })
    }
}

impl<L: BrowserLauncher> Acquirer<L> {
    /// Swap the browser backend
    pub fn with_launcher<M: BrowserLauncher>(self, launcher: M) -> Acquirer<M> {
        Acquirer {
            rendered_fetcher: RenderedFetcher::new(launcher, &self.config),
            config: self.config,
            static_fetcher: self.static_fetcher,
            cache: self.cache,
            policy: self.policy,
            limiter: self.limiter,
            browsers: self.browsers,
        }
    }

    /// Share a cache with other acquirers
    pub fn with_cache(mut self, cache: Arc<ResultCache<PageSnapshot>>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_policy(mut self, policy: Arc<UrlPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Shape outbound headers for both fetchers
    pub fn with_header_transform(mut self, transform: HeaderTransform) -> Self {
        self.static_fetcher = self.static_fetcher.with_header_transform(transform.clone());
        self.rendered_fetcher = self.rendered_fetcher.with_header_transform(transform);
        self
    }

    pub fn cache(&self) -> &Arc<ResultCache<PageSnapshot>> {
        &self.cache
    }

    /// Fetch and normalize a page, choosing the fetch method automatically
    pub async fn fetch(
        &self,
        url: &str,
        wait_selector: Option<&str>,
    ) -> Result<NormalizedPage, FetchError> {
        let mut request = AcquireRequest::new(url);
        request.wait_selector = wait_selector.map(str::to_string);
        Ok(self.acquire(request).await?.page)
    }

    /// Fetch a page in a browser and keep its screenshot
    pub async fn fetch_rendered(
        &self,
        url: &str,
        wait_selector: Option<&str>,
        timeout: Duration,
    ) -> Result<PageSnapshot, FetchError> {
        let mut request = AcquireRequest::new(url)
            .strategy(Strategy::Rendered)
            .timeout(timeout);
        request.wait_selector = wait_selector.map(str::to_string);
        self.acquire(request).await
    }

    /// Run the full pipeline for one request
    pub async fn acquire(&self, request: AcquireRequest) -> Result<PageSnapshot, FetchError> {
        let url = Url::parse(&request.url)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", request.url, e)))?;

        if !self.policy.is_allowed(&url) {
            return Err(FetchError::Blocked(request.url));
        }

        if let Some(limiter) = &self.limiter {
            let host = url.host_str().unwrap_or_default();
            limiter.check(host).map_err(FetchError::RateLimited)?;
        }

        let wait_selector = request.wait_selector.as_deref();
        // Only a browser can wait for a selector
        let strategy = match (request.strategy, wait_selector) {
            (Strategy::Auto, Some(_)) => Strategy::Rendered,
            (Strategy::Static, Some(selector)) => {
                ::log::debug!("Waiting for {} needs a browser, rendering {}", selector, url);
                Strategy::Rendered
            }
            (strategy, _) => strategy,
        };
        let key = format!(
            "{}:{}",
            strategy.cache_class(),
            cache_key(url.as_str(), wait_selector)
        );

        if let Some(snapshot) = self.cache.get(&key) {
            ::log::debug!("Cache hit: {}", key);
            return Ok(snapshot);
        }

        let timeout = request
            .timeout
            .unwrap_or_else(|| self.config.render_timeout());
        let snapshot = match strategy {
            Strategy::Static => self.fetch_static(url.as_str()).await?,
            Strategy::Rendered => self.render(url.as_str(), wait_selector, timeout).await?,
            Strategy::Auto => self.fetch_auto(url.as_str(), timeout).await?,
        };

        self.cache.insert(key, snapshot.clone());
        Ok(snapshot)
    }

    /// Select elements from already fetched markup
    pub fn extract(&self, html: &str, selector: &str) -> Result<Vec<ExtractedElement>, FetchError> {
        parsers::extract(html, selector)
    }

    /// Fetch several pages concurrently, results in input order
    pub async fn fetch_many(&self, urls: &[String]) -> Vec<Result<NormalizedPage, FetchError>> {
        ::log::info!("Fetching {} pages", urls.len());
        join_all(urls.iter().map(|url| self.fetch(url, None))).await
    }

    async fn fetch_static(&self, url: &str) -> Result<PageSnapshot, FetchError> {
        let fetched = self.static_fetcher.fetch(url).await?;
        Ok(PageSnapshot {
            page: parsers::normalize(&fetched.html),
            screenshot: None,
            rendered: false,
        })
    }

    async fn render(
        &self,
        url: &str,
        wait_selector: Option<&str>,
        timeout: Duration,
    ) -> Result<PageSnapshot, FetchError> {
        let _permit = self
            .browsers
            .acquire()
            .await
            .map_err(|_| FetchError::LaunchFailure("browser pool closed".to_string()))?;

        let fetched = self
            .rendered_fetcher
            .fetch_rendered(url, wait_selector, timeout)
            .await?;
        Ok(PageSnapshot {
            page: parsers::normalize(&fetched.html),
            screenshot: fetched.screenshot,
            rendered: true,
        })
    }

    /// Static fetch, re-rendered when the result looks like an empty script shell
    ///
    /// A failed re-render falls back to the static page.
    async fn fetch_auto(&self, url: &str, timeout: Duration) -> Result<PageSnapshot, FetchError> {
        let snapshot = self.fetch_static(url).await?;
        if !looks_script_driven(
            &snapshot.page.html,
            &snapshot.page.body_text,
            self.config.min_static_text_len,
        ) {
            return Ok(snapshot);
        }

        ::log::info!("{} looks script-driven, rendering in a browser", url);
        match self.render(url, None, timeout).await {
            Ok(rendered) => Ok(rendered),
            Err(e) => {
                ::log::warn!("Rendering {} failed, keeping static result: {}", url, e);
                Ok(snapshot)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::fetchers::mock::MockLauncher;
    use crate::filter::UrlPolicyConfig;
    use httpmock::prelude::*;
    use std::sync::atomic::Ordering;

    const LONG_PAGE: &str = "<html><head><title>Static</title></head><body><p>\
        Plenty of server rendered text lives here so that the page does not look like an \
        empty shell. It goes on for a while, describing things in enough detail to clear the \
        minimum text length that triggers a browser render.</p></body></html>";

    fn config() -> AcquireConfig {
        let mut config = AcquireConfig::default();
        config.stealth.pause_min_ms = 1;
        config.stealth.pause_max_ms = 2;
        config
    }

    fn acquirer(launcher: MockLauncher) -> Acquirer<MockLauncher> {
        Acquirer::new(config()).unwrap().with_launcher(launcher)
    }

    #[tokio::test]
    async fn test_static_page_is_cached() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/article");
                then.status(200).body(LONG_PAGE);
            })
            .await;

        let launcher = MockLauncher::default();
        let state = launcher.state.clone();
        let acquirer = acquirer(launcher);
        let url = server.url("/article");

        let first = acquirer.fetch(&url, None).await.unwrap();
        let second = acquirer.fetch(&url, None).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.title, "Static");
        assert_eq!(mock.hits_async().await, 1);
        assert_eq!(state.launches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_auto_falls_back_to_browser_for_script_shell() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/app");
                then.status(200)
                    .body("<html><body><div id=\"root\"></div></body></html>");
            })
            .await;

        let launcher = MockLauncher::default();
        let state = launcher.state.clone();
        let acquirer = acquirer(launcher);

        let snapshot = acquirer
            .acquire(AcquireRequest::new(server.url("/app")))
            .await
            .unwrap();

        assert!(snapshot.rendered);
        assert_eq!(snapshot.page.body_text, "from the browser");
        assert!(snapshot.screenshot.is_some());
        assert_eq!(state.launches.load(Ordering::SeqCst), 1);
        assert_eq!(state.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_auto_keeps_static_result_when_render_fails() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/app");
                then.status(200).body("<html><body><p>short</p></body></html>");
            })
            .await;

        let launcher = MockLauncher {
            fail_launch: true,
            ..MockLauncher::default()
        };
        let snapshot = acquirer(launcher)
            .acquire(AcquireRequest::new(server.url("/app")))
            .await
            .unwrap();

        assert!(!snapshot.rendered);
        assert_eq!(snapshot.page.body_text, "short");
    }

    #[tokio::test]
    async fn test_wait_selector_forces_render() {
        let launcher = MockLauncher::with_html(
            "<html><body><ul class=\"items\"><li>a</li><li>b</li></ul></body></html>",
        );
        let state = launcher.state.clone();
        let acquirer = acquirer(launcher);

        let page = acquirer
            .fetch("https://example.com/list", Some(".items"))
            .await
            .unwrap();
        assert_eq!(page.body_text, "a b");
        assert_eq!(state.launches.load(Ordering::SeqCst), 1);

        let items = acquirer.extract(&page.html, ".items li").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].text, "b");
    }

    #[tokio::test]
    async fn test_static_with_wait_selector_is_rendered() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/page");
                then.status(200).body(LONG_PAGE);
            })
            .await;

        let launcher = MockLauncher::default();
        let state = launcher.state.clone();
        let acquirer = acquirer(launcher);

        let snapshot = acquirer
            .acquire(
                AcquireRequest::new(server.url("/page"))
                    .strategy(Strategy::Static)
                    .wait_for("p"),
            )
            .await
            .unwrap();

        assert!(snapshot.rendered);
        assert_eq!(state.launches.load(Ordering::SeqCst), 1);
        assert_eq!(mock.hits_async().await, 0);
    }

    #[tokio::test]
    async fn test_rendered_and_static_cache_entries_are_separate() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/page");
                then.status(200).body(LONG_PAGE);
            })
            .await;

        let launcher = MockLauncher::default();
        let state = launcher.state.clone();
        let acquirer = acquirer(launcher);
        let url = server.url("/page");

        let rendered = acquirer
            .fetch_rendered(&url, None, Duration::from_secs(5))
            .await
            .unwrap();
        assert!(rendered.rendered);
        assert_eq!(
            rendered.screenshot_data_uri().as_deref(),
            Some("data:image/png;base64,iVBORyBtb2Nr")
        );

        let fetched = acquirer
            .acquire(AcquireRequest::new(&url).strategy(Strategy::Static))
            .await
            .unwrap();
        assert!(!fetched.rendered);
        assert_eq!(mock.hits_async().await, 1);

        acquirer
            .fetch_rendered(&url, None, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(state.launches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_browser_sessions_are_bounded() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(200).body("<html><body>Loading...</body></html>");
            })
            .await;

        let launcher = MockLauncher::default();
        let state = launcher.state.clone();
        let mut config = config();
        config.max_concurrent_browsers = 2;
        let acquirer = Acquirer::new(config).unwrap().with_launcher(launcher);

        let urls: Vec<String> = (0..4).map(|i| server.url(format!("/spa/{i}"))).collect();
        let results = acquirer.fetch_many(&urls).await;

        assert!(results.iter().all(Result::is_ok));
        assert_eq!(state.launches.load(Ordering::SeqCst), 4);
        assert!(state.max_open.load(Ordering::SeqCst) <= 2);
        assert_eq!(state.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_policy_blocks_before_fetching() {
        let policy = UrlPolicy::new(UrlPolicyConfig {
            block_patterns: vec![r"\.pdf$".to_string()],
            ..UrlPolicyConfig::default()
        })
        .unwrap();
        let acquirer = acquirer(MockLauncher::default()).with_policy(Arc::new(policy));

        let err = acquirer
            .fetch("https://example.com/report.pdf", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Blocked);

        let err = acquirer.fetch("not a url", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidUrl);
    }

    #[tokio::test]
    async fn test_rate_limit_per_host() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(200).body(LONG_PAGE);
            })
            .await;

        let limiter = Arc::new(RateLimiter::with_window(1, Duration::from_secs(60)));
        let acquirer = acquirer(MockLauncher::default()).with_rate_limiter(limiter);

        acquirer.fetch(&server.url("/one"), None).await.unwrap();
        let err = acquirer.fetch(&server.url("/two"), None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimited);
    }

    #[tokio::test]
    async fn test_unreachable_page_is_not_cached() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/gone");
                then.status(500);
            })
            .await;

        let acquirer = acquirer(MockLauncher::default());
        let url = server.url("/gone");
        for _ in 0..2 {
            let err = acquirer.fetch(&url, None).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Unreachable);
        }
        assert_eq!(mock.hits_async().await, 2);
        assert_eq!(acquirer.cache().stats().size, 0);
    }
}
