use crate::config::{AcquireConfig, StealthConfig};
use crate::error::{FetchError, TimeoutStage};
use crate::fetchers::browser::{BrowserLauncher, BrowserSession, LaunchOptions, WebDriverLauncher};
use crate::fetchers::headers::{self, HeaderTransform, ResourceType};
use crate::parsers::html::compile_selector;
use crate::results::FetchResult;
use crate::utils::{deadline_after, remaining_until};
use rand::Rng;
use serde_json::{Value, json};
use std::future::Future;
use std::time::{Duration, Instant};

pub(crate) const QUIESCENCE_SCRIPT: &str =
    "return [document.readyState, performance.getEntriesByType('resource').length];";
pub(crate) const SCROLL_HEIGHT_SCRIPT: &str =
    "return Math.max(document.body ? document.body.scrollHeight : 0, document.documentElement.scrollHeight);";
pub(crate) const SCROLL_BY_SCRIPT: &str =
    "window.scrollBy(0, arguments[0]); return window.scrollY + window.innerHeight;";

/// How often readiness and selector presence are polled
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// The resource count must hold still this long to count as network idle
const NETWORK_IDLE: Duration = Duration::from_millis(500);

/// Upper bound on the idle wait; it also never takes more than half of what is left
const MAX_IDLE_WAIT: Duration = Duration::from_secs(5);

/// Default budget for DOM serialization and the screenshot
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default budget for ending the session
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of the human-like scroll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollReport {
    pub ticks: u32,
    pub position: u64,
    pub target: u64,
}

/// Fetches pages in a real browser to get the post-JavaScript DOM
///
/// Every call launches its own browser session and closes it before
/// returning, whether the call succeeded, failed or timed out.
pub struct RenderedFetcher<L: BrowserLauncher = WebDriverLauncher> {
    launcher: L,
    options: LaunchOptions,
    stealth: StealthConfig,
    transform: Option<HeaderTransform>,
    capture_timeout: Duration,
    close_timeout: Duration,
}

impl RenderedFetcher<WebDriverLauncher> {
    pub fn webdriver(config: &AcquireConfig) -> Self {
        Self::new(WebDriverLauncher, config)
    }
}

impl<L: BrowserLauncher> RenderedFetcher<L> {
    pub fn new(launcher: L, config: &AcquireConfig) -> Self {
        let transform = config
            .stealth
            .enabled
            .then(|| headers::referer_injector(config.stealth.referer.clone()));

        Self {
            launcher,
            options: LaunchOptions::from_config(config),
            stealth: config.stealth.clone(),
            transform,
            capture_timeout: CAPTURE_TIMEOUT,
            close_timeout: CLOSE_TIMEOUT,
        }
    }

    /// Replace the header transformation used for document requests
    pub fn with_header_transform(mut self, transform: HeaderTransform) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Budget for reading the DOM and taking the screenshot
    pub fn with_capture_timeout(mut self, timeout: Duration) -> Self {
        self.capture_timeout = timeout;
        self
    }

    /// Budget for ending the session; past it the session is dropped instead
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Render `url` and capture its DOM and a screenshot
    ///
    /// Waits for network quiescence (best effort, capped) and, when given,
    /// for `wait_selector` to appear. Navigation or selector wait running
    /// past `timeout` fails the call with [`FetchError::Timeout`].
    pub async fn fetch_rendered(
        &self,
        url: &str,
        wait_selector: Option<&str>,
        timeout: Duration,
    ) -> Result<FetchResult, FetchError> {
        if let Some(selector) = wait_selector {
            compile_selector(selector)?;
        }

        let start = Instant::now();
        let deadline = deadline_after(timeout);
        ::log::debug!("Rendered fetch: {} (budget {:?})", url, timeout);

        let options = LaunchOptions {
            page_load_timeout: timeout,
            ..self.options.clone()
        };
        let mut session = match tokio::time::timeout(timeout, self.launcher.launch(&options)).await {
            Ok(session) => session?,
            Err(_) => {
                return Err(FetchError::LaunchFailure(format!(
                    "browser did not start within {:?}",
                    timeout
                )));
            }
        };
        ::log::debug!("Browser session opened for {}", url);

        let outcome = self
            .drive(&mut session, url, wait_selector, timeout, deadline)
            .await;

        // Teardown runs on every path before the outcome propagates
        match tokio::time::timeout(self.close_timeout, session.close()).await {
            Ok(Ok(())) => ::log::debug!("Browser session closed for {}", url),
            Ok(Err(e)) => ::log::warn!("Failed to close browser session for {}: {}", url, e),
            Err(_) => ::log::warn!(
                "Closing the browser session for {} took over {:?}, dropping it",
                url,
                self.close_timeout
            ),
        }

        match &outcome {
            Ok(_) => ::log::debug!(
                "Rendered {} in {:.2} seconds",
                url,
                start.elapsed().as_secs_f64()
            ),
            Err(e) => ::log::warn!("Rendered fetch of {} failed: {}", url, e),
        }
        outcome
    }

    async fn drive(
        &self,
        session: &mut L::Session,
        url: &str,
        wait_selector: Option<&str>,
        timeout: Duration,
        deadline: Instant,
    ) -> Result<FetchResult, FetchError> {
        if self.stealth.enabled {
            let base = headers::browser_headers(&self.options.user_agent);
            let shaped = headers::apply(self.transform.as_ref(), ResourceType::Document, &base);
            match tokio::time::timeout(remaining_until(deadline), session.set_extra_headers(&shaped))
                .await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => ::log::warn!("Could not install request headers: {}", e),
                Err(_) => ::log::warn!("Installing request headers ran out of time"),
            }
        }

        bounded(deadline, timeout, TimeoutStage::Navigation, session.goto(url)).await??;

        let idle_deadline = Instant::now() + (remaining_until(deadline) / 2).min(MAX_IDLE_WAIT);
        wait_for_network_idle(session, idle_deadline).await;

        if let Some(selector) = wait_selector {
            wait_for_selector(session, selector, timeout, deadline).await?;
        }

        if self.stealth.enabled {
            let report = human_scroll(session, &self.stealth, deadline).await;
            ::log::debug!(
                "Scrolled {} to {} of {} px in {} ticks",
                url,
                report.position,
                report.target,
                report.ticks
            );
        }

        let capture_deadline = deadline_after(self.capture_timeout);
        let html = bounded(
            capture_deadline,
            self.capture_timeout,
            TimeoutStage::Capture,
            session.source(),
        )
        .await??;
        let screenshot = bounded(
            capture_deadline,
            self.capture_timeout,
            TimeoutStage::Capture,
            session.screenshot(),
        )
        .await??;

        Ok(FetchResult {
            html,
            screenshot: Some(screenshot),
        })
    }
}

/// Run `future` until `deadline`, mapping expiry to a timeout for `stage`
async fn bounded<T, F>(
    deadline: Instant,
    budget: Duration,
    stage: TimeoutStage,
    future: F,
) -> Result<T, FetchError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(remaining_until(deadline), future)
        .await
        .map_err(|_| FetchError::Timeout { stage, budget })
}

/// Poll until the document is complete and the resource count holds still
///
/// Reaching the deadline here is not an error; the caller continues with
/// whatever has loaded.
async fn wait_for_network_idle<S: BrowserSession>(session: &mut S, deadline: Instant) {
    let mut last_count: Option<u64> = None;
    let mut stable_since = Instant::now();

    loop {
        let remaining = remaining_until(deadline);
        if remaining.is_zero() {
            ::log::debug!("Network did not go idle in time, continuing");
            return;
        }

        let state = match tokio::time::timeout(remaining, session.execute(QUIESCENCE_SCRIPT, vec![]))
            .await
        {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                ::log::debug!("Readiness probe failed, skipping idle wait: {}", e);
                return;
            }
            Err(_) => return,
        };

        let ready = state[0].as_str() == Some("complete");
        let count = state[1].as_u64();

        if count != last_count {
            last_count = count;
            stable_since = Instant::now();
        } else if ready && stable_since.elapsed() >= NETWORK_IDLE {
            return;
        }

        tokio::time::sleep(POLL_INTERVAL.min(remaining_until(deadline))).await;
    }
}

/// Block until `selector` matches, failing with a timeout at the deadline
///
/// The DOM is always checked at least once, even when the deadline has
/// already passed.
async fn wait_for_selector<S: BrowserSession>(
    session: &mut S,
    selector: &str,
    budget: Duration,
    deadline: Instant,
) -> Result<(), FetchError> {
    let timed_out = || FetchError::Timeout {
        stage: TimeoutStage::Selector,
        budget,
    };

    loop {
        let probe_budget = remaining_until(deadline).max(POLL_INTERVAL);
        match tokio::time::timeout(probe_budget, session.has_element(selector)).await {
            Ok(Ok(true)) => {
                ::log::debug!("Selector {} appeared", selector);
                return Ok(());
            }
            Ok(Ok(false)) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(timed_out()),
        }

        let remaining = remaining_until(deadline);
        if remaining.is_zero() {
            return Err(timed_out());
        }
        tokio::time::sleep(POLL_INTERVAL.min(remaining)).await;
    }
}

/// Scroll down in fixed steps with jittered pauses to trigger lazy loading
///
/// The target height is read once up front. The loop stops at the first of:
/// target reached, position no longer advancing, tick cap, scroll time cap,
/// or the call deadline. Script failures end scrolling early.
pub(crate) async fn human_scroll<S: BrowserSession>(
    session: &mut S,
    stealth: &StealthConfig,
    deadline: Instant,
) -> ScrollReport {
    let scroll_deadline = deadline.min(deadline_after(Duration::from_millis(stealth.max_scroll_ms)));
    let mut report = ScrollReport {
        ticks: 0,
        position: 0,
        target: 0,
    };

    report.target = match tokio::time::timeout(
        remaining_until(scroll_deadline),
        session.execute(SCROLL_HEIGHT_SCRIPT, vec![]),
    )
    .await
    {
        Ok(Ok(value)) => as_pixels(&value),
        Ok(Err(e)) => {
            ::log::debug!("Could not read scroll height: {}", e);
            return report;
        }
        Err(_) => return report,
    };

    while report.position < report.target
        && report.ticks < stealth.max_scroll_ticks
        && !remaining_until(scroll_deadline).is_zero()
    {
        let step = json!(stealth.scroll_step_px);
        let reached = match tokio::time::timeout(
            remaining_until(scroll_deadline),
            session.execute(SCROLL_BY_SCRIPT, vec![step]),
        )
        .await
        {
            Ok(Ok(value)) => as_pixels(&value),
            Ok(Err(e)) => {
                ::log::debug!("Scroll step failed: {}", e);
                break;
            }
            Err(_) => break,
        };
        report.ticks += 1;

        if reached <= report.position {
            break;
        }
        report.position = reached;

        let pause = jitter(stealth.pause_min_ms, stealth.pause_max_ms);
        tokio::time::sleep(pause.min(remaining_until(scroll_deadline))).await;
    }

    report
}

fn as_pixels(value: &Value) -> u64 {
    value.as_f64().map(|v| v.max(0.0) as u64).unwrap_or(0)
}

fn jitter(min_ms: u64, max_ms: u64) -> Duration {
    let (low, high) = if min_ms <= max_ms {
        (min_ms, max_ms)
    } else {
        (max_ms, min_ms)
    };
    Duration::from_millis(rand::thread_rng().gen_range(low..=high))
}
