//! In-process browser double for exercising the rendered fetch path.

use crate::error::FetchError;
use crate::fetchers::browser::{BrowserLauncher, BrowserSession, LaunchOptions};
use crate::fetchers::headers::Headers;
use crate::fetchers::rendered::{QUIESCENCE_SCRIPT, SCROLL_BY_SCRIPT, SCROLL_HEIGHT_SCRIPT};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Observations shared between a launcher and all of its sessions
#[derive(Default)]
pub struct MockState {
    pub launches: AtomicUsize,
    pub closes: AtomicUsize,
    pub scroll_ticks: AtomicUsize,
    pub max_open: AtomicUsize,
    open: AtomicUsize,
    pub headers: Mutex<Vec<Headers>>,
    pub visited: Mutex<Vec<String>>,
    pub launch_options: Mutex<Vec<LaunchOptions>>,
}

impl MockState {
    pub fn open_sessions(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
pub struct MockLauncher {
    pub state: Arc<MockState>,
    pub fail_launch: bool,
    pub navigation_delay: Duration,
    /// `None` means the selector never appears
    pub selector_appears_after: Option<Duration>,
    pub scroll_height: u64,
    pub viewport_height: u64,
    pub html: String,
    /// Resource count grows on every readiness poll, so the network never idles
    pub network_busy: bool,
    pub capture_delay: Duration,
    pub fail_capture: bool,
    pub close_delay: Duration,
}

impl Default for MockLauncher {
    fn default() -> Self {
        Self {
            state: Arc::new(MockState::default()),
            fail_launch: false,
            navigation_delay: Duration::ZERO,
            selector_appears_after: Some(Duration::ZERO),
            scroll_height: 2000,
            viewport_height: 800,
            html: "<html><head><title>Rendered</title></head><body><p>from the browser</p></body></html>"
                .to_string(),
            network_busy: false,
            capture_delay: Duration::ZERO,
            fail_capture: false,
            close_delay: Duration::ZERO,
        }
    }
}

impl MockLauncher {
    pub fn with_html(html: &str) -> Self {
        Self {
            html: html.to_string(),
            ..Self::default()
        }
    }
}

pub struct MockSession {
    launcher: MockLauncher,
    navigated_at: Option<tokio::time::Instant>,
    position: u64,
    resource_polls: u64,
}

impl Drop for MockSession {
    // Mirrors the WebDriver client, which ends its session when dropped
    fn drop(&mut self) {
        self.launcher.state.open.fetch_sub(1, Ordering::SeqCst);
    }
}

impl BrowserLauncher for MockLauncher {
    type Session = MockSession;

    async fn launch(&self, options: &LaunchOptions) -> Result<MockSession, FetchError> {
        self.state.launch_options.lock().push(options.clone());
        if self.fail_launch {
            return Err(FetchError::LaunchFailure("no browser available".to_string()));
        }
        self.state.launches.fetch_add(1, Ordering::SeqCst);
        let open = self.state.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_open.fetch_max(open, Ordering::SeqCst);
        Ok(MockSession {
            launcher: self.clone(),
            navigated_at: None,
            position: 0,
            resource_polls: 0,
        })
    }
}

impl BrowserSession for MockSession {
    async fn set_extra_headers(&mut self, headers: &Headers) -> Result<(), FetchError> {
        self.launcher.state.headers.lock().push(headers.clone());
        Ok(())
    }

    async fn goto(&mut self, url: &str) -> Result<(), FetchError> {
        tokio::time::sleep(self.launcher.navigation_delay).await;
        self.launcher.state.visited.lock().push(url.to_string());
        self.navigated_at = Some(tokio::time::Instant::now());
        Ok(())
    }

    async fn execute(&mut self, script: &str, args: Vec<Value>) -> Result<Value, FetchError> {
        if script == QUIESCENCE_SCRIPT {
            if self.launcher.network_busy {
                self.resource_polls += 1;
                return Ok(json!(["complete", self.resource_polls]));
            }
            return Ok(json!(["complete", 3]));
        }
        if script == SCROLL_HEIGHT_SCRIPT {
            return Ok(json!(self.launcher.scroll_height));
        }
        if script == SCROLL_BY_SCRIPT {
            self.launcher.state.scroll_ticks.fetch_add(1, Ordering::SeqCst);
            let step = args.first().and_then(Value::as_u64).unwrap_or(0);
            let max_offset = self
                .launcher
                .scroll_height
                .saturating_sub(self.launcher.viewport_height);
            self.position = (self.position + step).min(max_offset);
            return Ok(json!(self.position + self.launcher.viewport_height));
        }
        Ok(Value::Null)
    }

    async fn has_element(&mut self, _selector: &str) -> Result<bool, FetchError> {
        let (Some(after), Some(navigated_at)) =
            (self.launcher.selector_appears_after, self.navigated_at)
        else {
            return Ok(false);
        };
        Ok(navigated_at.elapsed() >= after)
    }

    async fn source(&mut self) -> Result<String, FetchError> {
        tokio::time::sleep(self.launcher.capture_delay).await;
        if self.launcher.fail_capture {
            return Err(FetchError::Browser("page source unavailable".to_string()));
        }
        Ok(self.launcher.html.clone())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, FetchError> {
        Ok(b"\x89PNG mock".to_vec())
    }

    async fn close(self) -> Result<(), FetchError> {
        tokio::time::sleep(self.launcher.close_delay).await;
        self.launcher.state.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
