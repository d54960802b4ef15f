use crate::error::ConfigError;
use crate::filter::UrlPolicyConfig;
use crate::limiter::RateLimitConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Conventional desktop Chrome user agent
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Configuration for page acquisition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquireConfig {
    /// URL of the WebDriver server used for rendered fetches
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// User agent sent by both fetchers
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Budget for a static fetch in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Default budget for a rendered fetch in milliseconds
    #[serde(default = "default_render_timeout_ms")]
    pub render_timeout_ms: u64,

    /// Browser window size
    #[serde(default)]
    pub viewport: Viewport,

    /// Run the browser without a visible window
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Anti-detection behaviour for rendered fetches
    #[serde(default)]
    pub stealth: StealthConfig,

    /// Result cache sizing
    #[serde(default)]
    pub cache: CacheConfig,

    /// URL allow/block policy
    #[serde(flatten)]
    pub policy: UrlPolicyConfig,

    /// Per-host request limit (disabled when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitConfig>,

    /// Maximum number of browser sessions alive at once
    #[serde(default = "default_max_concurrent_browsers")]
    pub max_concurrent_browsers: usize,

    /// Static pages with less body text than this are re-fetched in a browser
    #[serde(default = "default_min_static_text_len")]
    pub min_static_text_len: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1366,
            height: 768,
        }
    }
}

/// Anti-detection settings: realistic headers, referer injection and scrolling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StealthConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Referer injected on document and XHR requests
    #[serde(default = "default_referer")]
    pub referer: String,

    /// Pixels per scroll tick
    #[serde(default = "default_scroll_step_px")]
    pub scroll_step_px: u32,

    #[serde(default = "default_pause_min_ms")]
    pub pause_min_ms: u64,

    #[serde(default = "default_pause_max_ms")]
    pub pause_max_ms: u64,

    /// Hard cap on scroll ticks
    #[serde(default = "default_max_scroll_ticks")]
    pub max_scroll_ticks: u32,

    /// Hard cap on total scrolling time
    #[serde(default = "default_max_scroll_ms")]
    pub max_scroll_ms: u64,
}

impl Default for StealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            referer: default_referer(),
            scroll_step_px: default_scroll_step_px(),
            pause_min_ms: default_pause_min_ms(),
            pause_max_ms: default_pause_max_ms(),
            max_scroll_ticks: default_max_scroll_ticks(),
            max_scroll_ms: default_max_scroll_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,

    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

fn default_render_timeout_ms() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}

fn default_referer() -> String {
    "https://www.google.com/".to_string()
}

fn default_scroll_step_px() -> u32 {
    400
}

fn default_pause_min_ms() -> u64 {
    100
}

fn default_pause_max_ms() -> u64 {
    300
}

fn default_max_scroll_ticks() -> u32 {
    50
}

fn default_max_scroll_ms() -> u64 {
    10_000
}

fn default_cache_capacity() -> usize {
    100
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_max_concurrent_browsers() -> usize {
    4
}

fn default_min_static_text_len() -> usize {
    200
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            user_agent: default_user_agent(),
            request_timeout_ms: default_request_timeout_ms(),
            render_timeout_ms: default_render_timeout_ms(),
            viewport: Viewport::default(),
            headless: true,
            stealth: StealthConfig::default(),
            cache: CacheConfig::default(),
            policy: UrlPolicyConfig::default(),
            rate_limit: None,
            max_concurrent_browsers: default_max_concurrent_browsers(),
            min_static_text_len: default_min_static_text_len(),
        }
    }
}

impl AcquireConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Override the WebDriver URL with the `WEBDRIVER_URL` environment variable if set
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(webdriver_url) = std::env::var("WEBDRIVER_URL") {
            if !webdriver_url.is_empty() {
                self.webdriver_url = webdriver_url;
            }
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_millis(self.render_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = AcquireConfig::from_json("{}").unwrap();
        assert_eq!(config.webdriver_url, "http://localhost:4444");
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.render_timeout(), Duration::from_secs(30));
        assert_eq!(config.cache.capacity, 100);
        assert!(config.stealth.enabled);
        assert!(config.rate_limit.is_none());
        assert!(config.policy.block_patterns.is_empty());
    }

    #[test]
    fn test_partial_json() {
        let config = AcquireConfig::from_json(
            r#"{
                "request_timeout_ms": 500,
                "stealth": {"scroll_step_px": 800},
                "block_patterns": ["\\.pdf$"],
                "rate_limit": {"max_requests": 5}
            }"#,
        )
        .unwrap();
        assert_eq!(config.request_timeout(), Duration::from_millis(500));
        assert_eq!(config.stealth.scroll_step_px, 800);
        assert_eq!(config.stealth.max_scroll_ticks, 50);
        assert_eq!(config.policy.block_patterns, vec![r"\.pdf$".to_string()]);
        let rate_limit = config.rate_limit.unwrap();
        assert_eq!(rate_limit.max_requests, 5);
        assert_eq!(rate_limit.window_secs, 60);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            AcquireConfig::from_json("{not json"),
            Err(ConfigError::Json(_))
        ));
    }
}
