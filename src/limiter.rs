use crate::utils::deadline_after;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Fixed-window limits
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed per window
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

fn default_max_requests() -> u32 {
    60
}

fn default_window_secs() -> u64 {
    60
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
        }
    }
}

/// Expired windows are swept once this many keys are tracked
const SWEEP_THRESHOLD: usize = 1024;

struct Window {
    count: u32,
    reset_at: Instant,
}

/// Per-key fixed-window request limiter
///
/// Windows start on the first request for a key and reset lazily once their
/// reset timestamp has passed.
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_window(config.max_requests, Duration::from_secs(config.window_secs))
    }

    pub fn with_window(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Count a request for `key`; on rejection returns the time until the window resets
    pub fn check(&self, key: &str) -> Result<(), Duration> {
        let now = Instant::now();
        let mut windows = self.windows.lock();
        if windows.len() >= SWEEP_THRESHOLD && !windows.contains_key(key) {
            let before = windows.len();
            windows.retain(|_, window| window.reset_at > now);
            ::log::trace!("Swept {} expired rate windows", before - windows.len());
        }

        let window = windows.entry(key.to_string()).or_insert_with(|| Window {
            count: 0,
            reset_at: deadline_after(self.window),
        });

        if window.reset_at <= now {
            window.count = 0;
            window.reset_at = deadline_after(self.window);
        }

        if window.count >= self.max_requests {
            let retry_after = window.reset_at.saturating_duration_since(now);
            ::log::debug!("Rate limit hit for {}, retry after {:?}", key, retry_after);
            return Err(retry_after);
        }

        window.count += 1;
        Ok(())
    }

    /// Requests left in the current window for `key`
    pub fn remaining(&self, key: &str) -> u32 {
        let windows = self.windows.lock();
        match windows.get(key) {
            Some(window) if window.reset_at > Instant::now() => {
                self.max_requests.saturating_sub(window.count)
            }
            _ => self.max_requests,
        }
    }

    pub fn reset(&self, key: &str) {
        self.windows.lock().remove(key);
    }

    /// Number of keys with a window currently held in memory
    pub fn tracked_keys(&self) -> usize {
        self.windows.lock().len()
    }
}
