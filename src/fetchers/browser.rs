//! Browser session seam.
//!
//! A [`BrowserLauncher`] starts one isolated browser per call and hands back
//! a [`BrowserSession`] that owns it. Sessions are never shared: closing the
//! session tears the browser down.

use crate::config::{AcquireConfig, Viewport};
use crate::error::FetchError;
use crate::fetchers::headers::Headers;
use fantoccini::wd::WebDriverCompatibleCommand;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{Value, json};
use std::future::Future;
use std::time::Duration;

/// Settings for starting a browser
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub webdriver_url: String,
    pub user_agent: String,
    pub viewport: Viewport,
    pub headless: bool,
    /// Hide the usual automation fingerprints
    pub stealth: bool,
    /// Driver-side limit on page loads and scripts, so an abandoned
    /// navigation cannot hold the session past the caller's budget
    pub page_load_timeout: Duration,
}

impl LaunchOptions {
    pub fn from_config(config: &AcquireConfig) -> Self {
        Self {
            webdriver_url: config.webdriver_url.clone(),
            user_agent: config.user_agent.clone(),
            viewport: config.viewport,
            headless: config.headless,
            stealth: config.stealth.enabled,
            page_load_timeout: config.render_timeout(),
        }
    }
}

/// Starts browser sessions
pub trait BrowserLauncher: Send + Sync {
    type Session: BrowserSession;

    /// Start a fresh browser; failures are [`FetchError::LaunchFailure`]
    fn launch(
        &self,
        options: &LaunchOptions,
    ) -> impl Future<Output = Result<Self::Session, FetchError>> + Send;
}

/// One live browser, exclusively owned by a single fetch
pub trait BrowserSession: Send {
    /// Install headers sent with every subsequent request
    fn set_extra_headers(
        &mut self,
        headers: &Headers,
    ) -> impl Future<Output = Result<(), FetchError>> + Send;

    /// Navigate and wait for the document to load
    fn goto(&mut self, url: &str) -> impl Future<Output = Result<(), FetchError>> + Send;

    /// Run a script in the page and return its JSON result
    fn execute(
        &mut self,
        script: &str,
        args: Vec<Value>,
    ) -> impl Future<Output = Result<Value, FetchError>> + Send;

    /// Whether at least one element matches the CSS selector right now
    fn has_element(&mut self, selector: &str)
    -> impl Future<Output = Result<bool, FetchError>> + Send;

    /// Serialized DOM after script execution
    fn source(&mut self) -> impl Future<Output = Result<String, FetchError>> + Send;

    /// PNG screenshot of the viewport
    fn screenshot(&mut self) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;

    /// End the session and terminate the browser
    fn close(self) -> impl Future<Output = Result<(), FetchError>> + Send;
}

/// Launches browsers through a WebDriver server (chromedriver, geckodriver)
///
/// Each WebDriver session runs in its own browser process with a throwaway
/// profile, so sessions share no cookies, storage or navigation state.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebDriverLauncher;

impl BrowserLauncher for WebDriverLauncher {
    type Session = WebDriverSession;

    async fn launch(&self, options: &LaunchOptions) -> Result<WebDriverSession, FetchError> {
        let mut builder = ClientBuilder::native();
        builder.capabilities(capabilities(options));

        match builder.connect(&options.webdriver_url).await {
            Ok(client) => {
                ::log::debug!("Connected to WebDriver at {}", options.webdriver_url);
                Ok(WebDriverSession { client })
            }
            Err(e) => {
                ::log::error!(
                    "Failed to connect to WebDriver at {}: {}",
                    options.webdriver_url,
                    e
                );
                Err(FetchError::LaunchFailure(e.to_string()))
            }
        }
    }
}

/// Browser capabilities for Chrome and Firefox drivers
fn capabilities(options: &LaunchOptions) -> serde_json::Map<String, Value> {
    let mut chrome_args = vec![
        format!(
            "--window-size={},{}",
            options.viewport.width, options.viewport.height
        ),
        format!("--user-agent={}", options.user_agent),
        "--lang=en-US".to_string(),
    ];
    let mut firefox_args = vec![
        format!("--width={}", options.viewport.width),
        format!("--height={}", options.viewport.height),
    ];
    if options.headless {
        chrome_args.push("--headless=new".to_string());
        firefox_args.push("-headless".to_string());
    }

    let mut chrome = json!({ "args": chrome_args });
    if options.stealth {
        if let Some(args) = chrome["args"].as_array_mut() {
            args.push(json!("--disable-blink-features=AutomationControlled"));
        }
        chrome["excludeSwitches"] = json!(["enable-automation"]);
        chrome["useAutomationExtension"] = json!(false);
    }

    // WebDriver timeouts are JSON safe integers
    let limit_ms = options.page_load_timeout.as_millis().min((1 << 53) - 1) as u64;
    let mut caps = serde_json::Map::new();
    caps.insert(
        "timeouts".to_string(),
        json!({ "pageLoad": limit_ms, "script": limit_ms }),
    );
    caps.insert("goog:chromeOptions".to_string(), chrome);
    caps.insert(
        "moz:firefoxOptions".to_string(),
        json!({
            "args": firefox_args,
            "prefs": {
                "general.useragent.override": options.user_agent,
                "intl.accept_languages": "en-US, en",
            },
        }),
    );
    caps
}

/// Chrome DevTools command tunnelled through chromedriver
#[derive(Debug)]
struct CdpCommand {
    cmd: &'static str,
    params: Value,
}

impl WebDriverCompatibleCommand for CdpCommand {
    fn endpoint(
        &self,
        base_url: &url::Url,
        session_id: Option<&str>,
    ) -> Result<url::Url, url::ParseError> {
        base_url.join(&format!(
            "session/{}/goog/cdp/execute",
            session_id.unwrap_or_default()
        ))
    }

    fn method_and_body(&self, _request_url: &url::Url) -> (http::Method, Option<String>) {
        let body = json!({ "cmd": self.cmd, "params": self.params });
        (http::Method::POST, Some(body.to_string()))
    }
}

/// A WebDriver session; closing it quits the browser
pub struct WebDriverSession {
    client: Client,
}

fn command_error(context: &str, error: fantoccini::error::CmdError) -> FetchError {
    FetchError::Browser(format!("{}: {}", context, error))
}

impl BrowserSession for WebDriverSession {
    async fn set_extra_headers(&mut self, headers: &Headers) -> Result<(), FetchError> {
        // WebDriver has no request interception, so the headers are installed
        // session-wide through the DevTools bridge. Chrome only.
        self.client
            .issue_cmd(CdpCommand {
                cmd: "Network.enable",
                params: json!({}),
            })
            .await
            .map_err(|e| command_error("enabling network domain", e))?;
        self.client
            .issue_cmd(CdpCommand {
                cmd: "Network.setExtraHTTPHeaders",
                params: json!({ "headers": headers }),
            })
            .await
            .map_err(|e| command_error("setting extra headers", e))?;
        Ok(())
    }

    async fn goto(&mut self, url: &str) -> Result<(), FetchError> {
        self.client
            .goto(url)
            .await
            .map_err(|e| FetchError::unreachable(url, None, e.to_string()))
    }

    async fn execute(&mut self, script: &str, args: Vec<Value>) -> Result<Value, FetchError> {
        self.client
            .execute(script, args)
            .await
            .map_err(|e| command_error("executing script", e))
    }

    async fn has_element(&mut self, selector: &str) -> Result<bool, FetchError> {
        self.client
            .find_all(Locator::Css(selector))
            .await
            .map(|elements| !elements.is_empty())
            .map_err(|e| command_error("finding elements", e))
    }

    async fn source(&mut self) -> Result<String, FetchError> {
        self.client
            .source()
            .await
            .map_err(|e| command_error("getting page source", e))
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, FetchError> {
        self.client
            .screenshot()
            .await
            .map_err(|e| command_error("taking screenshot", e))
    }

    async fn close(self) -> Result<(), FetchError> {
        self.client
            .close()
            .await
            .map_err(|e| command_error("closing session", e))
    }
}
