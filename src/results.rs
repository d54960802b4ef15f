use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// Raw material from one acquisition attempt
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// Full document markup
    pub html: String,

    /// PNG screenshot, only present for rendered fetches
    pub screenshot: Option<Vec<u8>>,
}

impl FetchResult {
    /// Create a result for a static fetch
    pub fn html_only(html: String) -> Self {
        Self {
            html,
            screenshot: None,
        }
    }
}

/// An anchor element found on a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    pub text: String,
}

/// An image element found on a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub src: String,
    pub alt: String,
}

/// Canonical extracted representation of a page, independent of fetch method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedPage {
    pub title: String,
    pub meta_description: String,

    /// Visible body text with whitespace collapsed to single spaces
    pub body_text: String,

    /// Anchors in document order
    pub links: Vec<Link>,

    /// Images in document order
    pub images: Vec<Image>,

    /// Parsed JSON-LD blocks in document order
    pub structured_data: Vec<serde_json::Value>,

    /// Source markup, kept for selector-based extraction
    pub html: String,
}

/// One element matched by a selector-scoped extraction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedElement {
    pub text: String,
    pub inner_html: String,
}

/// A normalized page together with its screenshot when rendered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub page: NormalizedPage,

    #[serde(skip)]
    pub screenshot: Option<Vec<u8>>,

    /// Whether the page came from a browser session
    pub rendered: bool,
}

impl PageSnapshot {
    /// Screenshot as an embeddable `data:image/png;base64,...` URI
    pub fn screenshot_data_uri(&self) -> Option<String> {
        self.screenshot.as_deref().map(png_data_uri)
    }
}

/// Wrap PNG bytes as a base64 data URI
pub fn png_data_uri(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}
