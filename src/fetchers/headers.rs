//! Outbound request header shaping.
//!
//! A [`HeaderTransform`] is a pure function from a request class and its base
//! headers to the headers actually sent. It is invoked once per outbound
//! request and holds no mutable state.

use std::collections::BTreeMap;
use std::sync::Arc;

/// Header name to value, in a stable order
pub type Headers = BTreeMap<String, String>;

/// Transformation applied to every outbound request before it is sent
pub type HeaderTransform = Arc<dyn Fn(ResourceType, &Headers) -> Headers + Send + Sync>;

/// Class of an outbound browser request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Document,
    Xhr,
    Script,
    Stylesheet,
    Image,
    Font,
    Media,
    Other,
}

impl ResourceType {
    /// Requests whose headers a site is likely to inspect
    pub fn is_navigation_like(self) -> bool {
        matches!(self, ResourceType::Document | ResourceType::Xhr)
    }
}

/// Headers a desktop browser sends with a top-level navigation
pub fn browser_headers(user_agent: &str) -> Headers {
    let mut headers = Headers::new();
    headers.insert("User-Agent".to_string(), user_agent.to_string());
    headers.insert(
        "Accept".to_string(),
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8"
            .to_string(),
    );
    headers.insert(
        "Accept-Language".to_string(),
        "en-US,en;q=0.9".to_string(),
    );
    headers
}

/// Adds `Referer` to document and XHR requests, passes everything else through
pub fn referer_injector(referer: impl Into<String>) -> HeaderTransform {
    let referer = referer.into();
    Arc::new(move |resource, headers| {
        let mut headers = headers.clone();
        if resource.is_navigation_like() {
            headers.insert("Referer".to_string(), referer.clone());
        }
        headers
    })
}

/// Run `transform` for one request, or return `base` unchanged without one
pub fn apply(transform: Option<&HeaderTransform>, resource: ResourceType, base: &Headers) -> Headers {
    match transform {
        Some(transform) => transform(resource, base),
        None => base.clone(),
    }
}
