pub mod browser;
pub mod headers;
pub mod rendered;
pub mod static_fetch;

#[cfg(test)]
pub(crate) mod mock;

pub use browser::{BrowserLauncher, BrowserSession, LaunchOptions, WebDriverLauncher};
pub use headers::{HeaderTransform, Headers, ResourceType};
pub use rendered::RenderedFetcher;
pub use static_fetch::StaticFetcher;
