// Re-export modules
pub mod acquire;
pub mod cache;
pub mod config;
pub mod convert;
pub mod error;
pub mod fetchers;
pub mod filter;
pub mod limiter;
pub mod parsers;
pub mod results;
pub mod utils;

// Re-export commonly used types for convenience
pub use acquire::{AcquireRequest, Acquirer, Strategy};
pub use cache::{CacheStats, ResultCache, cache_key};
pub use config::AcquireConfig;
pub use error::{ConfigError, ErrorKind, FetchError, ParseSkipped};
pub use fetchers::{RenderedFetcher, StaticFetcher};
pub use parsers::{extract, normalize};
pub use results::{ExtractedElement, FetchResult, NormalizedPage, PageSnapshot};
