use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// Configuration for the URL allow/block policy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UrlPolicyConfig {
    /// Hosts that may be fetched (if empty, any host is allowed)
    #[serde(default)]
    pub allowed_domains: Vec<String>,

    /// Regex patterns for URLs to allow (if empty, all URLs are allowed unless blocked)
    #[serde(default)]
    pub allow_patterns: Vec<String>,

    /// Regex patterns for URLs to block (these take precedence over allow patterns)
    #[serde(default)]
    pub block_patterns: Vec<String>,
}

/// Decides whether a URL may be fetched at all
#[derive(Debug, Default)]
pub struct UrlPolicy {
    config: UrlPolicyConfig,
    allow_regexes: Vec<Regex>,
    block_regexes: Vec<Regex>,
}

impl UrlPolicy {
    /// Create a new policy from configuration
    pub fn new(config: UrlPolicyConfig) -> Result<Self, regex::Error> {
        let allow_regexes = config
            .allow_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        let block_regexes = config
            .block_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            config,
            allow_regexes,
            block_regexes,
        })
    }

    /// Determine if a URL may be fetched
    pub fn is_allowed(&self, url: &Url) -> bool {
        if !matches!(url.scheme(), "http" | "https") {
            ::log::debug!("Policy rejected scheme: {}", url);
            return false;
        }

        if !self.is_in_domain_scope(url) {
            ::log::debug!("Policy rejected domain: {}", url);
            return false;
        }

        // Block patterns take precedence
        let url_str = url.as_str();
        if self.block_regexes.iter().any(|r| r.is_match(url_str)) {
            ::log::debug!("Policy blocked: {}", url);
            return false;
        }

        if !self.allow_regexes.is_empty() && !self.allow_regexes.iter().any(|r| r.is_match(url_str))
        {
            ::log::debug!("Policy found no allow pattern for: {}", url);
            return false;
        }

        true
    }

    /// Parse and check a URL string; unparseable URLs are never allowed
    pub fn is_allowed_str(&self, url: &str) -> bool {
        Url::parse(url).is_ok_and(|u| self.is_allowed(&u))
    }

    /// Check the host against `allowed_domains`, accepting subdomains
    fn is_in_domain_scope(&self, url: &Url) -> bool {
        if self.config.allowed_domains.is_empty() {
            return true;
        }

        let Some(host) = url.host_str() else {
            return false;
        };
        self.config.allowed_domains.iter().any(|domain| {
            host == domain || host.ends_with(&format!(".{}", domain))
        })
    }
}
