use crate::error::LinkResolutionError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// Extensions that never point at a documentation page
const NON_DOCUMENT_EXTENSIONS: &str = r"(?i)\.(jpe?g|png|gif|webp|svg|ico|bmp|avif|css|js|mjs|map|woff2?|ttf|eot|otf|pdf|zip|tar|gz|tgz|bz2|7z|rar|dmg|exe|msi|deb|rpm|mp3|mp4|webm|ogg|wav|mov|avi|json|xml|rss|atom|csv|ya?ml|txt)$";

/// Schemes that are never followed
const REJECTED_SCHEMES: [&str; 4] = ["javascript:", "mailto:", "tel:", "data:"];

/// Configuration for URL filtering during link discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlFilterConfig {
    /// Host every accepted URL must share with the seed page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_host: Option<String>,

    /// URL schemes a page may use
    #[serde(default = "default_allowed_schemes")]
    pub allowed_schemes: Vec<String>,

    /// Regex patterns for URLs to include (if empty, all URLs are included unless excluded)
    #[serde(default)]
    pub include_patterns: Vec<String>,

    /// Regex patterns for URLs to exclude (these take precedence over include patterns)
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

impl Default for UrlFilterConfig {
    fn default() -> Self {
        Self {
            required_host: None,
            allowed_schemes: default_allowed_schemes(),
            include_patterns: Vec::new(),
            exclude_patterns: vec![NON_DOCUMENT_EXTENSIONS.to_string()],
        }
    }
}

fn default_allowed_schemes() -> Vec<String> {
    vec!["http".to_string(), "https".to_string()]
}

impl UrlFilterConfig {
    /// Scope a filter to the host of the seed page
    pub fn for_seed(seed: &Url) -> Self {
        Self {
            required_host: seed.host_str().map(|h| h.to_string()),
            ..Self::default()
        }
    }
}

/// Decides which navigation links belong to the documentation site
#[derive(Debug)]
pub struct UrlFilter {
    config: UrlFilterConfig,
    include_regexes: Vec<Regex>,
    exclude_regexes: Vec<Regex>,
}

impl UrlFilter {
    /// Create a new URL filter from configuration
    pub fn new(config: UrlFilterConfig) -> Result<Self, regex::Error> {
        let include_regexes = config
            .include_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;

        let exclude_regexes = config
            .exclude_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            config,
            include_regexes,
            exclude_regexes,
        })
    }

    /// Filter for a seed page with extra user patterns on top of the defaults
    pub fn for_seed(
        seed: &Url,
        include_patterns: &[String],
        exclude_patterns: &[String],
    ) -> Result<Self, regex::Error> {
        let mut config = UrlFilterConfig::for_seed(seed);
        config.include_patterns.extend_from_slice(include_patterns);
        config.exclude_patterns.extend_from_slice(exclude_patterns);
        Self::new(config)
    }

    /// Cheap checks on the raw href before it is resolved
    pub fn is_navigable_href(href: &str) -> bool {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            return false;
        }

        let lower = href.to_ascii_lowercase();
        !REJECTED_SCHEMES.iter().any(|s| lower.starts_with(s))
    }

    /// Resolve an href against the page it appears on
    pub fn resolve(base: &Url, href: &str) -> Result<Url, LinkResolutionError> {
        base.join(href.trim()).map_err(|source| LinkResolutionError {
            href: href.to_string(),
            base: base.to_string(),
            source,
        })
    }

    /// Determine if a resolved URL is an in-site documentation page
    pub fn should_crawl(&self, url: &Url) -> bool {
        if !self.config.allowed_schemes.iter().any(|s| s == url.scheme()) {
            return false;
        }

        if !self.is_in_host_scope(url) {
            return false;
        }

        // Exclusions are checked against the path so query strings cannot hide an extension
        let path = url.path();
        let url_str = url.as_str();
        if self
            .exclude_regexes
            .iter()
            .any(|re| re.is_match(path) || re.is_match(url_str))
        {
            return false;
        }

        if !self.include_regexes.is_empty()
            && !self.include_regexes.iter().any(|re| re.is_match(url_str))
        {
            return false;
        }

        true
    }

    fn is_in_host_scope(&self, url: &Url) -> bool {
        match &self.config.required_host {
            Some(required) => url.host_str() == Some(required.as_str()),
            None => true,
        }
    }

    /// Create a normalized version of the URL (fragment removed)
    pub fn normalize_url(&self, url: &Url) -> Url {
        let mut normalized = url.clone();
        normalized.set_fragment(None);
        normalized
    }
}
