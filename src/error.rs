use thiserror::Error;

/// An href that could not be turned into an absolute URL
#[derive(Debug, Error)]
#[error("cannot resolve link '{href}' against {base}: {source}")]
pub struct LinkResolutionError {
    pub href: String,
    pub base: String,
    #[source]
    pub source: url::ParseError,
}

/// Failure to retrieve the HTML of a page
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("server answered with HTTP {0}")]
    Status(u16),

    #[error("request timed out")]
    Timeout,

    #[error("webdriver error: {0}")]
    WebDriver(String),

    #[error("no fetch strategy available: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Request(err.to_string())
        }
    }
}

/// Markup that yields nothing usable
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("document is empty")]
    EmptyDocument,
}

/// Failure to download a single image
#[derive(Debug, Clone, Error)]
pub enum ImageDownloadError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("timed out")]
    Timeout,

    #[error("empty response body")]
    EmptyBody,

    #[error("response is not an image ({0})")]
    NotAnImage(String),
}

impl From<reqwest::Error> for ImageDownloadError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ImageDownloadError::Timeout
        } else if let Some(status) = err.status() {
            ImageDownloadError::Status(status.as_u16())
        } else {
            ImageDownloadError::Request(err.to_string())
        }
    }
}

/// Failure to hand a finished artifact to its destination
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to pack {path}: {source}")]
    Archive {
        path: String,
        #[source]
        source: zip::result::ZipError,
    },
}

/// Invalid or unreadable configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid URL pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Errors that abort a whole generation run
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("no documentation pages were found in the navigation of {0}")]
    NoPagesDiscovered(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}
