use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which artifact(s) a run produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown file plus an images/ folder
    Markdown,
    /// Single print-ready HTML document
    Composite,
    /// Both of the above
    Both,
}

impl OutputFormat {
    pub fn wants_markdown(&self) -> bool {
        matches!(self, OutputFormat::Markdown | OutputFormat::Both)
    }

    pub fn wants_composite(&self) -> bool {
        matches!(self, OutputFormat::Composite | OutputFormat::Both)
    }
}

/// Configuration for one documentation bundling run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Artifact(s) to produce
    #[serde(default = "default_output_format")]
    pub output_format: OutputFormat,

    /// Pause after every page fetch, in milliseconds
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    /// Number of image downloads in flight at once
    #[serde(default = "default_image_batch_size")]
    pub image_batch_size: usize,

    /// Pause between image download batches, in milliseconds
    #[serde(default = "default_image_batch_delay_ms")]
    pub image_batch_delay_ms: u64,

    /// Whether Markdown output downloads images into the bundle
    #[serde(default = "default_true")]
    pub download_images: bool,

    /// Whether code blocks get a regenerated line-number prefix
    #[serde(default = "default_true")]
    pub number_code_lines: bool,

    /// Regex patterns a discovered page URL must match (any of)
    #[serde(default)]
    pub include_patterns: Vec<String>,

    /// Regex patterns that exclude a discovered page URL
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Timeout for a single HTTP request, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// User agent sent with every HTTP request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// URL for the WebDriver instance used for privileged fetches
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Directory that receives the finished artifacts
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            output_format: default_output_format(),
            page_delay_ms: default_page_delay_ms(),
            image_batch_size: default_image_batch_size(),
            image_batch_delay_ms: default_image_batch_delay_ms(),
            download_images: true,
            number_code_lines: true,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
            webdriver_url: default_webdriver_url(),
            output_dir: default_output_dir(),
        }
    }
}

impl GeneratorConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Apply the WEBDRIVER_URL environment override, if set
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(webdriver_url) = std::env::var("WEBDRIVER_URL") {
            if !webdriver_url.is_empty() {
                self.webdriver_url = webdriver_url;
            }
        }
        self
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn image_batch_delay(&self) -> Duration {
        Duration::from_millis(self.image_batch_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_output_format() -> OutputFormat {
    OutputFormat::Markdown
}

fn default_page_delay_ms() -> u64 {
    500
}

/// Default value for image_batch_size
fn default_image_batch_size() -> usize {
    5
}

fn default_image_batch_delay_ms() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("docpack/{}", env!("CARGO_PKG_VERSION"))
}

/// Default value for webdriver_url
fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}
