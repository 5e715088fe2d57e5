use serde::{Deserialize, Serialize};
use url::Url;

/// A documentation page found in the seed page's navigation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRef {
    /// Absolute URL of the page (its identity within a run)
    pub url: Url,

    /// Link text from the navigation
    pub title: String,

    /// Hierarchy level, always within 1..=6
    pub level: u8,

    /// Position in which the link was found
    pub discovery_index: usize,
}

impl PageRef {
    /// Create a page reference, clamping the level into 1..=6
    pub fn new(url: Url, title: String, level: u8, discovery_index: usize) -> Self {
        Self {
            url,
            title,
            level: level.clamp(1, 6),
            discovery_index,
        }
    }
}

/// Sanitized extraction result for one page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageContent {
    /// Serialized markup of the sanitized main-content subtree
    pub html: String,

    /// Cleaned page title
    pub title: String,

    /// Collected `<style>` text and `@import` rules
    pub styles: String,

    /// Visible text length of the content
    pub text_length: usize,

    /// Stands in for a page that could not be fetched or parsed
    #[serde(default)]
    pub placeholder: bool,
}

impl PageContent {
    /// Content standing in for a page that could not be fetched or parsed
    pub fn placeholder(page: &PageRef, reason: &str) -> Self {
        let title = html_escape::encode_text(&page.title);
        let url = html_escape::encode_double_quoted_attribute(page.url.as_str());
        let reason = html_escape::encode_text(reason);
        let html = format!(
            "<div class=\"docpack-placeholder\"><p>This page could not be loaded: {title}.</p>\
             <p>Reason: {reason}</p><p>Source: <a href=\"{url}\">{url}</a></p></div>"
        );

        Self {
            html,
            title: page.title.clone(),
            styles: String::new(),
            text_length: 0,
            placeholder: true,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }
}

/// A successfully downloaded image
#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub original_url: Url,
    pub local_file_name: String,
    pub bytes: Vec<u8>,
    pub extension: String,
}

impl ImageRecord {
    /// Relative path used in the Markdown bundle
    pub fn local_path(&self) -> String {
        format!("./images/{}", self.local_file_name)
    }
}

/// Coarse classification of why an image download failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// The server refused the request or the transport was blocked
    CrossOrigin,
    /// The image does not exist at that URL
    NotFound,
    Other,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::CrossOrigin => write!(f, "cross-origin / access blocked"),
            FailureKind::NotFound => write!(f, "not found"),
            FailureKind::Other => write!(f, "other"),
        }
    }
}

/// An image whose download failed
#[derive(Debug, Clone)]
pub struct FailedImageRecord {
    pub url: Url,
    pub error_reason: String,
    pub kind: FailureKind,
    pub page_title: String,
    pub alt_text: String,
    pub context_snippet: String,
}

/// One line of the table of contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub number: usize,
    pub level: u8,
    pub title: String,
    pub anchor: String,
}

/// Everything a run produced, ready for assembly
#[derive(Debug, Clone)]
pub struct Document {
    pub title: String,
    pub source_url: Url,
    pub entries: Vec<(PageRef, PageContent)>,
    pub toc: Vec<TocEntry>,
    pub images: Vec<ImageRecord>,
    pub failed_images: Vec<FailedImageRecord>,
}

/// Finished output handed to the host
#[derive(Debug, Clone)]
pub enum Artifact {
    /// Markdown at the bundle root with images under `images/`
    MarkdownBundle {
        file_name: String,
        markdown: String,
        images: Vec<(String, Vec<u8>)>,
        failure_report: Option<String>,
    },
    /// Single HTML document for printing
    Composite {
        file_name: String,
        title: String,
        html: String,
    },
}

/// Counters describing a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub pages: usize,
    pub pages_failed: usize,
    pub images_downloaded: usize,
    pub images_failed: usize,
}
