//! Capabilities the pipeline needs from its environment.

pub mod native;

use crate::error::{DeliveryError, FetchError, ImageDownloadError};
use crate::results::Artifact;
use async_trait::async_trait;
use url::Url;

pub use native::NativeHost;

/// The page the run starts from, already loaded by the host
#[derive(Debug, Clone)]
pub struct SeedPage {
    pub url: Url,
    pub title: String,
    pub html: String,
}

/// Body and declared content type of a binary download
#[derive(Debug, Clone, Default)]
pub struct BinaryResponse {
    pub bytes: Vec<u8>,
    /// `Content-Type` header value, if the server sent one
    pub content_type: Option<String>,
}

/// Host environment injected into a generation run.
///
/// Fetches cross-origin content, shows progress and receives the finished
/// artifacts. All methods take `&self`; implementations keep their own
/// connection state.
#[async_trait]
pub trait HostBridge: Send + Sync {
    /// Plain HTTP fetch of a page's HTML
    async fn fetch_html(&self, url: &Url) -> Result<String, FetchError>;

    /// Fetch through a more capable channel, tried when `fetch_html` fails
    async fn privileged_fetch_html(&self, url: &Url) -> Result<String, FetchError>;

    /// Download raw bytes, used for images
    async fn fetch_binary(&self, url: &Url) -> Result<BinaryResponse, ImageDownloadError>;

    /// Progress notification; never fails
    fn report_progress(&self, label: &str, current: usize, total: usize);

    /// Hand over a finished artifact
    async fn deliver_artifact(&self, artifact: Artifact) -> Result<(), DeliveryError>;
}
