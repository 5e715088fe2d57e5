//! Host for running from the command line: plain HTTP through reqwest,
//! privileged fetches through a WebDriver browser session and artifacts
//! written to a local directory (the Markdown bundle as a zip archive).

use super::{BinaryResponse, HostBridge, SeedPage};
use crate::config::GeneratorConfig;
use crate::error::{DeliveryError, FetchError, ImageDownloadError};
use crate::parsers::text::visible_text;
use crate::results::Artifact;
use async_trait::async_trait;
use fantoccini::{Client, ClientBuilder};
use reqwest::header::CONTENT_TYPE;
use scraper::{Html, Selector};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use url::Url;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Driver endpoints tried when the configured one is unreachable
const FALLBACK_WEBDRIVER_URLS: [&str; 4] = [
    "http://localhost:9515", // ChromeDriver default
    "http://localhost:4723", // Appium default
    "http://localhost:9222", // Chrome debug port default
    "http://127.0.0.1:4444", // IP instead of localhost
];

pub struct NativeHost {
    http: reqwest::Client,
    webdriver_url: String,
    /// Browser session, connected on first privileged fetch
    browser: Mutex<Option<Client>>,
    output_dir: PathBuf,
}

impl NativeHost {
    pub fn new(config: &GeneratorConfig) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .connect_timeout(config.request_timeout().min(std::time::Duration::from_secs(10)))
            .build()?;

        Ok(Self {
            http,
            webdriver_url: config.webdriver_url.clone(),
            browser: Mutex::new(None),
            output_dir: config.output_dir.clone(),
        })
    }

    /// Load the seed page, falling back to the browser when plain HTTP fails
    pub async fn load_seed(&self, url: &Url) -> Result<SeedPage, FetchError> {
        let html = match self.fetch_html(url).await {
            Ok(html) => html,
            Err(e) => {
                ::log::warn!("Plain fetch of seed {url} failed ({e}), trying the browser");
                self.privileged_fetch_html(url).await?
            }
        };

        let title = document_title(&html)
            .or_else(|| url.host_str().map(str::to_string))
            .unwrap_or_else(|| url.to_string());

        Ok(SeedPage {
            url: url.clone(),
            title,
            html,
        })
    }

    /// End the browser session, if one was opened
    pub async fn shutdown(&self) {
        if let Some(client) = self.browser.lock().await.take() {
            if let Err(e) = client.close().await {
                ::log::warn!("Failed to close WebDriver session: {e}");
            }
        }
    }

    async fn browser_session(&self) -> Result<Client, FetchError> {
        let mut slot = self.browser.lock().await;
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }
        let client = connect_to_webdriver(&self.webdriver_url).await?;
        *slot = Some(client.clone());
        Ok(client)
    }

    async fn browser_source(client: &Client, url: &Url) -> Result<String, FetchError> {
        client
            .goto(url.as_str())
            .await
            .map_err(|e| FetchError::WebDriver(format!("failed to navigate to {url}: {e}")))?;
        client
            .source()
            .await
            .map_err(|e| FetchError::WebDriver(format!("failed to read page source: {e}")))
    }

    async fn write_file(&self, relative: &Path, contents: &[u8]) -> Result<(), DeliveryError> {
        let path = self.output_dir.join(relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| DeliveryError::Io {
                    path: parent.display().to_string(),
                    source,
                })?;
        }
        tokio::fs::write(&path, contents)
            .await
            .map_err(|source| DeliveryError::Io {
                path: path.display().to_string(),
                source,
            })?;
        ::log::info!("Wrote {}", path.display());
        Ok(())
    }
}

#[async_trait]
impl HostBridge for NativeHost {
    async fn fetch_html(&self, url: &Url) -> Result<String, FetchError> {
        let response = self.http.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            ::log::debug!("GET {url} answered {status}");
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(response.text().await?)
    }

    async fn privileged_fetch_html(&self, url: &Url) -> Result<String, FetchError> {
        let client = self.browser_session().await?;
        match Self::browser_source(&client, url).await {
            Ok(html) => Ok(html),
            Err(first) => {
                // The session may have died; reconnect once and retry
                ::log::warn!("Browser fetch of {url} failed ({first}), reconnecting WebDriver session");
                self.browser.lock().await.take();
                let client = self.browser_session().await?;
                Self::browser_source(&client, url).await
            }
        }
    }

    async fn fetch_binary(&self, url: &Url) -> Result<BinaryResponse, ImageDownloadError> {
        let response = self.http.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ImageDownloadError::Status(status.as_u16()));
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?.to_vec();
        Ok(BinaryResponse {
            bytes,
            content_type,
        })
    }

    fn report_progress(&self, label: &str, current: usize, total: usize) {
        ::log::info!("{label}: {current}/{total}");
    }

    async fn deliver_artifact(&self, artifact: Artifact) -> Result<(), DeliveryError> {
        match artifact {
            Artifact::MarkdownBundle {
                file_name,
                markdown,
                images,
                failure_report,
            } => {
                let stem = file_name.strip_suffix(".md").unwrap_or(&file_name);
                let archive_name = format!("{stem}.zip");
                let report = failure_report.map(|report| (format!("{stem}-image-failures.txt"), report));
                let archive = bundle_archive(&file_name, &markdown, &images, report.as_ref())
                    .map_err(|source| DeliveryError::Archive {
                        path: archive_name.clone(),
                        source,
                    })?;
                ::log::info!(
                    "Packed {} with {} images{}",
                    archive_name,
                    images.len(),
                    if report.is_some() { " and a failure report" } else { "" }
                );
                self.write_file(Path::new(&archive_name), &archive).await
            }
            Artifact::Composite {
                file_name, html, ..
            } => self.write_file(Path::new(&file_name), html.as_bytes()).await,
        }
    }
}

/// Connects to the WebDriver instance, trying the conventional driver ports
/// when the configured endpoint is unreachable
async fn connect_to_webdriver(webdriver_url: &str) -> Result<Client, FetchError> {
    match ClientBuilder::native().connect(webdriver_url).await {
        Ok(client) => {
            ::log::debug!("Connected to WebDriver at {webdriver_url}");
            return Ok(client);
        }
        Err(e) => {
            ::log::error!("Failed to connect to WebDriver at {webdriver_url}: {e}");
        }
    }

    for url in FALLBACK_WEBDRIVER_URLS {
        if url == webdriver_url {
            continue;
        }
        ::log::info!("Trying fallback WebDriver URL: {url}");
        if let Ok(client) = ClientBuilder::native().connect(url).await {
            ::log::debug!("Connected to fallback WebDriver at {url}");
            return Ok(client);
        }
    }

    ::log::error!(
        "Make sure a WebDriver server is running or set the WEBDRIVER_URL environment variable"
    );
    Err(FetchError::WebDriver(format!(
        "no WebDriver server reachable at {webdriver_url} or the fallback ports"
    )))
}

/// Zip the bundle: Markdown and report at the root, images under `images/`
fn bundle_archive(
    markdown_name: &str,
    markdown: &str,
    images: &[(String, Vec<u8>)],
    report: Option<&(String, String)>,
) -> Result<Vec<u8>, ZipError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let deflated = || SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file(markdown_name, deflated())?;
    zip.write_all(markdown.as_bytes())?;

    for (image_name, bytes) in images {
        // Images are already compressed
        zip.start_file(
            format!("images/{image_name}"),
            SimpleFileOptions::default().compression_method(CompressionMethod::Stored),
        )?;
        zip.write_all(bytes)?;
    }

    if let Some((report_name, report)) = report {
        zip.start_file(report_name.as_str(), deflated())?;
        zip.write_all(report.as_bytes())?;
    }

    Ok(zip.finish()?.into_inner())
}

fn document_title(html: &str) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    let document = Html::parse_document(html);
    document
        .select(&selector)
        .next()
        .map(|t| visible_text(&t.text().collect::<String>()))
        .filter(|t| !t.is_empty())
}
