//! Image collection, download and reference rewriting for Markdown bundles.

mod report;
mod rewrite;

pub use report::failure_report;
pub use rewrite::rewrite_references;

use crate::error::ImageDownloadError;
use crate::host::HostBridge;
use crate::parsers::text::{truncate_chars, visible_text};
use crate::results::{FailedImageRecord, FailureKind, ImageRecord, PageContent, PageRef};
use futures::future::join_all;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

/// Longest context snippet kept for a failed image, ellipsis included
const CONTEXT_SNIPPET_CHARS: usize = 50;

/// Extension used when neither the content type nor the URL names one
pub const FALLBACK_EXTENSION: &str = "png";

/// Ancestors whose text serves as an image's context
const BLOCK_TAGS: [&str; 19] = [
    "p", "li", "figure", "figcaption", "td", "th", "dd", "dt", "blockquote", "section", "article",
    "div", "h1", "h2", "h3", "h4", "h5", "h6", "main",
];

/// Content types and the extension each maps to
const CONTENT_TYPE_EXTENSIONS: [(&str, &str); 14] = [
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/jpg", "jpg"),
    ("image/pjpeg", "jpg"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
    ("image/svg+xml", "svg"),
    ("image/bmp", "bmp"),
    ("image/x-ms-bmp", "bmp"),
    ("image/x-icon", "ico"),
    ("image/vnd.microsoft.icon", "ico"),
    ("image/avif", "avif"),
    ("image/tiff", "tiff"),
    ("image/tif", "tiff"),
];

static IMAGE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img[src]").expect("BUG: hardcoded selector 'img[src]' is invalid"));

/// One `<img>` occurrence worth downloading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub url: Url,
    pub page_title: String,
    pub alt_text: String,
    pub context_snippet: String,
}

/// Batching for the download phase
#[derive(Debug, Clone, Copy)]
pub struct DownloadOptions {
    pub batch_size: usize,
    pub batch_delay: Duration,
}

/// Downloaded and failed images of one run, keyed by URL
#[derive(Debug, Default)]
pub struct ImageStore {
    downloaded: Vec<ImageRecord>,
    failed: Vec<FailedImageRecord>,
    attempted: HashSet<String>,
    counter: usize,
}

impl ImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn downloaded(&self) -> &[ImageRecord] {
        &self.downloaded
    }

    pub fn failed(&self) -> &[FailedImageRecord] {
        &self.failed
    }

    pub fn was_attempted(&self, url: &Url) -> bool {
        self.attempted.contains(url.as_str())
    }

    /// Local bundle path of a downloaded image
    pub fn local_path(&self, url: &Url) -> Option<String> {
        self.downloaded
            .iter()
            .find(|record| &record.original_url == url)
            .map(ImageRecord::local_path)
    }

    pub fn into_parts(self) -> (Vec<ImageRecord>, Vec<FailedImageRecord>) {
        (self.downloaded, self.failed)
    }

    fn record_success(&mut self, reference: &ImageReference, bytes: Vec<u8>, extension: String) {
        self.counter += 1;
        let file_name = image_file_name(self.counter, &reference.url, &extension);
        ::log::debug!("Stored {} as {}", reference.url, file_name);
        self.downloaded.push(ImageRecord {
            original_url: reference.url.clone(),
            local_file_name: file_name,
            bytes,
            extension,
        });
    }

    fn record_failure(&mut self, reference: &ImageReference, error: &ImageDownloadError) {
        let kind = classify_failure(error);
        ::log::warn!("Image download failed ({kind}): {}: {error}", reference.url);
        self.failed.push(FailedImageRecord {
            url: reference.url.clone(),
            error_reason: error.to_string(),
            kind,
            page_title: reference.page_title.clone(),
            alt_text: reference.alt_text.clone(),
            context_snippet: reference.context_snippet.clone(),
        });
    }
}

/// Every image referenced by the pages, first occurrence of each URL only
pub fn collect_references(entries: &[(PageRef, PageContent)]) -> Vec<ImageReference> {
    let all = entries
        .iter()
        .flat_map(|(page, content)| page_references(page, content))
        .collect();
    dedupe_references(all)
}

/// Keep the first reference of each URL, in order
pub fn dedupe_references(references: Vec<ImageReference>) -> Vec<ImageReference> {
    let mut seen = HashSet::new();
    references
        .into_iter()
        .filter(|reference| seen.insert(reference.url.to_string()))
        .collect()
}

fn page_references(page: &PageRef, content: &PageContent) -> Vec<ImageReference> {
    let fragment = Html::parse_fragment(&content.html);
    let title = if content.title.is_empty() {
        page.title.clone()
    } else {
        content.title.clone()
    };

    let mut references = Vec::new();
    for img in fragment.select(&IMAGE_SELECTOR) {
        let Some(src) = img.value().attr("src").map(str::trim) else {
            continue;
        };
        if src.is_empty() || src.to_ascii_lowercase().starts_with("data:") {
            continue;
        }
        let url = match page.url.join(src) {
            Ok(url) => url,
            Err(e) => {
                ::log::debug!("Skipping unresolvable image {src} on {}: {e}", page.url);
                continue;
            }
        };
        if !matches!(url.scheme(), "http" | "https") {
            continue;
        }

        references.push(ImageReference {
            url,
            page_title: title.clone(),
            alt_text: visible_text(img.value().attr("alt").unwrap_or("")),
            context_snippet: context_snippet(img),
        });
    }
    references
}

fn context_snippet(img: ElementRef<'_>) -> String {
    img.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| BLOCK_TAGS.contains(&el.value().name()))
        .map(|block| {
            let text = visible_text(&block.text().collect::<String>());
            truncate_chars(&text, CONTEXT_SNIPPET_CHARS - 1)
        })
        .unwrap_or_default()
}

/// Download every not yet attempted reference into `store`.
///
/// Batches run one after another; inside a batch all downloads are in flight
/// together. Results are merged into the store in batch order, so the file
/// counter follows reference order among successes.
pub async fn download_images(
    host: &dyn HostBridge,
    references: &[ImageReference],
    options: DownloadOptions,
    store: &mut ImageStore,
) {
    let pending: Vec<&ImageReference> = references
        .iter()
        .filter(|reference| store.attempted.insert(reference.url.to_string()))
        .collect();
    if pending.is_empty() {
        return;
    }

    let batch_size = options.batch_size.max(1);
    let total = pending.len();
    let batch_count = total.div_ceil(batch_size);
    ::log::info!("Downloading {total} images in {batch_count} batches of up to {batch_size}");

    for (batch_index, batch) in pending.chunks(batch_size).enumerate() {
        if batch_index > 0 && !options.batch_delay.is_zero() {
            tokio::time::sleep(options.batch_delay).await;
        }

        let results = join_all(batch.iter().map(|reference| download_one(host, &reference.url))).await;

        for (reference, result) in batch.iter().zip(results) {
            match result {
                Ok((bytes, extension)) => store.record_success(reference, bytes, extension),
                Err(e) => store.record_failure(reference, &e),
            }
        }

        let done = (batch_index * batch_size + batch.len()).min(total);
        host.report_progress("Downloading images", done, total);
        ::log::info!(
            "Image batch {}/{} done ({} downloaded, {} failed so far)",
            batch_index + 1,
            batch_count,
            store.downloaded.len(),
            store.failed.len()
        );
    }
}

async fn download_one(host: &dyn HostBridge, url: &Url) -> Result<(Vec<u8>, String), ImageDownloadError> {
    let response = host.fetch_binary(url).await?;
    if response.bytes.is_empty() {
        return Err(ImageDownloadError::EmptyBody);
    }

    let content_type = response
        .content_type
        .as_deref()
        .map(|ct| ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase());
    if let Some(ct) = content_type.as_deref() {
        if ct.starts_with("text/html") {
            return Err(ImageDownloadError::NotAnImage(ct.to_string()));
        }
    }

    let extension = extension_for(content_type.as_deref(), url);
    Ok((response.bytes, extension))
}

/// File extension from the content type, else the URL path, else the fallback
pub fn extension_for(content_type: Option<&str>, url: &Url) -> String {
    let from_type = content_type.and_then(|ct| {
        let ct = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        CONTENT_TYPE_EXTENSIONS
            .iter()
            .find(|(mime, _)| *mime == ct)
            .map(|(_, ext)| *ext)
    });
    if let Some(ext) = from_type {
        return ext.to_string();
    }

    let from_path = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|file| file.rsplit_once('.'))
        .and_then(|(_, ext)| normalize_extension(&ext.to_ascii_lowercase()));

    from_path.unwrap_or(FALLBACK_EXTENSION).to_string()
}

fn normalize_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "png" => Some("png"),
        "jpg" | "jpeg" | "jpe" => Some("jpg"),
        "gif" => Some("gif"),
        "webp" => Some("webp"),
        "svg" => Some("svg"),
        "bmp" => Some("bmp"),
        "ico" => Some("ico"),
        "avif" => Some("avif"),
        "tif" | "tiff" => Some("tiff"),
        _ => None,
    }
}

/// `img_<counter>_<xxh32 of the URL>.<ext>`
pub fn image_file_name(counter: usize, url: &Url, extension: &str) -> String {
    let hash = xxhash_rust::xxh32::xxh32(url.as_str().as_bytes(), 0);
    format!("img_{counter}_{hash:08x}.{extension}")
}

/// Heuristic classification of a failed download
pub fn classify_failure(error: &ImageDownloadError) -> FailureKind {
    match error {
        ImageDownloadError::Status(401 | 403) | ImageDownloadError::Request(_) => {
            FailureKind::CrossOrigin
        }
        ImageDownloadError::Status(404 | 410) => FailureKind::NotFound,
        _ => FailureKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DeliveryError, FetchError};
    use crate::host::BinaryResponse;
    use crate::results::Artifact;
    use async_trait::async_trait;
    use rstest::rstest;
    use std::sync::Mutex;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn entry(path: &str, title: &str, html: &str) -> (PageRef, PageContent) {
        let page = PageRef::new(url(&format!("https://docs.example.com{path}")), title.into(), 1, 0);
        let content = PageContent {
            html: html.into(),
            title: title.into(),
            styles: String::new(),
            text_length: html.len(),
            placeholder: false,
        };
        (page, content)
    }

    /// Serves images by URL; anything else is a 404
    struct ImageHost {
        responses: Vec<(String, Result<BinaryResponse, ImageDownloadError>)>,
        requests: Mutex<Vec<String>>,
    }

    impl ImageHost {
        fn new(responses: Vec<(&str, Result<BinaryResponse, ImageDownloadError>)>) -> Self {
            Self {
                responses: responses.into_iter().map(|(u, r)| (u.to_string(), r)).collect(),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    fn png() -> Result<BinaryResponse, ImageDownloadError> {
        Ok(BinaryResponse {
            bytes: vec![0x89, b'P', b'N', b'G'],
            content_type: Some("image/png".into()),
        })
    }

    #[async_trait]
    impl HostBridge for ImageHost {
        async fn fetch_html(&self, _: &Url) -> Result<String, FetchError> {
            Err(FetchError::Unavailable("images only".into()))
        }

        async fn privileged_fetch_html(&self, _: &Url) -> Result<String, FetchError> {
            Err(FetchError::Unavailable("images only".into()))
        }

        async fn fetch_binary(&self, url: &Url) -> Result<BinaryResponse, ImageDownloadError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.responses
                .iter()
                .find(|(u, _)| u == url.as_str())
                .map(|(_, r)| r.clone())
                .unwrap_or(Err(ImageDownloadError::Status(404)))
        }

        fn report_progress(&self, _: &str, _: usize, _: usize) {}

        async fn deliver_artifact(&self, _: Artifact) -> Result<(), DeliveryError> {
            Ok(())
        }
    }

    fn options() -> DownloadOptions {
        DownloadOptions {
            batch_size: 2,
            batch_delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_collection_dedupes_across_pages() {
        let entries = vec![
            entry(
                "/a",
                "Intro",
                r#"<p>The architecture overview <img src="https://cdn.example.com/arch.png" alt="Architecture"></p>
                   <img src="data:image/png;base64,AAAA">"#,
            ),
            entry(
                "/b",
                "Setup",
                r#"<p><img src="https://cdn.example.com/arch.png"><img src="/img/setup.gif" alt=" Setup  screen "></p>"#,
            ),
        ];

        let refs = collect_references(&entries);
        let urls: Vec<&str> = refs.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://cdn.example.com/arch.png", "https://docs.example.com/img/setup.gif"]
        );
        assert_eq!(refs[0].page_title, "Intro");
        assert_eq!(refs[0].alt_text, "Architecture");
        assert_eq!(refs[0].context_snippet, "The architecture overview");
        assert_eq!(refs[1].alt_text, "Setup screen");
    }

    #[test]
    fn test_context_snippet_is_bounded() {
        let long = "word ".repeat(40);
        let entries = vec![entry("/a", "A", &format!(r#"<p>{long}<img src="https://x.dev/a.png"></p>"#))];
        let refs = collect_references(&entries);
        assert!(refs[0].context_snippet.chars().count() <= CONTEXT_SNIPPET_CHARS);
        assert!(refs[0].context_snippet.ends_with('…'));
    }

    #[rstest]
    #[case(Some("image/png"), "https://x.dev/a", "png")]
    #[case(Some("image/jpeg; charset=binary"), "https://x.dev/a.png", "jpg")]
    #[case(Some("image/svg+xml"), "https://x.dev/a", "svg")]
    #[case(Some("application/octet-stream"), "https://x.dev/pic.JPEG", "jpg")]
    #[case(None, "https://x.dev/logo.webp?v=3", "webp")]
    #[case(None, "https://x.dev/render.php", "png")]
    #[case(None, "https://x.dev/", "png")]
    fn test_extension_for(#[case] content_type: Option<&str>, #[case] u: &str, #[case] expected: &str) {
        assert_eq!(extension_for(content_type, &url(u)), expected);
    }

    #[rstest]
    #[case(ImageDownloadError::Status(403), FailureKind::CrossOrigin)]
    #[case(ImageDownloadError::Status(401), FailureKind::CrossOrigin)]
    #[case(ImageDownloadError::Request("connection reset".into()), FailureKind::CrossOrigin)]
    #[case(ImageDownloadError::Status(404), FailureKind::NotFound)]
    #[case(ImageDownloadError::Status(410), FailureKind::NotFound)]
    #[case(ImageDownloadError::Status(500), FailureKind::Other)]
    #[case(ImageDownloadError::EmptyBody, FailureKind::Other)]
    fn test_classify_failure(#[case] error: ImageDownloadError, #[case] expected: FailureKind) {
        assert_eq!(classify_failure(&error), expected);
    }

    #[test]
    fn test_file_name_shape() {
        let name = image_file_name(3, &url("https://x.dev/a.png"), "png");
        assert!(name.starts_with("img_3_"));
        assert!(name.ends_with(".png"));
        let hash = &name["img_3_".len()..name.len() - ".png".len()];
        assert_eq!(hash.len(), 8);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(name, image_file_name(3, &url("https://x.dev/a.png"), "png"));
    }

    #[tokio::test]
    async fn test_download_counts_successes_in_order() {
        let host = ImageHost::new(vec![
            ("https://x.dev/1.png", png()),
            ("https://x.dev/3.png", png()),
            (
                "https://x.dev/4",
                Ok(BinaryResponse {
                    bytes: b"<html>login</html>".to_vec(),
                    content_type: Some("text/html; charset=utf-8".into()),
                }),
            ),
            (
                "https://x.dev/5.png",
                Ok(BinaryResponse {
                    bytes: Vec::new(),
                    content_type: Some("image/png".into()),
                }),
            ),
        ]);
        let refs: Vec<ImageReference> = ["1.png", "2.png", "3.png", "4", "5.png"]
            .iter()
            .map(|p| ImageReference {
                url: url(&format!("https://x.dev/{p}")),
                page_title: "Page".into(),
                alt_text: String::new(),
                context_snippet: String::new(),
            })
            .collect();

        let mut store = ImageStore::new();
        download_images(&host, &refs, options(), &mut store).await;

        let names: Vec<&str> = store.downloaded().iter().map(|r| r.local_file_name.as_str()).collect();
        assert_eq!(names.len(), 2);
        assert!(names[0].starts_with("img_1_"));
        assert!(names[1].starts_with("img_2_"));
        assert_eq!(store.downloaded()[1].original_url.as_str(), "https://x.dev/3.png");

        let failed: Vec<(&str, FailureKind)> =
            store.failed().iter().map(|f| (f.url.as_str(), f.kind)).collect();
        assert_eq!(
            failed,
            vec![
                ("https://x.dev/2.png", FailureKind::NotFound),
                ("https://x.dev/4", FailureKind::Other),
                ("https://x.dev/5.png", FailureKind::Other),
            ]
        );
    }

    #[tokio::test]
    async fn test_each_url_is_attempted_once() {
        let host = ImageHost::new(vec![("https://x.dev/a.png", png())]);
        let reference = ImageReference {
            url: url("https://x.dev/a.png"),
            page_title: "A".into(),
            alt_text: String::new(),
            context_snippet: String::new(),
        };
        let refs = vec![reference.clone(), reference];

        let mut store = ImageStore::new();
        download_images(&host, &refs, options(), &mut store).await;
        download_images(&host, &refs, options(), &mut store).await;

        assert_eq!(host.requests.lock().unwrap().len(), 1);
        assert_eq!(store.downloaded().len(), 1);
        assert!(store.was_attempted(&url("https://x.dev/a.png")));
        assert!(store.local_path(&url("https://x.dev/a.png")).unwrap().starts_with("./images/img_1_"));
    }
}
