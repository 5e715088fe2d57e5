use crate::error::FetchError;
use crate::extract::{ExtractOptions, extract};
use crate::host::{HostBridge, SeedPage};
use crate::results::{PageContent, PageRef};
use std::time::Duration;
use url::Url;

/// Retrieves and extracts pages one at a time.
///
/// Strategies, in order: the seed page already in hand, the host's plain
/// fetch, the host's privileged fetch. When all of them fail, or the page
/// yields no document, a placeholder stands in for it. A 404 or 410 from the
/// plain fetch is final; the browser is not asked for the error page.
pub struct PageFetcher<'a> {
    host: &'a dyn HostBridge,
    seed: &'a SeedPage,
    options: ExtractOptions,
    delay: Duration,
}

impl<'a> PageFetcher<'a> {
    pub fn new(
        host: &'a dyn HostBridge,
        seed: &'a SeedPage,
        options: ExtractOptions,
        delay: Duration,
    ) -> Self {
        Self {
            host,
            seed,
            options,
            delay,
        }
    }

    /// Fetch and extract one page; never fails
    pub async fn fetch(&self, page: &PageRef) -> PageContent {
        let html = if same_page(&page.url, &self.seed.url) {
            ::log::debug!("Using seed HTML for {}", page.url);
            self.seed.html.clone()
        } else {
            match self.fetch_remote(&page.url).await {
                Ok(html) => html,
                Err(e) => {
                    ::log::warn!("Giving up on '{}' ({}): {}", page.title, page.url, e);
                    return PageContent::placeholder(page, &e.to_string());
                }
            }
        };

        match extract(&html, &page.url, self.options) {
            Ok(content) => content,
            Err(e) => {
                ::log::warn!("Nothing to extract from '{}' ({}): {}", page.title, page.url, e);
                PageContent::placeholder(page, &e.to_string())
            }
        }
    }

    /// Fetch every page in order, pausing after each network fetch
    pub async fn fetch_all(&self, pages: &[PageRef]) -> Vec<(PageRef, PageContent)> {
        let total = pages.len();
        let mut entries = Vec::with_capacity(total);

        for (i, page) in pages.iter().enumerate() {
            self.host.report_progress("Fetching pages", i + 1, total);
            ::log::info!("Fetching page {}/{}: {}", i + 1, total, page.url);

            let content = self.fetch(page).await;
            entries.push((page.clone(), content));

            let served_locally = same_page(&page.url, &self.seed.url);
            if !served_locally && i + 1 < total && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        entries
    }

    async fn fetch_remote(&self, url: &Url) -> Result<String, FetchError> {
        match self.host.fetch_html(url).await {
            Ok(html) => return Ok(html),
            // A browser would only render the server's error page
            Err(e @ FetchError::Status(404 | 410)) => return Err(e),
            Err(e) => ::log::debug!("Direct fetch of {url} failed: {e}"),
        }

        let html = self.host.privileged_fetch_html(url).await?;
        ::log::debug!("Privileged fetch of {url} succeeded");
        Ok(html)
    }
}

/// Same document, ignoring fragments
fn same_page(a: &Url, b: &Url) -> bool {
    let mut a = a.clone();
    let mut b = b.clone();
    a.set_fragment(None);
    b.set_fragment(None);
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DeliveryError, ImageDownloadError};
    use crate::host::BinaryResponse;
    use crate::results::Artifact;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedHost {
        direct: HashMap<String, String>,
        statuses: HashMap<String, u16>,
        privileged: HashMap<String, String>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl HostBridge for ScriptedHost {
        async fn fetch_html(&self, url: &Url) -> Result<String, FetchError> {
            self.calls.lock().unwrap().push(format!("direct {url}"));
            if let Some(status) = self.statuses.get(url.as_str()) {
                return Err(FetchError::Status(*status));
            }
            self.direct
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| FetchError::Request("connection reset".into()))
        }

        async fn privileged_fetch_html(&self, url: &Url) -> Result<String, FetchError> {
            self.calls.lock().unwrap().push(format!("privileged {url}"));
            self.privileged
                .get(url.as_str())
                .cloned()
                .ok_or(FetchError::WebDriver("session refused".into()))
        }

        async fn fetch_binary(&self, _: &Url) -> Result<BinaryResponse, ImageDownloadError> {
            Err(ImageDownloadError::Status(404))
        }

        fn report_progress(&self, _: &str, _: usize, _: usize) {}

        async fn deliver_artifact(&self, _: Artifact) -> Result<(), DeliveryError> {
            Ok(())
        }
    }

    fn page(url: &str, title: &str) -> PageRef {
        PageRef::new(Url::parse(url).unwrap(), title.into(), 1, 0)
    }

    fn seed() -> SeedPage {
        SeedPage {
            url: Url::parse("https://docs.example.com/intro").unwrap(),
            title: "Intro".into(),
            html: "<html><body><main><h1>Intro</h1><p>Seed body</p></main></body></html>".into(),
        }
    }

    #[tokio::test]
    async fn test_seed_page_needs_no_network() {
        let host = ScriptedHost::default();
        let seed = seed();
        let fetcher = PageFetcher::new(&host, &seed, ExtractOptions::default(), Duration::ZERO);

        let content = fetcher.fetch(&page("https://docs.example.com/intro#top", "Intro")).await;
        assert!(content.html.contains("Seed body"));
        assert!(host.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_privileged_fetch_is_the_fallback() {
        let mut host = ScriptedHost::default();
        host.privileged.insert(
            "https://docs.example.com/setup".into(),
            "<html><body><p>Setup via browser</p></body></html>".into(),
        );
        let seed = seed();
        let fetcher = PageFetcher::new(&host, &seed, ExtractOptions::default(), Duration::ZERO);

        let content = fetcher.fetch(&page("https://docs.example.com/setup", "Setup")).await;
        assert!(content.html.contains("Setup via browser"));
        assert!(!content.is_placeholder());
        assert_eq!(
            *host.calls.lock().unwrap(),
            vec![
                "direct https://docs.example.com/setup".to_string(),
                "privileged https://docs.example.com/setup".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_page_skips_the_browser() {
        let mut host = ScriptedHost::default();
        host.statuses.insert("https://docs.example.com/setup".into(), 404);
        host.privileged.insert(
            "https://docs.example.com/setup".into(),
            "<html><body><h1>Not Found</h1><p>This page does not exist.</p></body></html>".into(),
        );
        let seed = seed();
        let fetcher = PageFetcher::new(&host, &seed, ExtractOptions::default(), Duration::ZERO);

        let content = fetcher.fetch(&page("https://docs.example.com/setup", "Setup")).await;
        assert!(content.is_placeholder());
        assert!(content.html.contains("HTTP 404"));
        assert!(!content.html.contains("Not Found"));
        assert_eq!(
            *host.calls.lock().unwrap(),
            vec!["direct https://docs.example.com/setup".to_string()]
        );
    }

    #[tokio::test]
    async fn test_forbidden_page_still_tries_the_browser() {
        let mut host = ScriptedHost::default();
        host.statuses.insert("https://docs.example.com/setup".into(), 403);
        host.privileged.insert(
            "https://docs.example.com/setup".into(),
            "<html><body><p>Setup via browser</p></body></html>".into(),
        );
        let seed = seed();
        let fetcher = PageFetcher::new(&host, &seed, ExtractOptions::default(), Duration::ZERO);

        let content = fetcher.fetch(&page("https://docs.example.com/setup", "Setup")).await;
        assert!(content.html.contains("Setup via browser"));
    }

    #[tokio::test]
    async fn test_total_failure_gives_placeholder() {
        let host = ScriptedHost::default();
        let seed = seed();
        let fetcher = PageFetcher::new(&host, &seed, ExtractOptions::default(), Duration::ZERO);

        let content = fetcher.fetch(&page("https://docs.example.com/gone", "Gone")).await;
        assert!(content.is_placeholder());
        assert!(content.html.contains("Gone"));
        assert!(content.html.contains("https://docs.example.com/gone"));
        assert!(content.html.contains("session refused"));
    }

    #[tokio::test]
    async fn test_empty_document_gives_placeholder() {
        let mut host = ScriptedHost::default();
        host.direct.insert("https://docs.example.com/blank".into(), "  ".into());
        let seed = seed();
        let fetcher = PageFetcher::new(&host, &seed, ExtractOptions::default(), Duration::ZERO);

        let content = fetcher.fetch(&page("https://docs.example.com/blank", "Blank")).await;
        assert!(content.is_placeholder());
        assert!(content.html.contains("document is empty"));
    }

    #[tokio::test]
    async fn test_fetch_all_keeps_order() {
        let mut host = ScriptedHost::default();
        host.direct.insert(
            "https://docs.example.com/b".into(),
            "<html><body><p>B body</p></body></html>".into(),
        );
        let seed = seed();
        let fetcher = PageFetcher::new(&host, &seed, ExtractOptions::default(), Duration::from_millis(1));

        let pages = vec![
            page("https://docs.example.com/intro", "Intro"),
            page("https://docs.example.com/b", "B"),
            page("https://docs.example.com/c", "C"),
        ];
        let entries = fetcher.fetch_all(&pages).await;
        let titles: Vec<&str> = entries.iter().map(|(p, _)| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Intro", "B", "C"]);
        assert!(!entries[1].1.is_placeholder());
        assert!(entries[2].1.is_placeholder());
    }
}
