//! Main-content extraction.
//!
//! Picks the element that most likely holds a page's documentation text,
//! copies it into an owned tree without page chrome and normalizes it.

pub mod code_blocks;
pub mod sanitize;

use crate::error::ParseError;
use crate::parsers::html::{CopyOptions, copy_element};
use crate::parsers::text::{strip_heading_marks, visible_length, visible_text};
use crate::parsers::Element;
use crate::results::PageContent;
use ego_tree::NodeId;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

/// Content containers in priority order
const CONTENT_SELECTORS: [&str; 18] = [
    ".markdown-body",
    ".markdown-section",
    ".theme-doc-markdown",
    ".rst-content",
    ".md-content",
    ".docs-content",
    ".doc-content",
    ".documentation",
    ".document",
    "main",
    "article",
    "[role='main']",
    "#main-content",
    ".main-content",
    "#content",
    ".content",
    ".post-content",
    ".page-content",
];

/// Elements removed from the extracted content along with their subtrees
const DENYLIST_SELECTORS: [&str; 35] = [
    "head",
    "script",
    "style",
    "noscript",
    "template",
    ".ad",
    ".ads",
    ".advert",
    ".advertisement",
    "[id^='google_ads']",
    ".adsbygoogle",
    ".popup",
    ".modal",
    "[role='dialog']",
    ".cookie-banner",
    "#comments",
    ".comments",
    "#disqus_thread",
    ".giscus",
    ".utterances",
    ".sidebar-toggle",
    ".menu-toggle",
    ".nav-toggle",
    "[role='search']",
    ".search",
    ".search-box",
    "input[type='search']",
    ".edit-page",
    ".edit-link",
    ".edit-this-page",
    "a.edit-page-link",
    ".headerlink",
    ".header-anchor",
    ".anchor-link",
    "a.hash-link",
];

/// Minimum visible text for a selector match to count as main content
const MIN_CANDIDATE_LENGTH: usize = 100;

/// Minimum visible text for the largest-div fallback
const MIN_DIV_LENGTH: usize = 200;

static DIV_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div").expect("BUG: hardcoded CSS selector 'div' is invalid"));

static BODY_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("body").expect("BUG: hardcoded CSS selector 'body' is invalid")
});

static TITLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("title").expect("BUG: hardcoded CSS selector 'title' is invalid")
});

static STYLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("style").expect("BUG: hardcoded CSS selector 'style' is invalid")
});

static STYLESHEET_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("link[rel~='stylesheet'][href]")
        .expect("BUG: hardcoded CSS selector for stylesheets is invalid")
});

/// Options for the extraction pass
#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    /// Regenerate a line-number prefix on every code block line
    pub number_code_lines: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            number_code_lines: true,
        }
    }
}

/// Extract the sanitized main content of a page
pub fn extract(
    raw_html: &str,
    source_url: &Url,
    options: ExtractOptions,
) -> Result<PageContent, ParseError> {
    if raw_html.trim().is_empty() {
        return Err(ParseError::EmptyDocument);
    }

    let document = Html::parse_document(raw_html);
    let candidate = select_main_content(&document);
    let excluded = denylisted_nodes(candidate);

    let mut content = copy_element(
        candidate,
        &CopyOptions {
            excluded: &excluded,
            base_url: Some(source_url),
        },
    );
    // Document-level fallbacks are embedded in other documents later
    if matches!(content.tag.as_str(), "body" | "html") {
        content.tag = "div".to_string();
    }
    sanitize_tree(&mut content, options);

    let text_length = visible_length(&content.text());
    let title = page_title(&document, &content);
    let styles = collect_styles(&document, source_url);

    ::log::debug!(
        "Extracted <{}> with {} visible chars from {}",
        candidate.value().name(),
        text_length,
        source_url
    );

    Ok(PageContent {
        html: content.to_html(),
        title,
        styles,
        text_length,
        placeholder: false,
    })
}

/// Run every sanitization pass over an owned content tree
pub fn sanitize_tree(content: &mut Element, options: ExtractOptions) {
    code_blocks::normalize(content, options.number_code_lines);
    sanitize::clean_headings(content);
    sanitize::prune_empty(content);
}

/// Pick the element holding the page's main content
pub fn select_main_content(document: &Html) -> ElementRef<'_> {
    let mut best: Option<(ElementRef<'_>, usize)> = None;

    for selector_str in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        for candidate in document.select(&selector) {
            let length = element_text_length(candidate);
            if length <= MIN_CANDIDATE_LENGTH {
                continue;
            }
            // Strictly longer wins so earlier selectors keep ties
            if best.is_none_or(|(_, best_len)| length > best_len) {
                best = Some((candidate, length));
            }
        }
    }

    if let Some((element, length)) = best {
        ::log::trace!("Main content from selector match ({length} chars)");
        return element;
    }

    let largest_div = document
        .select(&DIV_SELECTOR)
        .map(|div| (div, element_text_length(div)))
        .filter(|(_, length)| *length > MIN_DIV_LENGTH)
        .reduce(|best, current| if current.1 > best.1 { current } else { best });

    if let Some((div, length)) = largest_div {
        ::log::trace!("Main content from largest <div> ({length} chars)");
        return div;
    }

    document
        .select(&BODY_SELECTOR)
        .next()
        .unwrap_or_else(|| document.root_element())
}

fn element_text_length(element: ElementRef<'_>) -> usize {
    visible_length(&element.text().collect::<String>())
}

fn denylisted_nodes(root: ElementRef<'_>) -> HashSet<NodeId> {
    let mut excluded = HashSet::new();
    for selector_str in DENYLIST_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            ::log::warn!("Skipping invalid denylist selector {selector_str}");
            continue;
        };
        excluded.extend(root.select(&selector).map(|el| el.id()));
    }
    excluded
}

fn page_title(document: &Html, content: &Element) -> String {
    if let Some(h1) = content.find("h1") {
        let title = strip_heading_marks(&visible_text(&h1.text()));
        if !title.is_empty() {
            return title;
        }
    }

    document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|t| strip_heading_marks(&visible_text(&t.text().collect::<String>())))
        .unwrap_or_default()
}

/// Inline style blocks plus `@import` rules for linked stylesheets
fn collect_styles(document: &Html, source_url: &Url) -> String {
    let mut styles = Vec::new();

    for link in document.select(&STYLESHEET_SELECTOR) {
        if let Some(href) = link.value().attr("href") {
            match source_url.join(href.trim()) {
                Ok(url) => styles.push(format!("@import url(\"{url}\");")),
                Err(e) => ::log::debug!("Ignoring stylesheet {href}: {e}"),
            }
        }
    }

    for style in document.select(&STYLE_SELECTOR) {
        let css = style.text().collect::<String>();
        if !css.trim().is_empty() {
            styles.push(css.trim().to_string());
        }
    }

    styles.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("https://docs.example.com/guide/setup.html").unwrap()
    }

    fn filler(words: usize) -> String {
        vec!["lorem"; words].join(" ")
    }

    #[test]
    fn test_longest_selector_match_wins() {
        let html = format!(
            r#"<html><body>
                <article><p>{}</p></article>
                <div class="markdown-body"><h1>Setup</h1><p>{}</p></div>
            </body></html>"#,
            filler(30),
            filler(60)
        );
        let doc = Html::parse_document(&html);
        let chosen = select_main_content(&doc);
        assert!(chosen.value().classes().any(|c| c == "markdown-body"));
    }

    #[test]
    fn test_short_matches_fall_back_to_largest_div() {
        let html = format!(
            r#"<html><body>
                <main><p>tiny</p></main>
                <div id="wrapper"><div id="inner"><p>{}</p></div><p>{}</p></div>
            </body></html>"#,
            filler(50),
            filler(10)
        );
        let doc = Html::parse_document(&html);
        let chosen = select_main_content(&doc);
        assert_eq!(chosen.value().id(), Some("wrapper"));
    }

    #[test]
    fn test_falls_back_to_body() {
        let doc = Html::parse_document("<html><body><p>Short page</p></body></html>");
        assert_eq!(select_main_content(&doc).value().name(), "body");
    }

    #[test]
    fn test_extract_sanitizes_and_absolutizes() {
        let html = format!(
            r##"<html><head><title>Setup | Docs</title>
                <link rel="stylesheet" href="/css/site.css">
                <style>.note {{ color: red; }}</style></head>
              <body><main>
                <h1>## Setup ##<a class="headerlink" href="#setup">¶</a></h1>
                <script>track()</script>
                <div class="search-box"><input type="search"></div>
                <p>{}</p>
                <p><span></span></p>
                <img src="../img/diagram.png" alt="Diagram">
                <a class="edit-page" href="https://github.com/x/edit">Edit this page</a>
              </main></body></html>"##,
            filler(40)
        );

        let content = extract(&html, &url(), ExtractOptions::default()).unwrap();
        assert_eq!(content.title, "Setup");
        assert!(content.text_length > 100);
        assert!(!content.html.contains("track()"));
        assert!(!content.html.contains("search"));
        assert!(!content.html.contains("Edit this page"));
        assert!(!content.html.contains("<span>"));
        assert!(!content.html.contains("¶"));
        assert!(content.html.contains(r#"src="https://docs.example.com/img/diagram.png""#));
        assert!(content.html.contains("<h1>Setup</h1>"));
        assert!(content.styles.contains(r#"@import url("https://docs.example.com/css/site.css");"#));
        assert!(content.styles.contains(".note { color: red; }"));
    }

    #[test]
    fn test_title_falls_back_to_document_title() {
        let content = extract(
            "<html><head><title>Reference</title></head><body><p>text</p></body></html>",
            &url(),
            ExtractOptions::default(),
        )
        .unwrap();
        assert_eq!(content.title, "Reference");
    }

    #[test]
    fn test_image_only_page_is_not_a_placeholder() {
        let html = r#"<html><body><main><img src="/img/architecture.png" alt=""></main></body></html>"#;
        let content = extract(html, &url(), ExtractOptions::default()).unwrap();
        assert_eq!(content.text_length, 0);
        assert!(!content.is_placeholder());
        assert!(content.html.contains("https://docs.example.com/img/architecture.png"));
    }

    #[test]
    fn test_empty_document_is_a_parse_error() {
        assert!(matches!(
            extract("   ", &url(), ExtractOptions::default()),
            Err(ParseError::EmptyDocument)
        ));
    }
}
