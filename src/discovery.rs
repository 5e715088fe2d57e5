//! Navigation-driven page discovery.
//!
//! Only the seed page's navigation regions are scanned; links found in the
//! body text are not followed.

use crate::filter::UrlFilter;
use crate::parsers::text::visible_text;
use crate::results::PageRef;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

/// Navigation containers, in the order they are scanned
const NAVIGATION_SELECTORS: [&str; 16] = [
    "nav",
    "[role='navigation']",
    ".sidebar",
    "#sidebar",
    ".side-bar",
    ".sidebar-nav",
    ".docs-sidebar",
    ".menu",
    ".nav",
    ".navigation",
    ".toc",
    "#toc",
    ".table-of-contents",
    ".toctree-wrapper",
    ".summary",
    "aside",
];

static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("BUG: hardcoded selector 'a[href]' is invalid"));

static LEVEL_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:level|depth|lvl|toctree-l)-?([1-9])$")
        .expect("BUG: hardcoded level class pattern is invalid")
});

/// Class tokens marking a nested (sub-level) entry
const SUB_LEVEL_CLASSES: [&str; 6] = ["sub", "sub-item", "subitem", "submenu", "sub-menu", "child"];

/// Scan the seed page's navigation for in-site pages.
///
/// `seen` is the run's seen-URL set; URLs already in it are skipped and every
/// accepted URL is added. The result is stably sorted by level only: this keeps
/// discovery order inside a level but does not rebuild the site's parent/child
/// tree, so pages of different levels are grouped rather than interleaved.
pub fn discover_pages(
    seed_html: &str,
    seed_url: &Url,
    filter: &UrlFilter,
    seen: &mut HashSet<String>,
) -> Vec<PageRef> {
    let document = Html::parse_document(seed_html);
    let mut pages = Vec::new();

    for selector_str in NAVIGATION_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            ::log::warn!("Skipping invalid navigation selector {selector_str}");
            continue;
        };

        for region in document.select(&selector) {
            collect_region_links(region, seed_url, filter, seen, &mut pages);
        }
    }

    // Stable: equal levels keep discovery order
    pages.sort_by_key(|p| p.level);

    ::log::info!(
        "Discovered {} pages in the navigation of {}",
        pages.len(),
        seed_url
    );
    pages
}

fn collect_region_links(
    region: ElementRef<'_>,
    seed_url: &Url,
    filter: &UrlFilter,
    seen: &mut HashSet<String>,
    pages: &mut Vec<PageRef>,
) {
    for anchor in region.select(&ANCHOR_SELECTOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if !UrlFilter::is_navigable_href(href) {
            ::log::trace!("Ignoring non-navigable href {href}");
            continue;
        }

        let resolved = match UrlFilter::resolve(seed_url, href) {
            Ok(url) => url,
            Err(e) => {
                ::log::debug!("{e}");
                continue;
            }
        };
        if !filter.should_crawl(&resolved) {
            ::log::debug!("URL filter rejected: {resolved}");
            continue;
        }

        let normalized = filter.normalize_url(&resolved);
        if !seen.insert(normalized.to_string()) {
            ::log::trace!("Skipping already discovered link: {normalized}");
            continue;
        }

        let title = link_title(anchor, &normalized);
        let level = link_level(anchor, region);
        let index = pages.len();
        ::log::debug!("Discovered page {index}: '{title}' (level {level}) at {normalized}");
        pages.push(PageRef::new(normalized, title, level, index));
    }
}

fn link_title(anchor: ElementRef<'_>, url: &Url) -> String {
    let text = visible_text(&anchor.text().collect::<String>());
    if !text.is_empty() {
        return text;
    }

    if let Some(title) = anchor.value().attr("title").map(visible_text) {
        if !title.is_empty() {
            return title;
        }
    }

    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(|s| s.to_string())
        .unwrap_or_else(|| url.to_string())
}

/// Nesting depth of `<li>` ancestors inside the region, overridden by class hints
fn link_level(anchor: ElementRef<'_>, region: ElementRef<'_>) -> u8 {
    let mut depth: usize = 0;
    let mut nearest_item: Option<ElementRef<'_>> = None;

    for ancestor in anchor.ancestors() {
        if ancestor.id() == region.id() {
            break;
        }
        if let Some(element) = ElementRef::wrap(ancestor) {
            if element.value().name() == "li" {
                depth += 1;
                nearest_item.get_or_insert(element);
            }
        }
    }

    let mut level = depth.max(1);
    let hinted = class_hint(anchor).or_else(|| nearest_item.and_then(class_hint));
    match hinted {
        Some(LevelHint::Exact(n)) => level = n,
        Some(LevelHint::Nested) => level = level.max(2),
        None => {}
    }

    level.clamp(1, 6) as u8
}

enum LevelHint {
    Exact(usize),
    Nested,
}

fn class_hint(element: ElementRef<'_>) -> Option<LevelHint> {
    let mut nested = false;
    for class in element.value().classes() {
        let class = class.to_ascii_lowercase();
        if let Some(caps) = LEVEL_CLASS.captures(&class) {
            if let Ok(n) = caps[1].parse::<usize>() {
                return Some(LevelHint::Exact(n));
            }
        }
        if SUB_LEVEL_CLASSES.contains(&class.as_str()) {
            nested = true;
        }
    }
    nested.then_some(LevelHint::Nested)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed() -> Url {
        Url::parse("https://docs.example.com/guide/intro.html").unwrap()
    }

    fn discover(html: &str) -> Vec<PageRef> {
        let filter = UrlFilter::for_seed(&seed(), &[], &[]).unwrap();
        let mut seen = HashSet::new();
        discover_pages(html, &seed(), &filter, &mut seen)
    }

    const NESTED_NAV: &str = r##"
        <html><body>
          <nav class="sidebar">
            <ul>
              <li><a href="intro.html">Intro</a>
                <ul>
                  <li><a href="setup.html">Setup</a>
                    <ul><li><a href="setup/linux.html">Linux</a></li></ul>
                  </li>
                </ul>
              </li>
              <li><a href="api.html">API</a></li>
              <li><a href="#local">Local</a></li>
              <li><a href="https://github.com/example/repo">GitHub</a></li>
              <li><a href="manual.pdf">Manual</a></li>
              <li><a href="mailto:docs@example.com">Mail</a></li>
              <li><a href="javascript:void(0)">Toggle</a></li>
            </ul>
          </nav>
          <main><p>Body text <a href="hidden.html">not in nav</a></p></main>
        </body></html>
    "##;

    #[test]
    fn test_levels_follow_list_nesting() {
        let pages = discover(NESTED_NAV);
        let summary: Vec<(&str, u8)> = pages.iter().map(|p| (p.title.as_str(), p.level)).collect();
        assert_eq!(
            summary,
            vec![("Intro", 1), ("API", 1), ("Setup", 2), ("Linux", 3)]
        );
        assert_eq!(pages[0].url.as_str(), "https://docs.example.com/guide/intro.html");
        assert_eq!(pages[3].url.as_str(), "https://docs.example.com/guide/setup/linux.html");
    }

    #[test]
    fn test_discovery_index_is_preserved_through_sort() {
        let pages = discover(NESTED_NAV);
        let indices: Vec<usize> = pages.iter().map(|p| p.discovery_index).collect();
        assert_eq!(indices, vec![0, 3, 1, 2]);
    }

    #[test]
    fn test_duplicates_and_fragments_collapse() {
        let html = r#"
            <nav>
              <a href="a.html">A</a>
              <a href="a.html#part">A again</a>
              <a href="/guide/a.html">A absolute</a>
            </nav>
            <div class="toc"><a href="a.html">A from toc</a><a href="b.html">B</a></div>
        "#;
        let pages = discover(html);
        let titles: Vec<&str> = pages.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B"]);

        let unique: HashSet<&str> = pages.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(unique.len(), pages.len());
    }

    #[test]
    fn test_class_hints_override_depth() {
        let html = r#"
            <nav>
              <a class="level-3" href="deep.html">Deep</a>
              <ul><li class="toctree-l2"><a href="two.html">Two</a></li></ul>
              <a class="sub" href="sub.html">Sub</a>
              <a class="depth-9" href="nine.html">Nine</a>
            </nav>
        "#;
        let pages = discover(html);
        let summary: Vec<(&str, u8)> = pages.iter().map(|p| (p.title.as_str(), p.level)).collect();
        assert_eq!(summary, vec![("Two", 2), ("Sub", 2), ("Deep", 3), ("Nine", 6)]);
    }

    #[test]
    fn test_levels_are_in_range_for_deep_nesting() {
        let mut html = String::from("<nav>");
        for _ in 0..10 {
            html.push_str("<ul><li>");
        }
        html.push_str(r#"<a href="deep.html">Deep</a>"#);
        for _ in 0..10 {
            html.push_str("</li></ul>");
        }
        html.push_str("</nav>");

        let pages = discover(&html);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].level, 6);
    }

    #[test]
    fn test_title_fallbacks() {
        let html = r#"<nav><a href="x.html" title="Ex"></a><a href="docs/y/"><img src="y.png"></a></nav>"#;
        let pages = discover(html);
        assert_eq!(pages[0].title, "Ex");
        assert_eq!(pages[1].title, "y");
    }

    #[test]
    fn test_missing_navigation_yields_nothing() {
        assert!(discover("<html><body><p>No nav</p></body></html>").is_empty());
        assert!(discover("").is_empty());
    }

    #[test]
    fn test_seen_set_is_respected() {
        let filter = UrlFilter::for_seed(&seed(), &[], &[]).unwrap();
        let mut seen = HashSet::new();
        seen.insert("https://docs.example.com/guide/a.html".to_string());
        let pages = discover_pages(
            r#"<nav><a href="a.html">A</a><a href="b.html">B</a></nav>"#,
            &seed(),
            &filter,
            &mut seen,
        );
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].title, "B");
        assert!(seen.contains("https://docs.example.com/guide/b.html"));
    }
}
