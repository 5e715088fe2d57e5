use crate::parsers::{DomNode, Element};
use ego_tree::NodeId;
use scraper::{ElementRef, Node};
use std::collections::HashSet;
use url::Url;

/// Attributes holding a single URL that is rewritten to an absolute form
const URL_ATTRIBUTES: [&str; 3] = ["src", "href", "poster"];

/// Attributes lazy-loading scripts use to hold the real image source
const LAZY_SRC_ATTRIBUTES: [&str; 3] = ["data-src", "data-original", "data-lazy-src"];

/// Nesting depth beyond which subtrees are cut off
const MAX_NESTING_DEPTH: usize = 256;

/// Options for copying a scraper subtree into an owned tree
pub struct CopyOptions<'a> {
    /// Elements (and their subtrees) left out of the copy
    pub excluded: &'a HashSet<NodeId>,
    /// Base for resolving relative references, if any
    pub base_url: Option<&'a Url>,
}

/// Copy a parsed element into an owned [`Element`]
pub fn copy_element(element: ElementRef<'_>, options: &CopyOptions<'_>) -> Element {
    copy_element_depth(element, options, 0)
}

fn copy_element_depth(element: ElementRef<'_>, options: &CopyOptions<'_>, depth: usize) -> Element {
    let value = element.value();
    let mut copy = Element::new(value.name());
    copy.attrs = value
        .attrs()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    if let Some(base) = options.base_url {
        absolutize_attributes(&mut copy, base);
    }

    if depth >= MAX_NESTING_DEPTH {
        ::log::warn!("Markup nested deeper than {MAX_NESTING_DEPTH} levels, truncating");
        return copy;
    }

    for child in element.children() {
        match child.value() {
            Node::Text(text) => copy.children.push(DomNode::Text(text.to_string())),
            Node::Element(_) => {
                if options.excluded.contains(&child.id()) {
                    continue;
                }
                if let Some(child_ref) = ElementRef::wrap(child) {
                    copy.children.push(DomNode::Element(copy_element_depth(
                        child_ref,
                        options,
                        depth + 1,
                    )));
                }
            }
            _ => {}
        }
    }

    copy
}

/// Rewrite the element's relative references against `base`
pub fn absolutize_attributes(element: &mut Element, base: &Url) {
    if element.tag == "img" {
        promote_lazy_source(element);
    }

    for (name, value) in element.attrs.iter_mut() {
        if URL_ATTRIBUTES.contains(&name.as_str()) {
            if let Some(resolved) = resolve_reference(base, value) {
                *value = resolved;
            }
        } else if name == "srcset" {
            *value = absolutize_srcset(base, value);
        }
    }
}

/// Resolve one reference, leaving special schemes and fragments untouched
pub fn resolve_reference(base: &Url, reference: &str) -> Option<String> {
    let trimmed = reference.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    if ["data:", "javascript:", "mailto:", "tel:"]
        .iter()
        .any(|s| lower.starts_with(s))
    {
        return None;
    }
    base.join(trimmed).ok().map(|u| u.to_string())
}

fn absolutize_srcset(base: &Url, srcset: &str) -> String {
    srcset
        .split(',')
        .map(|candidate| {
            let candidate = candidate.trim();
            let mut parts = candidate.splitn(2, char::is_whitespace);
            let url = parts.next().unwrap_or("");
            let descriptor = parts.next().unwrap_or("").trim();
            let url = resolve_reference(base, url).unwrap_or_else(|| url.to_string());
            if descriptor.is_empty() {
                url
            } else {
                format!("{url} {descriptor}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn promote_lazy_source(element: &mut Element) {
    let current = element.attr("src").unwrap_or("").trim();
    if !current.is_empty() && !current.starts_with("data:") {
        return;
    }

    let lazy = LAZY_SRC_ATTRIBUTES
        .iter()
        .find_map(|name| element.attr(name))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    if let Some(lazy) = lazy {
        ::log::trace!("Promoting lazy image source {lazy}");
        element.set_attr("src", lazy);
    }
}

/// Serialize an owned element to markup
pub fn serialize_element(element: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&element.tag);
    for (name, value) in &element.attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&html_escape::encode_double_quoted_attribute(value));
        out.push('"');
    }
    out.push('>');

    if element.is_void() {
        return;
    }

    serialize_children(&element.children, out);

    out.push_str("</");
    out.push_str(&element.tag);
    out.push('>');
}

/// Serialize a list of sibling nodes to markup
pub fn serialize_children(nodes: &[DomNode], out: &mut String) {
    for node in nodes {
        match node {
            DomNode::Text(text) => out.push_str(&html_escape::encode_text(text)),
            DomNode::Element(el) => serialize_element(el, out),
        }
    }
}

/// Parse a markup fragment and copy its top-level nodes into an owned tree
pub fn parse_fragment(markup: &str) -> Vec<DomNode> {
    let fragment = scraper::Html::parse_fragment(markup);
    let root = fragment.root_element();
    let excluded = HashSet::new();
    let options = CopyOptions {
        excluded: &excluded,
        base_url: None,
    };
    copy_element(root, &options).children
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn base() -> Url {
        Url::parse("https://docs.example.com/guide/intro.html").unwrap()
    }

    fn copy_body(markup: &str) -> Element {
        let doc = Html::parse_document(markup);
        let selector = scraper::Selector::parse("body").unwrap();
        let body = doc.select(&selector).next().unwrap();
        let excluded = HashSet::new();
        let base = base();
        copy_element(
            body,
            &CopyOptions {
                excluded: &excluded,
                base_url: Some(&base),
            },
        )
    }

    #[test]
    fn test_relative_references_are_absolutized() {
        let body = copy_body(
            r##"<body><a href="setup.html">Setup</a><img src="../img/a.png"><a href="#top">Top</a></body>"##,
        );
        let html = body.to_html();
        assert!(html.contains(r#"href="https://docs.example.com/guide/setup.html""#));
        assert!(html.contains(r#"src="https://docs.example.com/img/a.png""#));
        assert!(html.contains(r##"href="#top""##));
    }

    #[test]
    fn test_lazy_image_source_is_promoted() {
        let body = copy_body(
            r#"<body><img src="data:image/gif;base64,R0lGOD" data-src="/real.png"></body>"#,
        );
        let img = body.find("img").unwrap();
        assert_eq!(img.attr("src"), Some("https://docs.example.com/real.png"));
    }

    #[test]
    fn test_srcset_is_absolutized() {
        let body = copy_body(r#"<body><img src="a.png" srcset="a.png 1x, b.png 2x"></body>"#);
        let img = body.find("img").unwrap();
        assert_eq!(
            img.attr("srcset"),
            Some("https://docs.example.com/guide/a.png 1x, https://docs.example.com/guide/b.png 2x")
        );
    }

    #[test]
    fn test_excluded_subtrees_are_skipped() {
        let doc = Html::parse_document("<body><p>keep</p><script>drop()</script></body>");
        let selector = scraper::Selector::parse("script").unwrap();
        let excluded: HashSet<NodeId> = doc.select(&selector).map(|e| e.id()).collect();
        let body_sel = scraper::Selector::parse("body").unwrap();
        let body = doc.select(&body_sel).next().unwrap();
        let copy = copy_element(
            body,
            &CopyOptions {
                excluded: &excluded,
                base_url: None,
            },
        );
        assert_eq!(copy.to_html(), "<body><p>keep</p></body>");
    }

    #[test]
    fn test_serialization_escapes() {
        let nodes = parse_fragment(r#"<p title="a &quot;b&quot;">1 &lt; 2 &amp; <br>3</p>"#);
        let mut out = String::new();
        serialize_children(&nodes, &mut out);
        assert_eq!(out, r#"<p title="a &quot;b&quot;">1 &lt; 2 &amp; <br>3</p>"#);
    }
}
