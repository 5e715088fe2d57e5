//! HTML to Markdown conversion.
//!
//! Conversion is total: any tree produces some Markdown. Each element is
//! classified into a [`NodeKind`] whose render function receives an
//! immutable [`RenderState`] describing its context (inside preformatted
//! text, inside a list at some depth).

pub mod rules;

pub use rules::NodeKind;

use crate::parsers::html::parse_fragment;
use crate::parsers::text::collapse_whitespace;
use crate::parsers::{DomNode, Element};

/// Innermost list around the node being rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListState {
    pub ordered: bool,
    /// 0 for a top-level list
    pub depth: usize,
}

/// Context passed down the tree during rendering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderState {
    /// Inside `<pre>` or inline code: text is emitted verbatim
    pub in_pre: bool,
    pub list: Option<ListState>,
}

/// Convert an HTML fragment to Markdown
pub fn convert(html: &str) -> String {
    convert_nodes(&parse_fragment(html))
}

/// Convert already-parsed nodes to Markdown
pub fn convert_nodes(nodes: &[DomNode]) -> String {
    let state = RenderState::default();
    let raw: String = nodes.iter().map(|node| render_node(node, state)).collect();
    tidy(&raw)
}

pub(crate) fn render_node(node: &DomNode, state: RenderState) -> String {
    if state.in_pre {
        return match node {
            DomNode::Text(t) => t.clone(),
            DomNode::Element(el) if el.tag == "br" => "\n".to_string(),
            DomNode::Element(el) => render_children(el, state),
        };
    }

    match node {
        DomNode::Text(t) => collapse_whitespace(t),
        DomNode::Element(el) => NodeKind::classify(&el.tag).renderer()(el, state),
    }
}

pub(crate) fn render_children(element: &Element, state: RenderState) -> String {
    element
        .children
        .iter()
        .map(|child| render_node(child, state))
        .collect()
}

/// Blank out whitespace-only lines, collapse runs of blank lines outside
/// fenced code, and end the document with exactly one newline
pub fn tidy(markdown: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut fence: Option<&str> = None;
    let mut previous_blank = true;

    for line in markdown.lines() {
        let marker = ["```", "~~~~"]
            .into_iter()
            .find(|m| line.trim_start().starts_with(m));

        if let Some(open) = fence {
            lines.push(line);
            if marker == Some(open) && line.trim() == open {
                fence = None;
            }
            previous_blank = false;
            continue;
        }

        if let Some(marker) = marker {
            fence = Some(marker);
            lines.push(line);
            previous_blank = false;
            continue;
        }

        if line.trim().is_empty() {
            if !previous_blank {
                lines.push("");
            }
            previous_blank = true;
            continue;
        }

        lines.push(line);
        previous_blank = false;
    }

    let mut out = lines.join("\n").trim_matches('\n').to_string();
    if !out.is_empty() {
        out.push('\n');
    }
    out
}
