//! Per-kind render functions.

use super::{RenderState, render_children};
use crate::extract::code_blocks::find_language;
use crate::markdown::ListState;
use crate::parsers::text::collapse_whitespace;
use crate::parsers::{DomNode, Element};

/// Signature shared by every render function
pub type RenderFn = fn(&Element, RenderState) -> String;

/// What a tag turns into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Heading,
    Paragraph,
    Blockquote,
    Rule,
    LineBreak,
    Emphasis,
    Strong,
    Strikethrough,
    InlineCode,
    Preformatted,
    Link,
    Image,
    List,
    ListItem,
    Table,
    Dropped,
    Container,
}

impl NodeKind {
    pub fn classify(tag: &str) -> Self {
        match tag {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => NodeKind::Heading,
            "p" => NodeKind::Paragraph,
            "blockquote" => NodeKind::Blockquote,
            "hr" => NodeKind::Rule,
            "br" => NodeKind::LineBreak,
            "em" | "i" => NodeKind::Emphasis,
            "strong" | "b" => NodeKind::Strong,
            "del" | "s" | "strike" => NodeKind::Strikethrough,
            "code" | "kbd" | "samp" | "tt" => NodeKind::InlineCode,
            "pre" => NodeKind::Preformatted,
            "a" => NodeKind::Link,
            "img" => NodeKind::Image,
            "ul" | "ol" => NodeKind::List,
            "li" => NodeKind::ListItem,
            "table" => NodeKind::Table,
            "script" | "style" | "noscript" | "template" | "head" | "title" | "meta" | "link"
            | "svg" | "button" | "select" | "iframe" | "canvas" => NodeKind::Dropped,
            _ => NodeKind::Container,
        }
    }

    pub fn renderer(self) -> RenderFn {
        match self {
            NodeKind::Heading => render_heading,
            NodeKind::Paragraph => render_paragraph,
            NodeKind::Blockquote => render_blockquote,
            NodeKind::Rule => render_rule,
            NodeKind::LineBreak => render_line_break,
            NodeKind::Emphasis => render_emphasis,
            NodeKind::Strong => render_strong,
            NodeKind::Strikethrough => render_strikethrough,
            NodeKind::InlineCode => render_inline_code,
            NodeKind::Preformatted => render_preformatted,
            NodeKind::Link => render_link,
            NodeKind::Image => render_image,
            NodeKind::List => render_list,
            NodeKind::ListItem => render_orphan_item,
            NodeKind::Table => render_table,
            NodeKind::Dropped => render_nothing,
            NodeKind::Container => render_children,
        }
    }
}

fn render_heading(el: &Element, state: RenderState) -> String {
    let level: usize = el.tag[1..].parse().unwrap_or(1);
    let content = render_children(el, state);
    let content = collapse_whitespace(&content.replace('\n', " "));
    let content = content.trim();
    if content.is_empty() {
        return String::new();
    }
    format!("\n\n{} {}\n\n", "#".repeat(level), content)
}

fn render_paragraph(el: &Element, state: RenderState) -> String {
    let content = render_children(el, state);
    let content = content.trim().replace("\n ", "\n");
    if content.is_empty() {
        return String::new();
    }
    format!("\n\n{content}\n\n")
}

fn render_blockquote(el: &Element, state: RenderState) -> String {
    let content = render_children(el, state);
    let content = content.trim();
    if content.is_empty() {
        return String::new();
    }
    let quoted: Vec<String> = content
        .lines()
        .map(|line| {
            if line.trim().is_empty() {
                ">".to_string()
            } else {
                format!("> {line}")
            }
        })
        .collect();
    format!("\n\n{}\n\n", quoted.join("\n"))
}

fn render_rule(_: &Element, _: RenderState) -> String {
    "\n\n---\n\n".to_string()
}

fn render_line_break(_: &Element, state: RenderState) -> String {
    if state.in_pre {
        "\n".to_string()
    } else {
        "  \n".to_string()
    }
}

/// Wrap inline content in a delimiter, keeping outer whitespace outside it
fn wrap_inline(content: &str, delimiter: &str) -> String {
    let inner = content.trim();
    if inner.is_empty() {
        return content.to_string();
    }
    let lead = if content.starts_with(char::is_whitespace) { " " } else { "" };
    let trail = if content.ends_with(char::is_whitespace) { " " } else { "" };
    format!("{lead}{delimiter}{inner}{delimiter}{trail}")
}

fn render_emphasis(el: &Element, state: RenderState) -> String {
    wrap_inline(&render_children(el, state), "*")
}

fn render_strong(el: &Element, state: RenderState) -> String {
    wrap_inline(&render_children(el, state), "**")
}

fn render_strikethrough(el: &Element, state: RenderState) -> String {
    wrap_inline(&render_children(el, state), "~~")
}

fn render_inline_code(el: &Element, state: RenderState) -> String {
    let verbatim = RenderState {
        in_pre: true,
        ..state
    };
    let code = render_children(el, verbatim).replace('\n', " ");
    if code.trim().is_empty() {
        return code;
    }
    if code.contains('`') {
        format!("`` {code} ``")
    } else {
        format!("`{code}`")
    }
}

fn render_preformatted(el: &Element, state: RenderState) -> String {
    let verbatim = RenderState {
        in_pre: true,
        ..state
    };
    let code = render_children(el, verbatim);
    let code = code.trim_end_matches(['\n', '\r']);
    let language = find_language(el).unwrap_or_default();
    let fence = if code.contains("```") { "~~~~" } else { "```" };
    format!("\n\n{fence}{language}\n{code}\n{fence}\n\n")
}

fn render_link(el: &Element, state: RenderState) -> String {
    let content = render_children(el, state);
    let text = content.trim();
    let href = el.attr("href").map(str::trim).unwrap_or("");
    if href.is_empty() || href.to_ascii_lowercase().starts_with("javascript:") {
        return content;
    }

    let target = if href.contains(char::is_whitespace) {
        format!("<{href}>")
    } else {
        href.to_string()
    };
    let text = if text.is_empty() { href } else { text };
    format!("[{text}]({target})")
}

fn render_image(el: &Element, _: RenderState) -> String {
    let Some(src) = el.attr("src").map(str::trim).filter(|s| !s.is_empty()) else {
        return String::new();
    };
    let alt = collapse_whitespace(el.attr("alt").unwrap_or("")).trim().replace(['[', ']'], "");
    format!("![{alt}]({src})")
}

fn render_list(el: &Element, state: RenderState) -> String {
    let ordered = el.tag == "ol";
    let depth = state.list.map(|l| l.depth + 1).unwrap_or(0);
    let item_state = RenderState {
        in_pre: false,
        list: Some(ListState { ordered, depth }),
    };
    let mut number: usize = el
        .attr("start")
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(1);

    let mut items = String::new();
    for child in el.element_children() {
        match child.tag.as_str() {
            "li" => {
                items.push_str(&render_list_item(child, item_state, number));
                number += 1;
            }
            // Lists nested directly in a list (without an <li>) still nest
            "ul" | "ol" => items.push_str(&render_list(child, item_state)),
            _ => {}
        }
    }

    if depth == 0 {
        format!("\n\n{items}\n")
    } else {
        items
    }
}

fn render_list_item(li: &Element, state: RenderState, number: usize) -> String {
    let Some(list) = state.list else {
        return String::new();
    };
    let indent = "  ".repeat(list.depth);
    let marker = if list.ordered {
        format!("{number}. ")
    } else {
        "* ".to_string()
    };

    let mut body = String::new();
    let mut nested = String::new();
    for child in &li.children {
        match child {
            DomNode::Element(el) if el.tag == "ul" || el.tag == "ol" => {
                nested.push_str(&render_list(el, state));
            }
            _ => body.push_str(&super::render_node(child, state)),
        }
    }

    let continuation = format!("{indent}{}", " ".repeat(marker.len()));
    let mut lines = item_lines(body.trim()).into_iter();
    let first = lines.next().unwrap_or("");

    let mut out = format!("{indent}{marker}{first}\n");
    for line in lines {
        if !line.is_empty() {
            out.push_str(&continuation);
            out.push_str(line);
        }
        out.push('\n');
    }
    out.push_str(&nested);
    out
}

/// Lines of an item body; blank lines are dropped except inside code fences
fn item_lines(body: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut fence: Option<&str> = None;

    for line in body.lines() {
        if let Some(open) = fence {
            if line.trim() == open {
                fence = None;
            }
            lines.push(if line.trim().is_empty() { "" } else { line });
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        fence = ["```", "~~~~"]
            .into_iter()
            .find(|m| line.trim_start().starts_with(m));
        lines.push(line.trim_end());
    }
    lines
}

fn render_orphan_item(el: &Element, state: RenderState) -> String {
    let state = RenderState {
        list: Some(state.list.unwrap_or(ListState {
            ordered: false,
            depth: 0,
        })),
        ..state
    };
    render_list_item(el, state, 1)
}

fn render_table(el: &Element, state: RenderState) -> String {
    let mut rows = Vec::new();
    collect_table_rows(el, &mut rows);

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            row.element_children()
                .filter(|c| c.tag == "td" || c.tag == "th")
                .map(|cell| table_cell(cell, state))
                .collect()
        })
        .filter(|row: &Vec<String>| !row.is_empty())
        .collect();

    let columns = cells.iter().map(Vec::len).max().unwrap_or(0);
    if columns == 0 {
        return String::new();
    }

    let format_row = |row: &Vec<String>| {
        let mut padded = row.clone();
        padded.resize(columns, String::new());
        format!("| {} |", padded.join(" | "))
    };

    let mut out = String::from("\n\n");
    out.push_str(&format_row(&cells[0]));
    out.push('\n');
    out.push_str(&format!("| {} |", vec!["---"; columns].join(" | ")));
    out.push('\n');
    for row in &cells[1..] {
        out.push_str(&format_row(row));
        out.push('\n');
    }
    out.push('\n');
    out
}

fn collect_table_rows<'a>(element: &'a Element, rows: &mut Vec<&'a Element>) {
    for child in element.element_children() {
        match child.tag.as_str() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => collect_table_rows(child, rows),
            _ => {}
        }
    }
}

fn table_cell(cell: &Element, state: RenderState) -> String {
    let content = render_children(cell, state);
    collapse_whitespace(&content)
        .trim()
        .replace('|', "\\|")
}

fn render_nothing(_: &Element, _: RenderState) -> String {
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(NodeKind::classify("h4"), NodeKind::Heading);
        assert_eq!(NodeKind::classify("b"), NodeKind::Strong);
        assert_eq!(NodeKind::classify("script"), NodeKind::Dropped);
        assert_eq!(NodeKind::classify("section"), NodeKind::Container);
        assert_eq!(NodeKind::classify("x-custom"), NodeKind::Container);
    }

    #[test]
    fn test_wrap_inline_keeps_outer_whitespace() {
        assert_eq!(wrap_inline(" bold ", "**"), " **bold** ");
        assert_eq!(wrap_inline("   ", "**"), "   ");
    }
}
