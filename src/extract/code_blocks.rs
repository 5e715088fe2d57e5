//! Code block normalization.
//!
//! Source sites render line numbers in many ways: numbered gutter tables,
//! dedicated number containers, CSS counters, or plain digits in the text.
//! All of them are stripped and, optionally, one uniform numbering is applied.

use crate::parsers::{DomNode, Element};
use regex::Regex;
use std::sync::LazyLock;

/// Class marking a normalized code block (rendered monospace)
pub const CODE_BLOCK_CLASS: &str = "docpack-code";

/// Classes of cells or containers that only hold line numbers
const GUTTER_CLASSES: [&str; 10] = [
    "linenos",
    "lineno",
    "gutter",
    "blob-num",
    "line-numbers-rows",
    "line-number",
    "linenumber",
    "hljs-ln-numbers",
    "code-line-number",
    "ln-num",
];

/// Classes that switch on counter-based numbering through stylesheets
const COUNTER_CLASSES: [&str; 4] = ["line-numbers", "linenums", "numbered", "has-line-numbers"];

/// Classes marking one rendered line inside a code block
const LINE_CLASSES: [&str; 3] = ["line", "code-line", "hljs-ln-line"];

static LINE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+)(?:[:|.)] ?|\t| {1,2}|$)")
        .expect("BUG: hardcoded line prefix pattern is invalid")
});

/// Normalize every code block below `root`
pub fn normalize(root: &mut Element, number_lines: bool) {
    replace_gutter_tables(root);
    remove_number_containers(root);
    renumber_blocks(root, number_lines);
}

/// Replace numbered gutter tables by a plain `<pre>` of their code column
fn replace_gutter_tables(element: &mut Element) {
    for child in element.children.iter_mut() {
        let DomNode::Element(el) = child else {
            continue;
        };
        if el.tag == "table" && is_gutter_table(el) {
            ::log::trace!("Replacing numbered gutter table with a plain code block");
            *el = table_to_pre(el);
        } else {
            replace_gutter_tables(el);
        }
    }
}

fn is_gutter_table(table: &Element) -> bool {
    table.has_class("highlighttable") || has_gutter_cell(table)
}

fn has_gutter_cell(element: &Element) -> bool {
    element.element_children().any(|child| {
        (child.tag == "td" && is_gutter(child)) || (child.tag != "table" && has_gutter_cell(child))
    })
}

fn is_gutter(element: &Element) -> bool {
    element.classes().any(|c| GUTTER_CLASSES.contains(&c))
        || (element.attr("data-line-number").is_some()
            && element.text().trim().chars().all(|c| c.is_ascii_digit()))
}

fn table_to_pre(table: &Element) -> Element {
    let mut rows = Vec::new();
    collect_rows(table, &mut rows);

    let lines: Vec<String> = rows
        .iter()
        .map(|row| {
            row.element_children()
                .filter(|cell| matches!(cell.tag.as_str(), "td" | "th") && !is_gutter(cell))
                .map(code_text)
                .collect::<String>()
        })
        .collect();

    let mut code = Element::new("code");
    if let Some(language) = find_language(table) {
        code.set_attr("class", format!("language-{language}"));
    }
    code.children.push(DomNode::Text(lines.join("\n")));

    Element::new("pre").with_children(vec![DomNode::Element(code)])
}

fn collect_rows<'a>(element: &'a Element, rows: &mut Vec<&'a Element>) {
    for child in element.element_children() {
        match child.tag.as_str() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => collect_rows(child, rows),
            _ => {}
        }
    }
}

fn remove_number_containers(element: &mut Element) {
    element.children.retain(|child| match child {
        DomNode::Element(el) => !(el.tag != "td" && is_gutter(el)),
        DomNode::Text(_) => true,
    });
    for child in element.children.iter_mut() {
        if let DomNode::Element(el) = child {
            remove_number_containers(el);
        }
    }
}

fn renumber_blocks(element: &mut Element, number_lines: bool) {
    for child in element.children.iter_mut() {
        let DomNode::Element(el) = child else {
            continue;
        };
        if el.tag == "pre" {
            rebuild_pre(el, number_lines);
        } else {
            renumber_blocks(el, number_lines);
        }
    }
}

fn rebuild_pre(pre: &mut Element, number_lines: bool) {
    let language = find_language(pre);
    let raw = code_text(pre);
    let stripped = strip_line_numbers(raw.trim_end_matches(['\n', '\r']));
    let text = if number_lines {
        apply_line_numbers(&stripped)
    } else {
        stripped
    };

    let mut code = pre
        .element_children()
        .find(|c| c.tag == "code")
        .map(|c| Element {
            tag: c.tag.clone(),
            attrs: c.attrs.clone(),
            children: Vec::new(),
        })
        .unwrap_or_else(|| Element::new("code"));
    code.remove_classes(&COUNTER_CLASSES);
    if let Some(language) = language {
        if !code.classes().any(|c| c.starts_with("language-")) {
            code.add_class(&format!("language-{language}"));
        }
    }
    code.children = vec![DomNode::Text(text)];

    pre.remove_classes(&COUNTER_CLASSES);
    pre.remove_attr("data-line-numbers");
    pre.add_class(CODE_BLOCK_CLASS);
    pre.children = vec![DomNode::Element(code)];
}

/// Text of a code container, with block-level line wrappers ending their line
fn code_text(element: &Element) -> String {
    let mut out = String::new();
    push_code_text(element, &mut out);
    out
}

fn push_code_text(element: &Element, out: &mut String) {
    let mut after_line_block = false;
    for child in &element.children {
        match child {
            DomNode::Text(t) => {
                let t = if after_line_block {
                    t.strip_prefix('\n').unwrap_or(t.as_str())
                } else {
                    t.as_str()
                };
                out.push_str(t);
                after_line_block = false;
            }
            DomNode::Element(el) if el.tag == "br" => {
                out.push('\n');
                after_line_block = false;
            }
            DomNode::Element(el) => {
                let is_line = el.tag == "div" || el.classes().any(|c| LINE_CLASSES.contains(&c));
                push_code_text(el, out);
                if is_line && !out.ends_with('\n') {
                    out.push('\n');
                }
                after_line_block = is_line;
            }
        }
    }
}

/// Strip a `digits + separator` prefix from every line, when every non-empty
/// line carries one and the numbers run consecutively
pub fn strip_line_numbers(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut expected: Option<u64> = None;
    let mut numbered = 0usize;

    for line in &lines {
        if line.trim().is_empty() {
            continue;
        }
        let Some(caps) = LINE_PREFIX.captures(line) else {
            return text.to_string();
        };
        let Ok(n) = caps[1].parse::<u64>() else {
            return text.to_string();
        };
        if expected.is_some_and(|e| e != n) {
            return text.to_string();
        }
        expected = Some(n + 1);
        numbered += 1;
    }

    if numbered < 2 {
        return text.to_string();
    }

    lines
        .iter()
        .map(|line| match LINE_PREFIX.find(line) {
            Some(m) => &line[m.end()..],
            None => line,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prefix every line with a fixed-width, left-padded line number
pub fn apply_line_numbers(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let width = lines.len().max(1).to_string().len();

    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            if line.is_empty() {
                format!("{:>width$}", i + 1)
            } else {
                format!("{:>width$}  {line}", i + 1)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Language named by `language-*`, `lang-*`, `highlight-*` classes or `data-lang`
pub fn find_language(element: &Element) -> Option<String> {
    if let Some(lang) = element.attr("data-lang").filter(|l| !l.is_empty()) {
        return Some(lang.to_string());
    }
    for class in element.classes() {
        for prefix in ["language-", "lang-", "highlight-source-", "highlight-"] {
            if let Some(lang) = class.strip_prefix(prefix) {
                if !lang.is_empty() && lang != "none" {
                    return Some(lang.to_string());
                }
            }
        }
    }
    element.element_children().find_map(find_language)
}
