//! Final document assembly: table of contents, Markdown bundle and the
//! composite print document.

use crate::images::{failure_report, rewrite_references};
use crate::results::{Artifact, Document, PageContent, PageRef, TocEntry};
use crate::utils::sanitize_filename;
use std::collections::{HashMap, HashSet};
use std::fmt::Write;

/// Base stylesheet of the composite document
const PRINT_STYLESHEET: &str = r#"
body { font-family: -apple-system, "Segoe UI", Helvetica, Arial, sans-serif; line-height: 1.5; max-width: 960px; margin: 0 auto; padding: 1em; }
img { max-width: 100%; height: auto; }
table { border-collapse: collapse; }
td, th { border: 1px solid #ccc; padding: 0.25em 0.5em; }
pre.docpack-code, .docpack-code { font-family: ui-monospace, SFMono-Regular, Menlo, Consolas, monospace; font-size: 0.85em; white-space: pre-wrap; overflow-wrap: anywhere; }
.docpack-toc ol { list-style: none; padding-left: 0; }
.docpack-toc li { margin: 0.15em 0; }
.docpack-placeholder { border: 1px dashed #c00; padding: 0.5em 1em; color: #600; }
@media print {
  .docpack-toc { break-after: page; page-break-after: always; }
  .docpack-page { break-before: page; page-break-before: always; }
  a { color: inherit; text-decoration: none; }
}
"#;

/// Lowercase, non-word runs collapsed to `-`, no leading or trailing `-`
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() || c == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Title used for a page's section heading
pub fn section_title(page: &PageRef, content: &PageContent) -> String {
    if !page.title.trim().is_empty() {
        page.title.trim().to_string()
    } else if !content.title.is_empty() {
        content.title.clone()
    } else {
        page.url.to_string()
    }
}

/// One entry per page, numbered from 1, with unique anchors
pub fn build_toc(entries: &[(PageRef, PageContent)]) -> Vec<TocEntry> {
    let mut used: HashMap<String, usize> = HashMap::new();
    let mut taken: HashSet<String> = HashSet::new();

    entries
        .iter()
        .enumerate()
        .map(|(i, (page, content))| {
            let title = section_title(page, content);
            let mut base = slugify(&title);
            if base.is_empty() {
                base = "section".to_string();
            }
            let anchor = unique_anchor(&base, &mut used, &mut taken);
            TocEntry {
                number: i + 1,
                level: page.level,
                title,
                anchor,
            }
        })
        .collect()
}

fn unique_anchor(base: &str, used: &mut HashMap<String, usize>, taken: &mut HashSet<String>) -> String {
    let count = used.entry(base.to_string()).or_insert(0);
    let mut candidate = if *count == 0 {
        base.to_string()
    } else {
        format!("{base}-{count}")
    };
    while taken.contains(&candidate) {
        *count += 1;
        candidate = format!("{base}-{count}");
    }
    *count += 1;
    taken.insert(candidate.clone());
    candidate
}

/// Characters that would otherwise start inline markup in a title
const MARKDOWN_SPECIAL: [char; 8] = ['\\', '`', '*', '_', '[', ']', '<', '>'];

/// Backslash-escape inline markup so a title renders as plain text
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if MARKDOWN_SPECIAL.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// The table of contents as Markdown list lines.
///
/// A child is indented to its parent's content column so it nests under the
/// parent's `N. ` marker. Since child numbers never start at 1, a child list
/// is opened after a blank line; otherwise it would read as a continuation of
/// the parent's text.
pub fn toc_markdown(toc: &[TocEntry]) -> String {
    let mut out = String::new();
    // (level, content column) of the entries the next one may nest under
    let mut open: Vec<(u8, usize)> = Vec::new();
    let mut previous_indent = 0;

    for entry in toc {
        while open.last().is_some_and(|(level, _)| *level >= entry.level) {
            open.pop();
        }
        let indent = open.last().map_or(0, |(_, column)| *column);
        if indent > previous_indent {
            out.push('\n');
        }

        let marker = format!("{}. ", entry.number);
        let _ = writeln!(
            out,
            "{}{marker}[{}](#{})",
            " ".repeat(indent),
            escape_markdown(&entry.title),
            entry.anchor
        );
        open.push((entry.level, indent + marker.len()));
        previous_indent = indent;
    }
    out
}

/// The combined Markdown document, before image references are rewritten.
///
/// `page_markdown` holds the converted Markdown of each entry, in order.
pub fn assemble_markdown(document: &Document, page_markdown: &[String]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}\n", escape_markdown(&document.title));
    let _ = writeln!(out, "Source: <{}>\n", document.source_url);
    let _ = writeln!(out, "## Table of Contents\n");
    out.push_str(&toc_markdown(&document.toc));

    for (entry, markdown) in document.toc.iter().zip(page_markdown) {
        out.push_str("\n---\n\n");
        let _ = writeln!(out, "# {}\n", escape_markdown(&entry.title));
        out.push_str(without_leading_title(markdown, &entry.title).trim());
        out.push('\n');
    }
    out
}

/// Drop a first-line heading that only repeats the section title
fn without_leading_title<'a>(markdown: &'a str, title: &str) -> &'a str {
    let trimmed = markdown.trim_start();
    let (first, rest) = trimmed.split_once('\n').unwrap_or((trimmed, ""));
    match first.strip_prefix("# ").map(str::trim) {
        Some(heading) if heading == title || heading == escape_markdown(title) => rest,
        _ => markdown,
    }
}

/// The Markdown bundle: rewritten document, image files and failure report
pub fn markdown_bundle(document: &Document, page_markdown: &[String]) -> Artifact {
    let markdown = assemble_markdown(document, page_markdown);
    let markdown = rewrite_references(&markdown, &document.images, &document.failed_images);

    Artifact::MarkdownBundle {
        file_name: format!("{}.md", sanitize_filename(&document.title)),
        markdown,
        images: document
            .images
            .iter()
            .map(|record| (record.local_file_name.clone(), record.bytes.clone()))
            .collect(),
        failure_report: failure_report(&document.title, &document.failed_images),
    }
}

/// Style text of every page, `@import` rules first, duplicates dropped
pub fn merge_styles<'a>(styles: impl Iterator<Item = &'a str>) -> String {
    let mut imports: Vec<&str> = Vec::new();
    let mut blocks: Vec<String> = Vec::new();

    for page_styles in styles {
        let mut block = Vec::new();
        for line in page_styles.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with("@import") {
                if !imports.contains(&trimmed) {
                    imports.push(trimmed);
                }
            } else {
                block.push(line);
            }
        }
        let block = block.join("\n");
        if !block.trim().is_empty() && !blocks.contains(&block) {
            blocks.push(block);
        }
    }

    let mut merged = imports.join("\n");
    for block in blocks {
        if !merged.is_empty() {
            merged.push('\n');
        }
        merged.push_str(&block);
    }
    merged
}

/// The composite HTML document with every page under its own heading
pub fn composite_document(document: &Document) -> Artifact {
    let title = html_escape::encode_text(&document.title);
    let source = html_escape::encode_double_quoted_attribute(document.source_url.as_str());
    let styles = merge_styles(document.entries.iter().map(|(_, content)| content.styles.as_str()));

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(html, "<title>{title}</title>");
    let _ = writeln!(html, "<style>\n{styles}\n{PRINT_STYLESHEET}</style>");
    html.push_str("</head>\n<body>\n");

    let _ = writeln!(html, "<header class=\"docpack-cover\"><h1>{title}</h1>");
    let _ = writeln!(html, "<p>Source: <a href=\"{source}\">{source}</a></p></header>");

    html.push_str("<nav class=\"docpack-toc\">\n<h2>Table of Contents</h2>\n<ol>\n");
    for entry in &document.toc {
        let indent = f32::from(entry.level.saturating_sub(1)) * 1.5;
        let _ = writeln!(
            html,
            "<li style=\"margin-left: {indent}em\"><a href=\"#{}\">{}. {}</a></li>",
            entry.anchor,
            entry.number,
            html_escape::encode_text(&entry.title)
        );
    }
    html.push_str("</ol>\n</nav>\n");

    for (entry, (_, content)) in document.toc.iter().zip(&document.entries) {
        let level = entry.level.clamp(1, 6);
        html.push_str("<section class=\"docpack-page\">\n");
        let _ = writeln!(
            html,
            "<h{level} id=\"{}\">{}</h{level}>",
            entry.anchor,
            html_escape::encode_text(&entry.title)
        );
        html.push_str(&content.html);
        html.push_str("\n</section>\n");
    }
    html.push_str("</body>\n</html>\n");

    Artifact::Composite {
        file_name: format!("{}.html", sanitize_filename(&document.title)),
        title: document.title.clone(),
        html,
    }
}
