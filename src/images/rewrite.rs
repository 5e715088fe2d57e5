use crate::markdown::tidy;
use crate::results::{FailedImageRecord, ImageRecord};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Point downloaded images at their bundle path and mark failed ones.
///
/// Successful URLs are replaced wherever they occur. Every Markdown image
/// reference to a failed URL keeps its place with a note appended to its alt
/// text. The warning goes in a blockquote above a paragraph line, or right
/// after the reference inside table rows, list items and quotes. Fenced code
/// is left alone.
pub fn rewrite_references(
    markdown: &str,
    images: &[ImageRecord],
    failed: &[FailedImageRecord],
) -> String {
    let mut rewritten = replace_downloaded(markdown, images, failed);
    if !failed.is_empty() {
        rewritten = mark_failed(&rewritten, failed);
    }
    tidy(&rewritten)
}

/// Alternation of escaped URLs, longest first so a URL never matches as the
/// prefix of a longer one
fn url_alternation<'a>(urls: impl Iterator<Item = &'a str>) -> String {
    let mut urls: Vec<&str> = urls.collect();
    urls.sort_by_key(|u| std::cmp::Reverse(u.len()));
    urls.dedup();
    urls.iter()
        .map(|u| regex::escape(u))
        .collect::<Vec<_>>()
        .join("|")
}

fn replace_downloaded(markdown: &str, images: &[ImageRecord], failed: &[FailedImageRecord]) -> String {
    if images.is_empty() {
        return markdown.to_string();
    }

    let local: HashMap<&str, String> = images
        .iter()
        .map(|record| (record.original_url.as_str(), record.local_path()))
        .collect();

    // Failed URLs take part in matching so they shadow downloaded prefixes of themselves
    let pattern = url_alternation(
        images
            .iter()
            .map(|r| r.original_url.as_str())
            .chain(failed.iter().map(|f| f.url.as_str())),
    );
    let Ok(regex) = Regex::new(&pattern) else {
        ::log::warn!("Could not build the image URL pattern, leaving references untouched");
        return markdown.to_string();
    };

    regex
        .replace_all(markdown, |caps: &Captures<'_>| {
            let matched = &caps[0];
            local
                .get(matched)
                .cloned()
                .unwrap_or_else(|| matched.to_string())
        })
        .into_owned()
}

/// List item marker at the start of a line
static LIST_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[*+-]|\d+\.)\s").expect("BUG: hardcoded list item pattern is invalid")
});

/// Where a line sits, which decides how a warning can be attached to it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineContext {
    /// Ordinary paragraph line; the warning goes in a blockquote above it
    Block,
    /// List item, continuation or quote line; the warning stays on the line
    Inline,
    /// Table row; the warning stays in the cell with pipes escaped
    TableRow,
}

impl LineContext {
    fn of(line: &str) -> Self {
        let trimmed = line.trim_start();
        if trimmed.starts_with('|') {
            LineContext::TableRow
        } else if trimmed.starts_with('>')
            || line.starts_with([' ', '\t'])
            || LIST_ITEM.is_match(line)
        {
            LineContext::Inline
        } else {
            LineContext::Block
        }
    }
}

fn mark_failed(markdown: &str, failed: &[FailedImageRecord]) -> String {
    let by_url: HashMap<&str, &FailedImageRecord> =
        failed.iter().map(|f| (f.url.as_str(), f)).collect();

    // An image wrapped in a link is matched together with the link so the
    // warning lands after the whole link
    let pattern = format!(
        r"(\[)?!\[([^\]]*)\]\(<?({})>?\)(\]\([^)]*\))?",
        url_alternation(failed.iter().map(|f| f.url.as_str()))
    );
    let Ok(regex) = Regex::new(&pattern) else {
        ::log::warn!("Could not build the failed image pattern, leaving references untouched");
        return markdown.to_string();
    };

    let mut out: Vec<String> = Vec::new();
    let mut fence: Option<&str> = None;

    for line in markdown.lines() {
        if let Some(open) = fence {
            if line.trim() == open {
                fence = None;
            }
            out.push(line.to_string());
            continue;
        }
        if let Some(marker) = ["```", "~~~~"]
            .into_iter()
            .find(|m| line.trim_start().starts_with(m))
        {
            fence = Some(marker);
            out.push(line.to_string());
            continue;
        }

        let context = LineContext::of(line);
        let mut blocks: Vec<&FailedImageRecord> = Vec::new();
        let rewritten = regex.replace_all(line, |caps: &Captures<'_>| {
            let url = &caps[3];
            let prefix = if caps.get(1).is_some() { "[" } else { "" };
            let suffix = caps.get(4).map_or("", |m| m.as_str());
            let mut text = format!("{prefix}![{}]({url}){suffix}", flagged_alt(&caps[2]));

            if let Some(record) = by_url.get(url).copied() {
                match context {
                    LineContext::Block => {
                        if !blocks.iter().any(|b| b.url == record.url) {
                            blocks.push(record);
                        }
                    }
                    LineContext::Inline => {
                        text.push(' ');
                        text.push_str(&warning(record));
                    }
                    LineContext::TableRow => {
                        text.push(' ');
                        text.push_str(&warning(record).replace('|', "\\|"));
                    }
                }
            }
            text
        });

        if !blocks.is_empty() {
            if out.last().is_some_and(|l| !l.trim().is_empty()) {
                out.push(String::new());
            }
            for record in blocks {
                out.push(format!("> {}", warning(record)));
                out.push(String::new());
            }
        }
        out.push(rewritten.into_owned());
    }

    out.join("\n")
}

fn flagged_alt(alt: &str) -> String {
    let alt = alt.trim();
    if alt.is_empty() {
        "(download failed)".to_string()
    } else {
        format!("{alt} (download failed)")
    }
}

fn warning(record: &FailedImageRecord) -> String {
    format!(
        "**Image unavailable** ({}) original: <{}>",
        record.error_reason, record.url
    )
}
