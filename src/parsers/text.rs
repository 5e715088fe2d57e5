//! Small text normalization helpers.

/// Collapse every run of whitespace into a single space
pub fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            pending_space = true;
        } else {
            if pending_space {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        }
    }
    if pending_space {
        out.push(' ');
    }
    out
}

/// Collapse and trim; the visible form of a text run
pub fn visible_text(text: &str) -> String {
    collapse_whitespace(text).trim().to_string()
}

/// Number of visible characters once whitespace is collapsed
pub fn visible_length(text: &str) -> usize {
    visible_text(text).chars().count()
}

/// Cut to at most `max_chars` characters, marking the cut with an ellipsis
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut = cut.trim_end().to_string();
    cut.push('…');
    cut
}

/// Remove stray markdown heading marks and permalink pilcrows around a title
pub fn strip_heading_marks(text: &str) -> String {
    trim_closing_marks(text.trim().trim_start_matches('#'))
        .trim()
        .to_string()
}

/// Strip trailing pilcrows and a closing `#` run.
///
/// A single `#` glued to a word (`C#`) is part of the text and stays; a run
/// is only a closing mark when it stands alone or is at least two long.
pub fn trim_closing_marks(text: &str) -> &str {
    let mut rest = text.trim_end();
    loop {
        let before = rest;
        rest = rest.trim_end_matches('¶').trim_end();

        let without = rest.trim_end_matches('#');
        let run = rest.len() - without.len();
        if run >= 2 || (run == 1 && (without.is_empty() || without.ends_with(char::is_whitespace))) {
            rest = without.trim_end();
        }

        if rest.len() == before.len() {
            return rest;
        }
    }
}
