use std::time::Duration;

/// Longest output file stem, in characters
const MAX_STEM_CHARS: usize = 100;

/// Turn a document title into a file name stem safe on common filesystems
pub fn sanitize_filename(title: &str) -> String {
    let name: String = title
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '?' | '&' | '=' | '#' | '%' | '*' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c if c.is_whitespace() => '-',
            c => c,
        })
        .take(MAX_STEM_CHARS)
        .collect();

    let name = name.trim_matches(['-', '_', '.']);
    if name.is_empty() {
        "documentation".to_string()
    } else {
        name.to_string()
    }
}

/// Format a duration as seconds with two decimals, for run summaries
pub fn format_elapsed(elapsed: Duration) -> String {
    format!("{:.2}s", elapsed.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Getting Started", "Getting-Started")]
    #[case("API: v2/Reference?", "API_-v2_Reference")]
    #[case("  ", "documentation")]
    #[case("../..", "documentation")]
    #[case("Überblick", "Überblick")]
    fn test_sanitize_filename(#[case] title: &str, #[case] expected: &str) {
        assert_eq!(sanitize_filename(title), expected);
    }

    #[test]
    fn test_sanitize_filename_limits_length_on_char_boundaries() {
        let long = "é".repeat(300);
        assert_eq!(sanitize_filename(&long).chars().count(), MAX_STEM_CHARS);
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_millis(1500)), "1.50s");
    }
}
