use crate::results::{FailedImageRecord, FailureKind};
use std::fmt::Write;

const REMEDIATION: [(FailureKind, &str); 3] = [
    (
        FailureKind::CrossOrigin,
        "The server refused the download or the connection was blocked.\n  \
         Open the URL in a browser while signed in to the site and save the image manually,\n  \
         or retry from a network that can reach the image host.",
    ),
    (
        FailureKind::NotFound,
        "The image no longer exists at that address.\n  \
         Check the page for an updated image or ask the site maintainers for the asset.",
    ),
    (
        FailureKind::Other,
        "The download failed for another reason, such as a timeout or a server error.\n  \
         Retrying later usually helps; the list below can be fed to a download tool.",
    ),
];

/// Plain-text report of failed downloads, `None` when nothing failed
pub fn failure_report(document_title: &str, failed: &[FailedImageRecord]) -> Option<String> {
    if failed.is_empty() {
        return None;
    }

    let mut out = String::new();
    let _ = writeln!(out, "Image download report for \"{document_title}\"");
    let _ = writeln!(
        out,
        "{} image(s) could not be downloaded and are linked to their original location.",
        failed.len()
    );

    // Group by page, pages in order of first failure
    let mut pages: Vec<(&str, Vec<&FailedImageRecord>)> = Vec::new();
    for record in failed {
        match pages.iter_mut().find(|(title, _)| *title == record.page_title) {
            Some((_, records)) => records.push(record),
            None => pages.push((record.page_title.as_str(), vec![record])),
        }
    }

    for (title, records) in &pages {
        let _ = writeln!(out, "\n== {title} ==");
        for record in records {
            let _ = writeln!(out, "- {}", record.url);
            if !record.alt_text.is_empty() {
                let _ = writeln!(out, "  alt text: {}", record.alt_text);
            }
            if !record.context_snippet.is_empty() {
                let _ = writeln!(out, "  context: {}", record.context_snippet);
            }
            let _ = writeln!(out, "  reason: {}", record.error_reason);
            let _ = writeln!(out, "  classification: {}", record.kind);
        }
    }

    let _ = writeln!(out, "\nWhat to try");
    for (kind, advice) in REMEDIATION {
        if failed.iter().any(|r| r.kind == kind) {
            let _ = writeln!(out, "* {kind}:\n  {advice}");
        }
    }

    let _ = writeln!(out, "\nFailed URLs");
    for record in failed {
        let _ = writeln!(out, "{}", record.url);
    }

    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn failure(url: &str, page: &str, kind: FailureKind) -> FailedImageRecord {
        FailedImageRecord {
            url: Url::parse(url).unwrap(),
            error_reason: "HTTP 403".into(),
            kind,
            page_title: page.into(),
            alt_text: "Logo".into(),
            context_snippet: "Our logo".into(),
        }
    }

    #[test]
    fn test_no_failures_no_report() {
        assert!(failure_report("Docs", &[]).is_none());
    }

    #[test]
    fn test_report_groups_by_page() {
        let failed = vec![
            failure("https://x.dev/a.png", "Intro", FailureKind::CrossOrigin),
            failure("https://x.dev/b.png", "Setup", FailureKind::CrossOrigin),
            failure("https://x.dev/c.png", "Intro", FailureKind::NotFound),
        ];
        let report = failure_report("Docs", &failed).unwrap();

        assert!(report.contains("3 image(s)"));
        assert_eq!(report.matches("== Intro ==").count(), 1);
        let intro = report.find("== Intro ==").unwrap();
        let setup = report.find("== Setup ==").unwrap();
        let c = report.find("- https://x.dev/c.png").unwrap();
        assert!(intro < c && c < setup);

        assert!(report.contains("* cross-origin / access blocked:"));
        assert!(report.contains("* not found:"));
        assert!(!report.contains("* other:"));
        assert!(report.ends_with("https://x.dev/a.png\nhttps://x.dev/b.png\nhttps://x.dev/c.png\n"));
    }
}
