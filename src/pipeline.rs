//! The generation run: discover, fetch, convert, collect images, assemble
//! and deliver.

use crate::assemble::{build_toc, composite_document, markdown_bundle};
use crate::config::GeneratorConfig;
use crate::crawlers::PageFetcher;
use crate::discovery::discover_pages;
use crate::error::{ConfigError, GenerateError};
use crate::extract::ExtractOptions;
use crate::filter::UrlFilter;
use crate::host::{HostBridge, SeedPage};
use crate::images::{DownloadOptions, ImageStore, collect_references, download_images};
use crate::markdown;
use crate::results::{Document, RunSummary};
use std::collections::HashSet;

/// Mutable state of one run, dropped when the run ends
#[derive(Debug, Default)]
pub struct RunContext {
    /// Normalized URLs already discovered
    pub seen_urls: HashSet<String>,
    pub images: ImageStore,
    pub summary: RunSummary,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Bundle the documentation site around `seed` into the configured artifacts.
///
/// Page and image failures degrade the output but never abort the run; only
/// an empty navigation, an invalid URL pattern or a failed delivery do.
pub async fn generate(
    host: &dyn HostBridge,
    seed: &SeedPage,
    config: &GeneratorConfig,
) -> Result<RunSummary, GenerateError> {
    let mut ctx = RunContext::new();
    ::log::info!("Starting documentation run from {}", seed.url);

    let filter = UrlFilter::for_seed(&seed.url, &config.include_patterns, &config.exclude_patterns)
        .map_err(ConfigError::Pattern)?;

    host.report_progress("Discovering pages", 0, 1);
    let pages = discover_pages(&seed.html, &seed.url, &filter, &mut ctx.seen_urls);
    if pages.is_empty() {
        ::log::error!("No documentation links found in the navigation of {}", seed.url);
        return Err(GenerateError::NoPagesDiscovered(seed.url.to_string()));
    }
    host.report_progress("Discovering pages", 1, 1);

    let options = ExtractOptions {
        number_code_lines: config.number_code_lines,
    };
    let fetcher = PageFetcher::new(host, seed, options, config.page_delay());
    let entries = fetcher.fetch_all(&pages).await;

    ctx.summary.pages = entries.len();
    ctx.summary.pages_failed = entries.iter().filter(|(_, c)| c.is_placeholder()).count();
    if ctx.summary.pages_failed > 0 {
        ::log::warn!(
            "{} of {} pages could not be loaded and were replaced by placeholders",
            ctx.summary.pages_failed,
            ctx.summary.pages
        );
    }

    let wants_markdown = config.output_format.wants_markdown();
    let page_markdown: Vec<String> = if wants_markdown {
        host.report_progress("Converting to Markdown", 0, entries.len());
        entries
            .iter()
            .map(|(_, content)| markdown::convert(&content.html))
            .collect()
    } else {
        Vec::new()
    };

    if wants_markdown && config.download_images {
        let references = collect_references(&entries);
        ::log::info!("Found {} unique images", references.len());
        let download = DownloadOptions {
            batch_size: config.image_batch_size,
            batch_delay: config.image_batch_delay(),
        };
        download_images(host, &references, download, &mut ctx.images).await;
    }

    ctx.summary.images_downloaded = ctx.images.downloaded().len();
    ctx.summary.images_failed = ctx.images.failed().len();

    host.report_progress("Assembling document", 0, 1);
    let (images, failed_images) = std::mem::take(&mut ctx.images).into_parts();
    let toc = build_toc(&entries);
    let document = Document {
        title: document_title(seed),
        source_url: seed.url.clone(),
        entries,
        toc,
        images,
        failed_images,
    };

    if wants_markdown {
        host.deliver_artifact(markdown_bundle(&document, &page_markdown)).await?;
    }
    if config.output_format.wants_composite() {
        host.deliver_artifact(composite_document(&document)).await?;
    }
    host.report_progress("Assembling document", 1, 1);

    ::log::info!(
        "Run finished: {} pages ({} failed), {} images ({} failed)",
        ctx.summary.pages,
        ctx.summary.pages_failed,
        ctx.summary.images_downloaded,
        ctx.summary.images_failed
    );
    Ok(ctx.summary)
}

fn document_title(seed: &SeedPage) -> String {
    let title = seed.title.trim();
    if !title.is_empty() {
        return title.to_string();
    }
    seed.url
        .host_str()
        .map(str::to_string)
        .unwrap_or_else(|| seed.url.to_string())
}
