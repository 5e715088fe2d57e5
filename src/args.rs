use clap::Parser;
use docpack::{GeneratorConfig, OutputFormat};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "docpack")]
#[command(about = "Bundle a documentation site into one Markdown or print-ready HTML document")]
#[command(version)]
pub struct Args {
    /// Seed page of the documentation site
    pub url: String,

    /// JSON configuration file; flags below override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Artifact(s) to produce
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Pause after every page fetch, in milliseconds
    #[arg(long)]
    pub page_delay_ms: Option<u64>,

    /// Concurrent image downloads per batch
    #[arg(long)]
    pub image_batch_size: Option<usize>,

    /// Keep remote image links instead of downloading images
    #[arg(long)]
    pub no_images: bool,

    /// Do not number code block lines
    #[arg(long)]
    pub no_line_numbers: bool,

    /// WebDriver endpoint for the browser fallback
    #[arg(long)]
    pub webdriver_url: Option<String>,
}

impl Args {
    /// Apply the flags that were given on top of `config`
    pub fn apply(&self, mut config: GeneratorConfig) -> GeneratorConfig {
        if let Some(format) = self.format {
            config.output_format = format;
        }
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        if let Some(delay) = self.page_delay_ms {
            config.page_delay_ms = delay;
        }
        if let Some(size) = self.image_batch_size {
            config.image_batch_size = size;
        }
        if self.no_images {
            config.download_images = false;
        }
        if self.no_line_numbers {
            config.number_code_lines = false;
        }
        if let Some(url) = &self.webdriver_url {
            config.webdriver_url = url.clone();
        }
        config
    }
}
