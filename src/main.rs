use clap::Parser;
use docpack::utils::format_elapsed;
use docpack::{GeneratorConfig, NativeHost, generate};
use std::process::ExitCode;
use url::Url;

mod args;
use args::Args;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    env_logger::init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match GeneratorConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                ::log::error!("Failed to load config {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => GeneratorConfig::default(),
    };
    let config = args.apply(config.with_env_overrides());

    let seed_url = match Url::parse(&args.url) {
        Ok(url) => url,
        Err(e) => {
            ::log::error!("Invalid seed URL {}: {}", args.url, e);
            return ExitCode::FAILURE;
        }
    };

    let host = match NativeHost::new(&config) {
        Ok(host) => host,
        Err(e) => {
            ::log::error!("Failed to set up HTTP client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let start_time = std::time::Instant::now();
    ::log::info!("Loading seed page {}", seed_url);

    let seed = match host.load_seed(&seed_url).await {
        Ok(seed) => seed,
        Err(e) => {
            ::log::error!("Failed to load seed page {}: {}", seed_url, e);
            host.shutdown().await;
            return ExitCode::FAILURE;
        }
    };

    let result = generate(&host, &seed, &config).await;
    host.shutdown().await;

    match result {
        Ok(summary) => {
            println!(
                "Bundled {} pages ({} placeholders) and {} images ({} failed) into {} in {}",
                summary.pages,
                summary.pages_failed,
                summary.images_downloaded,
                summary.images_failed,
                config.output_dir.display(),
                format_elapsed(start_time.elapsed())
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            ::log::error!("Generation failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
