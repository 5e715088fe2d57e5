pub mod assemble;
pub mod config;
pub mod crawlers;
pub mod discovery;
pub mod error;
pub mod extract;
pub mod filter;
pub mod host;
pub mod images;
pub mod markdown;
pub mod parsers;
pub mod pipeline;
pub mod results;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::{GeneratorConfig, OutputFormat};
pub use error::GenerateError;
pub use host::{BinaryResponse, HostBridge, NativeHost, SeedPage};
pub use pipeline::generate;
pub use results::{Artifact, PageContent, PageRef, RunSummary};
