//! Lumen CLI - personal photo library ingestion.
//!
//! Lumen ingests images into a local library: EXIF metadata, derived tags
//! (date, region, lens, resolution), and fixed-aspect thumbnails, with an
//! optional AI captioning step.
//!
//! # Usage
//!
//! ```bash
//! # Ingest a file or a directory tree
//! lumen ingest ./photos/
//!
//! # Regenerate all thumbnails
//! lumen regen-thumbs --force
//!
//! # Caption one image with the configured AI provider
//! lumen caption 42
//!
//! # View configuration
//! lumen config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod library;
mod logging;

/// Lumen - personal photo library ingestion.
#[derive(Parser, Debug)]
#[command(name = "lumen")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest images into the library
    Ingest(cli::ingest::IngestArgs),

    /// Regenerate thumbnails for library images
    RegenThumbs(cli::regen::RegenArgs),

    /// Caption an image with the configured AI provider
    Caption(cli::caption::CaptionArgs),

    /// Search library images with a free-text query
    Search(cli::search::SearchArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging from config, with CLI verbose override.
    // Note: logging isn't initialized yet, so use eprintln for config warnings.
    let config = match lumen_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `lumen config path`."
            );
            lumen_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Lumen v{}", lumen_core::VERSION);

    // Dispatch to the appropriate command handler
    match cli.command {
        Commands::Ingest(args) => cli::ingest::execute(args, config).await,
        Commands::RegenThumbs(args) => cli::regen::execute(args, config).await,
        Commands::Caption(args) => cli::caption::execute(args, config).await,
        Commands::Search(args) => cli::search::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
