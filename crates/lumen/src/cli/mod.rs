//! CLI command implementations.

pub mod caption;
pub mod config;
pub mod ingest;
pub mod regen;
pub mod search;

use std::sync::Arc;

use lumen_core::store::fs::FsBlobStore;
use lumen_core::Config;

use crate::library::JsonLibrary;

/// The stores every library command works against.
pub struct Stores {
    pub library: Arc<JsonLibrary>,
    pub blobs: Arc<FsBlobStore>,
}

/// Open the library index and blob store under the configured media root.
pub fn open_stores(config: &Config) -> anyhow::Result<Stores> {
    let media_root = config.media_root();
    std::fs::create_dir_all(&media_root)?;
    let library = Arc::new(JsonLibrary::open(&media_root)?);
    let blobs = Arc::new(FsBlobStore::new(&media_root));
    Ok(Stores { library, blobs })
}

/// Create a progress bar for batch operations.
pub fn create_progress_bar(total: u64) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
            )
            .unwrap()
            .progress_chars("##-"),
    );
    pb.set_message("starting...");
    pb
}
