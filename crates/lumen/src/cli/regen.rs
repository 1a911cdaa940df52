//! The `lumen regen-thumbs` command: bulk thumbnail regeneration.

use std::sync::Arc;

use clap::Args;
use lumen_core::{Config, ImageStore, Ingestor, RegenOutcome};
use tokio_util::sync::CancellationToken;

use super::{create_progress_bar, open_stores};

/// Arguments for the `regen-thumbs` command.
#[derive(Args, Debug)]
pub struct RegenArgs {
    /// Regenerate even when a thumbnail already exists
    #[arg(long)]
    pub force: bool,
}

/// Execute the regen-thumbs command.
///
/// Runs with `processing.parallel_workers` concurrent regenerations.
/// Ctrl-C stops the run between images; in-flight work finishes first.
pub async fn execute(args: RegenArgs, config: Config) -> anyhow::Result<()> {
    let stores = open_stores(&config)?;
    let ingestor = Arc::new(Ingestor::new(
        &config,
        stores.library.clone(),
        stores.library.clone(),
        stores.blobs.clone(),
    ));

    let records = stores.library.list().await?;
    if records.is_empty() {
        println!("Library is empty; nothing to regenerate.");
        return Ok(());
    }
    tracing::info!("Regenerating thumbnails for {} images", records.len());

    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight work");
            cancel_on_signal.cancel();
        }
    });

    let progress = create_progress_bar(records.len() as u64);
    let progress_cb = progress.clone();
    let stats = ingestor
        .regenerate_all(records, args.force, cancel, move |record, outcome| {
            if let RegenOutcome::Failed(message) = outcome {
                tracing::error!("Image {}: {}", record.id, message);
            }
            progress_cb.inc(1);
        })
        .await;
    progress.finish_and_clear();

    eprintln!();
    eprintln!("  Regenerated:  {:>8}", stats.succeeded);
    eprintln!("  Skipped:      {:>8}", stats.skipped);
    eprintln!("  Failed:       {:>8}", stats.failed);
    eprintln!("  Total:        {:>8}", stats.total());

    if stats.failed > 0 {
        anyhow::bail!("{} thumbnails failed to regenerate", stats.failed);
    }
    Ok(())
}
