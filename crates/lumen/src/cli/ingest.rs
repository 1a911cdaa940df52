//! The `lumen ingest` command: bulk ingestion of files and directories.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use clap::Args;
use lumen_core::{Config, FileDiscovery, Ingestor, NewUpload};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::{create_progress_bar, open_stores};

/// Arguments for the `ingest` command.
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Image file or directory to ingest
    pub path: PathBuf,

    /// Owner id recorded on the new images
    #[arg(long, default_value_t = 1)]
    pub owner: u64,

    /// Title override (single-file ingest only; defaults to the file name)
    #[arg(long)]
    pub title: Option<String>,

    /// Description for the new record (single-file ingest only)
    #[arg(long)]
    pub description: Option<String>,

    /// Concurrent uploads (defaults to processing.parallel_workers)
    #[arg(long)]
    pub parallel: Option<usize>,
}

/// Execute the ingest command.
pub async fn execute(args: IngestArgs, config: Config) -> anyhow::Result<()> {
    let stores = open_stores(&config)?;
    let ingestor = Arc::new(Ingestor::new(
        &config,
        stores.library.clone(),
        stores.library.clone(),
        stores.blobs.clone(),
    ));

    let discovery = FileDiscovery::new(config.processing.clone());
    let files = discovery.discover(&args.path);
    if files.is_empty() {
        anyhow::bail!("No supported images found at: {}", args.path.display());
    }
    if (args.title.is_some() || args.description.is_some()) && files.len() > 1 {
        anyhow::bail!("--title and --description only apply when ingesting a single file");
    }
    tracing::info!(
        "Found {} images ({:.1} MB)",
        files.len(),
        FileDiscovery::total_size(&files) as f64 / 1_000_000.0
    );

    let workers = args
        .parallel
        .unwrap_or(config.processing.parallel_workers)
        .max(1);
    let semaphore = Arc::new(Semaphore::new(workers));
    let progress = create_progress_bar(files.len() as u64);
    let succeeded = Arc::new(AtomicU64::new(0));
    let failed = Arc::new(AtomicU64::new(0));
    let total_bytes = Arc::new(AtomicU64::new(0));
    let start_time = std::time::Instant::now();

    let mut tasks = JoinSet::new();
    for file in files {
        let permit = semaphore.clone().acquire_owned().await?;
        let ingestor_task = ingestor.clone();
        let progress_task = progress.clone();
        let succeeded_task = succeeded.clone();
        let failed_task = failed.clone();
        let total_bytes_task = total_bytes.clone();
        let owner = args.owner;
        let title = args.title.clone();
        let description = args.description.clone();

        tasks.spawn(async move {
            let _permit = permit;
            let file_name = file
                .path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("unknown")
                .to_string();

            let result = match tokio::fs::read(&file.path).await {
                Ok(bytes) => {
                    ingestor_task
                        .ingest(NewUpload {
                            owner_id: owner,
                            file_name,
                            title,
                            description,
                            bytes,
                        })
                        .await
                }
                Err(e) => {
                    failed_task.fetch_add(1, Ordering::SeqCst);
                    tracing::error!("Failed to read {:?}: {}", file.path, e);
                    progress_task.inc(1);
                    return;
                }
            };

            match result {
                Ok(record) => {
                    succeeded_task.fetch_add(1, Ordering::SeqCst);
                    total_bytes_task.fetch_add(file.size, Ordering::SeqCst);
                    tracing::debug!("Ingested {:?} as image {}", file.path, record.id);
                }
                Err(e) => {
                    failed_task.fetch_add(1, Ordering::SeqCst);
                    tracing::error!("Failed: {:?} - {}", file.path, e);
                }
            }
            progress_task.inc(1);
        });

        let elapsed = start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            let done = succeeded.load(Ordering::SeqCst) + failed.load(Ordering::SeqCst);
            progress.set_message(format!("{:.1} img/sec", done as f64 / elapsed));
        }
    }
    while tasks.join_next().await.is_some() {}

    let elapsed = start_time.elapsed();
    progress.finish_and_clear();
    print_summary(
        succeeded.load(Ordering::SeqCst),
        failed.load(Ordering::SeqCst),
        total_bytes.load(Ordering::SeqCst),
        elapsed,
    );

    if failed.load(Ordering::SeqCst) > 0 {
        anyhow::bail!("{} images failed to ingest", failed.load(Ordering::SeqCst));
    }
    Ok(())
}

/// Print a formatted summary table after ingestion.
fn print_summary(succeeded: u64, failed: u64, total_bytes: u64, elapsed: std::time::Duration) {
    let rate = if elapsed.as_secs_f64() > 0.0 {
        succeeded as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };
    let throughput = if elapsed.as_secs_f64() > 0.0 {
        (total_bytes as f64 / 1_000_000.0) / elapsed.as_secs_f64()
    } else {
        0.0
    };

    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Ingested:     {:>8}", succeeded);
    if failed > 0 {
        eprintln!("    Failed:       {:>8}", failed);
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Total:        {:>8}", succeeded + failed);
    eprintln!("    Duration:     {:>7.1}s", elapsed.as_secs_f64());
    eprintln!("    Rate:         {:>7.1} img/sec", rate);
    eprintln!("    Throughput:   {:>7.1} MB/sec", throughput);
    eprintln!("  ====================================");
}
