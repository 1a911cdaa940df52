//! The `lumen caption` command: AI captioning for one library image.

use clap::Args;
use lumen_core::caption::{retry, CaptionProviderFactory, ImageInput};
use lumen_core::{BlobStore, Config, ImageStore, TagSource, TagStore};

use super::open_stores;

/// Arguments for the `caption` command.
#[derive(Args, Debug)]
pub struct CaptionArgs {
    /// Library image id to caption
    pub id: u64,

    /// Print the caption without updating the library
    #[arg(long)]
    pub dry_run: bool,
}

/// Execute the caption command.
pub async fn execute(args: CaptionArgs, config: Config) -> anyhow::Result<()> {
    let stores = open_stores(&config)?;
    let mut record = stores.library.get(args.id).await?;

    let bytes = stores.blobs.read(&record.file_key).await?;
    // Sniff the format from the bytes; the stored key may lack an extension.
    let format =
        lumen_core::pipeline::decode::sniff_format(&bytes).unwrap_or_else(|| "jpeg".to_string());
    let image = ImageInput::from_bytes(&bytes, &format);

    let provider =
        CaptionProviderFactory::create(&config.caption, config.limits.caption_timeout_ms)?;
    tracing::info!("Captioning image {} via {}", record.id, provider.name());

    // Retry transient failures; fall back to the stock caption otherwise.
    let mut attempt = 0;
    let caption = loop {
        match provider.analyze(&image).await {
            Ok(caption) => break caption,
            Err(e) if retry::is_retryable(&e) && attempt + 1 < config.pipeline.retry_attempts => {
                let delay = retry::backoff_duration(attempt, config.pipeline.retry_delay_ms);
                tracing::warn!("Caption attempt {} failed ({}), retrying in {:?}", attempt + 1, e, delay);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::warn!("Captioning failed ({}), using fallback caption", e);
                break lumen_core::caption::fallback_caption();
            }
        }
    };

    println!("{}", caption.description);
    for tag in &caption.tags {
        println!("  #{}", tag);
    }

    if !args.dry_run {
        record.description = caption.description;
        stores.library.update(&record).await?;
        for name in &caption.tags {
            let tag = stores.library.get_or_create(name, TagSource::Ai).await?;
            stores.library.associate(record.id, tag.id).await?;
        }
        tracing::info!("Image {} updated with caption and {} tags", record.id, caption.tags.len());
    }
    Ok(())
}
