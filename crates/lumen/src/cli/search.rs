//! The `lumen search` command: free-text search via the caption provider.

use clap::Args;
use lumen_core::caption::CaptionProviderFactory;
use lumen_core::{Config, ImageStore, ImageSummary};

use super::open_stores;

/// Arguments for the `search` command.
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Free-text query (e.g. "海边的日落")
    pub query: String,
}

/// Execute the search command.
pub async fn execute(args: SearchArgs, config: Config) -> anyhow::Result<()> {
    let stores = open_stores(&config)?;
    let records = stores.library.list().await?;
    if records.is_empty() {
        println!("Library is empty.");
        return Ok(());
    }

    let summaries: Vec<ImageSummary> = records
        .iter()
        .map(|r| ImageSummary {
            id: r.id,
            title: r.title.clone(),
            description: r.description.clone(),
        })
        .collect();

    let provider =
        CaptionProviderFactory::create(&config.caption, config.limits.caption_timeout_ms)?;
    let ids = provider.rank(&args.query, &summaries).await?;

    if ids.is_empty() {
        println!("No matching images.");
        return Ok(());
    }
    for id in ids {
        if let Some(record) = records.iter().find(|r| r.id == id) {
            println!("{:>6}  {}  {}", record.id, record.title, record.description);
        }
    }
    Ok(())
}
