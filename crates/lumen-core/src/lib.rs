//! Lumen Core - photo library ingestion pipeline.
//!
//! Lumen takes uploaded image bytes and turns them into library entries:
//! EXIF metadata, derived tags (date, region, lens, resolution), and
//! fixed-aspect JPEG thumbnails. Persistence goes through the [`store`]
//! traits, so the pipeline runs the same against memory, a directory
//! tree, or whatever a caller wires in.
//!
//! # Architecture
//!
//! ```text
//! Upload → Validate → Decode → Metadata/Tags → Thumbnail → Stores
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use lumen_core::{Config, Ingestor, NewUpload};
//!
//! let config = Config::load()?;
//! let ingestor = Ingestor::new(&config, images, tags, blobs);
//! let record = ingestor.ingest(NewUpload::new(1, "beach.jpg", bytes)).await?;
//! ```

// Module declarations
pub mod caption;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod store;
pub mod types;

// Re-exports for convenient access
pub use caption::{CaptionProvider, CaptionProviderFactory, ImageInput};
pub use config::Config;
pub use error::{ConfigError, LumenError, PipelineError, PipelineResult, Result, StoreError};
pub use pipeline::{FileDiscovery, GeoTagger, Ingestor, MetadataExtractor, NewUpload, ThumbnailGenerator};
pub use store::{BlobStore, ImageStore, TagStore};
pub use types::{
    Caption, GpsPosition, ImageMetadata, ImageRecord, ImageSummary, RegenOutcome, RegenStats,
    StoredTag, TagSource, Thumbnail,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
pub(crate) mod test_util {
    /// Encode a blank RGB PNG of the given size, for pipeline tests.
    pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::DynamicImage::new_rgb8(width, height);
        let mut buffer = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buffer, image::ImageFormat::Png)
            .expect("in-memory PNG encode");
        buffer.into_inner()
    }
}
