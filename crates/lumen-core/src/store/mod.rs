//! Persistence seams for the ingestion pipeline.
//!
//! The pipeline never talks to a database or a filesystem directly; it goes
//! through these three traits. [`memory`] provides `Mutex<HashMap>` backed
//! implementations used in tests, [`fs`] a directory-backed blob store for
//! real libraries.

pub mod fs;
pub mod memory;

use crate::error::StoreError;
use crate::types::{ImageRecord, StoredTag, TagSource};
use async_trait::async_trait;

/// Store of the tag vocabulary and image-tag associations.
#[async_trait]
pub trait TagStore: Send + Sync {
    /// Look up a tag by name, creating it with `default_source` if absent.
    ///
    /// Atomic with respect to concurrent calls for the same name: exactly
    /// one tag entity exists per name afterwards, and every caller gets it.
    /// An existing tag keeps its original source.
    async fn get_or_create(
        &self,
        name: &str,
        default_source: TagSource,
    ) -> Result<StoredTag, StoreError>;

    /// Associate a tag with an image. Idempotent; associating the same pair
    /// twice is not an error and stores one link.
    async fn associate(&self, image_id: u64, tag_id: u64) -> Result<(), StoreError>;

    /// Tags associated with an image, in association order.
    async fn tags_for(&self, image_id: u64) -> Result<Vec<StoredTag>, StoreError>;
}

/// Store of raw file bytes, keyed by a path-like string.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// Delete a blob. Returns false if it did not exist.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;
}

/// Store of image records.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Persist a new record, returning its assigned id.
    async fn create(&self, record: &ImageRecord) -> Result<u64, StoreError>;

    /// Replace the stored record matching `record.id`.
    async fn update(&self, record: &ImageRecord) -> Result<(), StoreError>;

    async fn get(&self, id: u64) -> Result<ImageRecord, StoreError>;

    /// All records, ordered by id.
    async fn list(&self) -> Result<Vec<ImageRecord>, StoreError>;
}
