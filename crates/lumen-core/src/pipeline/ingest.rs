//! Pipeline orchestration - wires the stages together over the stores.
//!
//! Failure policy: a decode failure is fatal for the upload (the bare
//! record stays behind), while tagging and thumbnail failures are logged
//! and swallowed so the upload still lands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::PipelineError;
use crate::store::{BlobStore, ImageStore, TagStore};
use crate::types::{ImageRecord, RegenOutcome, RegenStats, TagSource};

use super::decode::{format_to_string, ImageDecoder};
use super::metadata::MetadataExtractor;
use super::thumbnail::ThumbnailGenerator;
use super::validate::Validator;

/// One upload, as handed to the pipeline.
#[derive(Debug, Clone)]
pub struct NewUpload {
    /// Owning user
    pub owner_id: u64,
    /// Original file name; becomes the blob key suffix
    pub file_name: String,
    /// Display title; the file name is used when absent
    pub title: Option<String>,
    /// Free-text description for the new record
    pub description: Option<String>,
    /// Raw file bytes
    pub bytes: Vec<u8>,
}

impl NewUpload {
    /// Build an upload with no title or description override.
    pub fn new(owner_id: u64, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            owner_id,
            file_name: file_name.into(),
            title: None,
            description: None,
            bytes,
        }
    }
}

/// The ingestion orchestrator.
pub struct Ingestor {
    decoder: ImageDecoder,
    thumbnails: ThumbnailGenerator,
    validator: Validator,
    images: Arc<dyn ImageStore>,
    tags: Arc<dyn TagStore>,
    blobs: Arc<dyn BlobStore>,
    workers: usize,
}

impl Ingestor {
    /// Create an ingestor with the given configuration and stores.
    pub fn new(
        config: &Config,
        images: Arc<dyn ImageStore>,
        tags: Arc<dyn TagStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            decoder: ImageDecoder::new(config.limits.clone()),
            thumbnails: ThumbnailGenerator::new(config.thumbnail.clone()),
            validator: Validator::new(config.limits.clone()),
            images,
            tags,
            blobs,
            workers: config.processing.parallel_workers.max(1),
        }
    }

    /// Ingest one upload through the full pipeline.
    ///
    /// On a decode failure the original blob and the bare record remain,
    /// so the upload can be retried or inspected later.
    pub async fn ingest(&self, upload: NewUpload) -> Result<ImageRecord, PipelineError> {
        let start = std::time::Instant::now();
        let path = PathBuf::from(&upload.file_name);
        debug!("Ingesting: {:?}", path);

        self.validator.validate(&upload.bytes, &path)?;

        let file_key = format!("images/{}", upload.file_name);
        self.blobs.write(&file_key, &upload.bytes).await?;

        let title = upload.title.as_deref().unwrap_or(&upload.file_name);
        let mut record = ImageRecord::bare(upload.owner_id, title, &file_key);
        if let Some(description) = &upload.description {
            record.description = description.clone();
        }
        record.id = self.images.create(&record).await?;

        let decoded = self.decoder.decode_from_bytes(upload.bytes.clone(), &path).await?;

        let metadata = MetadataExtractor::extract(&upload.bytes, decoded.width, decoded.height);

        record.width = Some(metadata.width);
        record.height = Some(metadata.height);
        record.shot_at = metadata.captured_at;
        record.location = metadata.location.map(|pos| pos.to_string());
        self.images.update(&record).await?;

        for name in &metadata.derived_tags {
            if let Err(e) = self.apply_tag(record.id, name).await {
                warn!("Tagging {:?} with '{}' failed: {}", path, name, e);
            }
        }

        match self.thumbnails.generate(&decoded.image, &path) {
            Ok(thumb) => {
                let thumb_key = thumbnail_key(&upload.file_name);
                match self.blobs.write(&thumb_key, &thumb.bytes).await {
                    Ok(()) => {
                        record.thumbnail_key = Some(thumb_key);
                        self.images.update(&record).await?;
                    }
                    Err(e) => warn!("Storing thumbnail for {:?} failed: {}", path, e),
                }
            }
            Err(e) => warn!("Thumbnail for {:?} failed: {}", path, e),
        }

        info!(
            "Ingested {:?} in {:?} ({} {}x{}, {} tags)",
            upload.file_name,
            start.elapsed(),
            format_to_string(decoded.format),
            decoded.width,
            decoded.height,
            metadata.derived_tags.len()
        );
        Ok(record)
    }

    async fn apply_tag(&self, image_id: u64, name: &str) -> Result<(), PipelineError> {
        let tag = self.tags.get_or_create(name, TagSource::Exif).await?;
        self.tags.associate(image_id, tag.id).await?;
        Ok(())
    }

    /// Regenerate the thumbnail for one record.
    ///
    /// Without `force`, an existing thumbnail blob short-circuits to
    /// [`RegenOutcome::SkippedExists`] with zero writes. With `force`, the
    /// new thumbnail is generated before the old blob is deleted, so a
    /// generation failure never destroys the existing one.
    pub async fn regenerate(&self, record: &ImageRecord, force: bool) -> RegenOutcome {
        match self.try_regenerate(record, force).await {
            Ok(outcome) => outcome,
            Err(e) => RegenOutcome::Failed(e.to_string()),
        }
    }

    async fn try_regenerate(
        &self,
        record: &ImageRecord,
        force: bool,
    ) -> Result<RegenOutcome, PipelineError> {
        let file_name = record
            .file_key
            .rsplit('/')
            .next()
            .unwrap_or(record.file_key.as_str());
        let thumb_key = record
            .thumbnail_key
            .clone()
            .unwrap_or_else(|| thumbnail_key(file_name));

        let existing = self.blobs.exists(&thumb_key).await?;
        if existing && !force {
            return Ok(RegenOutcome::SkippedExists);
        }

        let path = Path::new(&record.file_key);
        let bytes = self.blobs.read(&record.file_key).await?;
        let decoded = self.decoder.decode_from_bytes(bytes, path).await?;
        let thumb = self.thumbnails.generate(&decoded.image, path)?;

        if existing {
            match self.blobs.delete(&thumb_key).await {
                Ok(_) => {}
                Err(e) => warn!("Deleting old thumbnail '{}' failed: {}", thumb_key, e),
            }
        }
        self.blobs.write(&thumb_key, &thumb.bytes).await?;

        if record.thumbnail_key.as_deref() != Some(thumb_key.as_str()) {
            let mut updated = record.clone();
            updated.thumbnail_key = Some(thumb_key);
            self.images.update(&updated).await?;
        }

        Ok(RegenOutcome::Regenerated)
    }

    /// Regenerate thumbnails for many records with bounded concurrency.
    ///
    /// At most `parallel_workers` regenerations run at once. Cancellation
    /// is honored between items: in-flight work finishes, queued records
    /// are never started or counted.
    pub async fn regenerate_all<F>(
        self: &Arc<Self>,
        records: Vec<ImageRecord>,
        force: bool,
        cancel: CancellationToken,
        on_result: F,
    ) -> RegenStats
    where
        F: Fn(&ImageRecord, &RegenOutcome) + Send + Sync + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let on_result = Arc::new(on_result);
        let mut handles = Vec::with_capacity(records.len());

        for record in records {
            if cancel.is_cancelled() {
                break;
            }
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            if cancel.is_cancelled() {
                break;
            }

            let ingestor = Arc::clone(self);
            let on_result = Arc::clone(&on_result);
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let outcome = ingestor.regenerate(&record, force).await;
                on_result(&record, &outcome);
                outcome
            }));
        }

        let mut stats = RegenStats::default();
        for handle in handles {
            match handle.await {
                Ok(outcome) => stats.record(&outcome),
                Err(e) => stats.record(&RegenOutcome::Failed(format!("task panic: {}", e))),
            }
        }
        info!(
            "Regeneration finished: {} regenerated, {} skipped, {} failed",
            stats.succeeded, stats.skipped, stats.failed
        );
        stats
    }
}

/// Blob key for a record's thumbnail, derived from its file name.
pub fn thumbnail_key(file_name: &str) -> String {
    format!("thumbnails/thumb_{}", file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::pipeline::metadata::UNKNOWN_LOCATION_TAG;
    use crate::store::memory::{MemoryBlobStore, MemoryImageStore, MemoryTagStore};
    use crate::test_util::png_bytes;
    use crate::types::StoredTag;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixture {
        ingestor: Arc<Ingestor>,
        images: Arc<MemoryImageStore>,
        tags: Arc<MemoryTagStore>,
        blobs: Arc<MemoryBlobStore>,
    }

    fn fixture() -> Fixture {
        fixture_with(Config::default())
    }

    fn fixture_with(config: Config) -> Fixture {
        let images = Arc::new(MemoryImageStore::new());
        let tags = Arc::new(MemoryTagStore::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let ingestor = Arc::new(Ingestor::new(
            &config,
            images.clone(),
            tags.clone(),
            blobs.clone(),
        ));
        Fixture {
            ingestor,
            images,
            tags,
            blobs,
        }
    }

    fn upload(name: &str) -> NewUpload {
        NewUpload::new(1, name, png_bytes(8, 6))
    }

    #[tokio::test]
    async fn test_ingest_full_pipeline() {
        let f = fixture();
        let record = f.ingestor.ingest(upload("beach.png")).await.unwrap();

        assert!(record.id > 0);
        assert_eq!(record.width, Some(8));
        assert_eq!(record.height, Some(6));
        assert_eq!(record.file_key, "images/beach.png");
        assert_eq!(
            record.thumbnail_key.as_deref(),
            Some("thumbnails/thumb_beach.png")
        );

        // original and thumbnail blobs both present
        assert!(f.blobs.exists("images/beach.png").await.unwrap());
        assert!(f.blobs.exists("thumbnails/thumb_beach.png").await.unwrap());

        // no EXIF: date placeholder, unknown location, resolution
        let tags = f.tags.tags_for(record.id).await.unwrap();
        let names: Vec<_> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names.len(), 3);
        assert_eq!(names[1], UNKNOWN_LOCATION_TAG);
        assert_eq!(names[2], "8x6");
        assert!(tags.iter().all(|t| t.source == TagSource::Exif));

        // the stored record matches what was returned
        let stored = f.images.get(record.id).await.unwrap();
        assert_eq!(stored.width, Some(8));
    }

    #[tokio::test]
    async fn test_ingest_decode_failure_leaves_bare_record() {
        let f = fixture();
        // valid PNG magic, invalid body: passes validation, fails decode
        let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend_from_slice(&[0u8; 64]);
        let err = f
            .ingestor
            .ingest(NewUpload::new(1, "broken.png", bytes))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));

        // the bare record and the original blob survive
        let records = f.images.list().await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].width.is_none());
        assert!(f.blobs.exists("images/broken.png").await.unwrap());
    }

    #[tokio::test]
    async fn test_ingest_rejects_unrecognized_bytes() {
        let f = fixture();
        let err = f
            .ingestor
            .ingest(NewUpload::new(1, "doc.png", vec![0u8; 64]))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedFormat { .. }));
        // nothing was stored
        assert_eq!(f.images.list().await.unwrap().len(), 0);
        assert_eq!(f.blobs.write_count(), 0);
    }

    #[tokio::test]
    async fn test_ingest_applies_title_and_description() {
        let f = fixture();
        let record = f
            .ingestor
            .ingest(NewUpload {
                title: Some("海边的下午".to_string()),
                description: Some("退潮时拍的".to_string()),
                ..upload("dscf0042.png")
            })
            .await
            .unwrap();

        assert_eq!(record.title, "海边的下午");
        assert_eq!(record.description, "退潮时拍的");
        assert_eq!(record.file_key, "images/dscf0042.png");

        // the overrides land on the bare record, before any later stage
        let stored = f.images.get(record.id).await.unwrap();
        assert_eq!(stored.title, "海边的下午");
        assert_eq!(stored.description, "退潮时拍的");
    }

    #[tokio::test]
    async fn test_ingest_defaults_title_to_file_name() {
        let f = fixture();
        let record = f.ingestor.ingest(upload("beach.png")).await.unwrap();
        assert_eq!(record.title, "beach.png");
        assert!(record.description.is_empty());
    }

    struct FailingTagStore;

    #[async_trait]
    impl TagStore for FailingTagStore {
        async fn get_or_create(
            &self,
            _name: &str,
            _default_source: TagSource,
        ) -> Result<StoredTag, StoreError> {
            Err(StoreError::NotFound("tags offline".to_string()))
        }

        async fn associate(&self, _image_id: u64, _tag_id: u64) -> Result<(), StoreError> {
            Err(StoreError::NotFound("tags offline".to_string()))
        }

        async fn tags_for(&self, _image_id: u64) -> Result<Vec<StoredTag>, StoreError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_ingest_survives_tag_store_failure() {
        let images = Arc::new(MemoryImageStore::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let ingestor = Ingestor::new(
            &Config::default(),
            images.clone(),
            Arc::new(FailingTagStore),
            blobs.clone(),
        );

        let record = ingestor.ingest(upload("a.png")).await.unwrap();
        // tagging failed but the upload still landed with a thumbnail
        assert!(record.thumbnail_key.is_some());
        assert_eq!(record.width, Some(8));
    }

    #[tokio::test]
    async fn test_regenerate_skips_existing_without_force() {
        let f = fixture();
        let record = f.ingestor.ingest(upload("a.png")).await.unwrap();
        let writes_before = f.blobs.write_count();

        let outcome = f.ingestor.regenerate(&record, false).await;
        assert_eq!(outcome, RegenOutcome::SkippedExists);
        assert_eq!(f.blobs.write_count(), writes_before);
    }

    #[tokio::test]
    async fn test_regenerate_force_rewrites_thumbnail() {
        let f = fixture();
        let record = f.ingestor.ingest(upload("a.png")).await.unwrap();
        let writes_before = f.blobs.write_count();

        let outcome = f.ingestor.regenerate(&record, true).await;
        assert_eq!(outcome, RegenOutcome::Regenerated);
        assert_eq!(f.blobs.write_count(), writes_before + 1);
        assert!(f.blobs.exists("thumbnails/thumb_a.png").await.unwrap());
    }

    #[tokio::test]
    async fn test_regenerate_fills_missing_thumbnail_key() {
        let f = fixture();
        let mut record = f.ingestor.ingest(upload("a.png")).await.unwrap();

        // simulate a record that never got a thumbnail
        f.blobs.delete("thumbnails/thumb_a.png").await.unwrap();
        record.thumbnail_key = None;
        f.images.update(&record).await.unwrap();

        let outcome = f.ingestor.regenerate(&record, false).await;
        assert_eq!(outcome, RegenOutcome::Regenerated);
        let stored = f.images.get(record.id).await.unwrap();
        assert_eq!(
            stored.thumbnail_key.as_deref(),
            Some("thumbnails/thumb_a.png")
        );
    }

    #[tokio::test]
    async fn test_regenerate_missing_original_fails() {
        let f = fixture();
        let record = ImageRecord::bare(1, "ghost.png", "images/ghost.png");
        let outcome = f.ingestor.regenerate(&record, true).await;
        assert!(matches!(outcome, RegenOutcome::Failed(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_regenerate_all_counts_outcomes() {
        let f = fixture();
        let a = f.ingestor.ingest(upload("a.png")).await.unwrap();
        let b = f.ingestor.ingest(upload("b.png")).await.unwrap();
        let ghost = ImageRecord::bare(1, "ghost.png", "images/ghost.png");

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_cb = calls.clone();
        let stats = f
            .ingestor
            .regenerate_all(
                vec![a, b, ghost],
                false,
                CancellationToken::new(),
                move |_, _| {
                    calls_cb.fetch_add(1, Ordering::SeqCst);
                },
            )
            .await;

        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.succeeded, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_regenerate_all_honors_cancellation() {
        let f = fixture();
        let a = f.ingestor.ingest(upload("a.png")).await.unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let stats = f
            .ingestor
            .regenerate_all(vec![a], false, cancel, |_, _| {})
            .await;
        assert_eq!(stats.total(), 0);
    }
}
