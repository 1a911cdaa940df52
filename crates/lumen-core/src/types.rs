//! Core data types for the Lumen ingestion pipeline.
//!
//! These types flow between the pipeline stages and the backing stores:
//! the metadata record produced per extraction, the tag vocabulary, the
//! thumbnail buffer, and the owning image record.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A decimal-degree GPS coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPosition {
    /// Latitude in decimal degrees (negative = southern hemisphere)
    pub latitude: f64,
    /// Longitude in decimal degrees (negative = western hemisphere)
    pub longitude: f64,
}

impl GpsPosition {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl std::fmt::Display for GpsPosition {
    /// Six decimal places, the precision stored on the image record.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

/// Metadata extracted from one image, plus the tags derived from it.
///
/// Ephemeral: produced per extraction call, merged into the owning
/// [`ImageRecord`] by the orchestrator, never persisted on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// Width of the decoded frame in pixels, before orientation is applied
    pub width: u32,

    /// Height of the decoded frame in pixels, before orientation is applied
    pub height: u32,

    /// Capture timestamp from the primary DateTime field, if parseable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<NaiveDateTime>,

    /// GPS coordinate, if both axes and their hemisphere refs were present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GpsPosition>,

    /// Human-readable tags derived from the metadata (date, region, lens,
    /// resolution). Deduplication happens in the tag store, not here.
    pub derived_tags: Vec<String>,
}

/// Where a tag came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagSource {
    /// Added manually by a user
    User,
    /// Derived from embedded EXIF metadata
    Exif,
    /// Produced by the AI captioning service
    Ai,
}

impl TagSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagSource::User => "user",
            TagSource::Exif => "exif",
            TagSource::Ai => "ai",
        }
    }
}

/// A tag as persisted by the tag store.
///
/// Names are globally unique regardless of source; a name proposed with
/// source=exif that already exists as a user tag reuses the existing entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTag {
    pub id: u64,
    pub name: String,
    pub source: TagSource,
}

/// An encoded thumbnail, owned transiently by the caller.
///
/// The generator retains nothing after the call returns; persisting the
/// bytes and discarding any previous thumbnail file is the caller's job.
#[derive(Debug, Clone)]
pub struct Thumbnail {
    /// JPEG-encoded bytes
    pub bytes: Vec<u8>,
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
}

/// The persisted record for one uploaded image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Store-assigned identifier (0 until created)
    pub id: u64,

    /// Owning user
    pub owner_id: u64,

    /// Display title (defaults to the file name on upload)
    pub title: String,

    /// Free-text description
    #[serde(default)]
    pub description: String,

    /// Blob store key of the original bytes
    pub file_key: String,

    /// Blob store key of the thumbnail, once one exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_key: Option<String>,

    /// Pixel dimensions, set once metadata extraction succeeds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,

    /// Capture timestamp from EXIF, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shot_at: Option<NaiveDateTime>,

    /// Location rendered as "lat, lon" with six decimal places
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// When the upload was ingested
    pub uploaded_at: DateTime<Utc>,
}

impl ImageRecord {
    /// Build the bare record persisted before any pipeline stage runs.
    pub fn bare(owner_id: u64, title: impl Into<String>, file_key: impl Into<String>) -> Self {
        Self {
            id: 0,
            owner_id,
            title: title.into(),
            description: String::new(),
            file_key: file_key.into(),
            thumbnail_key: None,
            width: None,
            height: None,
            shot_at: None,
            location: None,
            uploaded_at: Utc::now(),
        }
    }
}

/// Per-item outcome of a thumbnail regeneration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegenOutcome {
    /// A new thumbnail was generated and stored
    Regenerated,
    /// The thumbnail already existed and force was off; nothing was written
    SkippedExists,
    /// Regeneration failed; the record is left as it was
    Failed(String),
}

/// Aggregate counts for a bulk regeneration run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegenStats {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RegenStats {
    pub fn record(&mut self, outcome: &RegenOutcome) {
        match outcome {
            RegenOutcome::Regenerated => self.succeeded += 1,
            RegenOutcome::SkippedExists => self.skipped += 1,
            RegenOutcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }
}

/// The caption service's answer for one image: a short description and
/// exactly four tags (padded/truncated by the provider layer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Caption {
    pub description: String,
    pub tags: Vec<String>,
}

/// The slice of an image record the caption service sees when ranking
/// images against a search query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSummary {
    pub id: u64,
    pub title: String,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gps_position_display_six_decimals() {
        let pos = GpsPosition::new(39.9042, 116.407396);
        assert_eq!(pos.to_string(), "39.904200, 116.407396");
    }

    #[test]
    fn test_gps_position_display_negative() {
        let pos = GpsPosition::new(-33.856784, -151.215297);
        assert_eq!(pos.to_string(), "-33.856784, -151.215297");
    }

    #[test]
    fn test_tag_source_as_str() {
        assert_eq!(TagSource::User.as_str(), "user");
        assert_eq!(TagSource::Exif.as_str(), "exif");
        assert_eq!(TagSource::Ai.as_str(), "ai");
    }

    #[test]
    fn test_bare_record_has_no_metadata() {
        let record = ImageRecord::bare(7, "beach.jpg", "images/beach.jpg");
        assert_eq!(record.id, 0);
        assert_eq!(record.owner_id, 7);
        assert!(record.width.is_none());
        assert!(record.shot_at.is_none());
        assert!(record.thumbnail_key.is_none());
    }

    #[test]
    fn test_regen_stats_record() {
        let mut stats = RegenStats::default();
        stats.record(&RegenOutcome::Regenerated);
        stats.record(&RegenOutcome::SkippedExists);
        stats.record(&RegenOutcome::Failed("boom".into()));
        stats.record(&RegenOutcome::Regenerated);
        assert_eq!(stats.succeeded, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.total(), 4);
    }

    #[test]
    fn test_image_record_serde_skips_none() {
        let record = ImageRecord::bare(1, "t", "k");
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("thumbnail_key"));
        assert!(!json.contains("shot_at"));
        let parsed: ImageRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.file_key, "k");
    }
}
