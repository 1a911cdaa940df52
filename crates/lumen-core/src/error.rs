//! Error types for the Lumen ingestion pipeline.
//!
//! Errors are organized by stage so callers can tell recoverable conditions
//! (thumbnail failed, store hiccup) from the one fatal case: the primary
//! image not decoding at all. EXIF parse problems have no variant on purpose;
//! the extractor absorbs them and returns a partial record instead.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for Lumen operations.
#[derive(Error, Debug)]
pub enum LumenError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Pipeline processing errors, organized by stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Image decoding failed; the only error an upload caller ever sees
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// Thumbnail generation failed (recoverable; the record keeps its old
    /// thumbnail, or none)
    #[error("Thumbnail generation failed for {path}: {message}")]
    Thumbnail { path: PathBuf, message: String },

    /// A backing store (tags, blobs, records) rejected an operation
    #[error("Store error: {message}")]
    Store { message: String },

    /// Caption service call failed
    #[error("Caption error: {message}")]
    Caption {
        message: String,
        status_code: Option<u16>,
    },

    /// Operation timed out
    #[error("Timeout in {stage} stage for {path} after {timeout_ms}ms")]
    Timeout {
        path: PathBuf,
        stage: String,
        timeout_ms: u64,
    },

    /// Unknown or unsupported image format
    #[error("Unsupported format for {path}: {format}")]
    UnsupportedFormat { path: PathBuf, format: String },

    /// File exceeds size limit
    #[error("File too large: {path} ({size_mb}MB > {max_mb}MB)")]
    FileTooLarge {
        path: PathBuf,
        size_mb: u64,
        max_mb: u64,
    },

    /// Image dimensions exceed limit
    #[error("Image too large: {path} ({width}x{height} > {max_dim})")]
    ImageTooLarge {
        path: PathBuf,
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
}

/// Errors surfaced by the store traits (tag, blob, image record stores).
#[derive(Error, Debug)]
pub enum StoreError {
    /// The requested entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Underlying I/O failure
    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization failure while persisting store state
    #[error("Store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<StoreError> for PipelineError {
    fn from(e: StoreError) -> Self {
        PipelineError::Store {
            message: e.to_string(),
        }
    }
}

/// Convenience type alias for Lumen results.
pub type Result<T> = std::result::Result<T, LumenError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
