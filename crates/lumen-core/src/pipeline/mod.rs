//! The image ingestion pipeline.
//!
//! Stages run in a fixed order per upload: validate, decode, metadata
//! extraction, tagging, thumbnail generation. [`ingest::Ingestor`] wires
//! them together over the store traits.

pub mod decode;
pub mod discovery;
pub mod geo;
pub mod ingest;
pub mod metadata;
pub mod thumbnail;
pub mod validate;

pub use decode::{DecodedImage, ImageDecoder};
pub use discovery::{DiscoveredFile, FileDiscovery};
pub use geo::GeoTagger;
pub use ingest::{Ingestor, NewUpload};
pub use metadata::MetadataExtractor;
pub use thumbnail::ThumbnailGenerator;
pub use validate::Validator;
