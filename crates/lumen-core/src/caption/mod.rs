//! AI captioning for images.
//!
//! A caption provider looks at an image and returns a short description
//! plus exactly four tags. Providers are behind a trait so the pipeline
//! and tests can run against a mock.

pub mod gemini;
pub mod provider;
pub mod retry;

pub use provider::{
    fallback_caption, normalize_tags, resolve_env_var, CaptionProvider, CaptionProviderFactory,
    ImageInput,
};
