//! Caption provider trait, tag normalization, and the provider factory.

use crate::config::CaptionConfig;
use crate::error::PipelineError;
use crate::types::{Caption, ImageSummary};
use async_trait::async_trait;
use base64::Engine;
use std::time::Duration;

/// Tags used to pad a short tag list up to four entries.
pub const FALLBACK_TAGS: [&str; 4] = ["图片", "照片", "记录", "回忆"];

/// Description used when the provider yields nothing usable.
pub const FALLBACK_DESCRIPTION: &str = "这是一张图片";

/// Maximum number of results a ranking call may return.
pub const MAX_RANK_RESULTS: usize = 3;

/// Base64-encoded image ready to send to a caption API.
#[derive(Debug, Clone)]
pub struct ImageInput {
    /// Base64-encoded image bytes
    pub data: String,
    /// MIME type (e.g., "image/jpeg", "image/png")
    pub media_type: String,
}

impl ImageInput {
    /// Create an `ImageInput` from raw bytes and format string.
    ///
    /// The format is the image format identifier (e.g., "jpeg", "png", "webp").
    pub fn from_bytes(bytes: &[u8], format: &str) -> Self {
        let media_type = match format {
            "jpeg" | "jpg" => "image/jpeg",
            "png" => "image/png",
            "webp" => "image/webp",
            "gif" => "image/gif",
            other => {
                tracing::warn!("Unknown image format '{other}', defaulting to image/jpeg");
                "image/jpeg"
            }
        };

        Self {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            media_type: media_type.to_string(),
        }
    }
}

/// Trait that all caption providers implement.
///
/// Uses `async_trait` because native async fn in trait is not object-safe
/// (we need `Box<dyn CaptionProvider>` for dynamic dispatch).
#[async_trait]
pub trait CaptionProvider: Send + Sync {
    /// Provider name for logging (e.g., "gemini").
    fn name(&self) -> &str;

    /// Check whether the provider is configured and reachable.
    async fn is_available(&self) -> bool;

    /// Describe an image: a short description plus exactly four tags.
    async fn analyze(&self, image: &ImageInput) -> Result<Caption, PipelineError>;

    /// Rank images against a free-text query, best first.
    ///
    /// Returns at most [`MAX_RANK_RESULTS`] ids drawn from `images`.
    async fn rank(
        &self,
        query: &str,
        images: &[ImageSummary],
    ) -> Result<Vec<u64>, PipelineError>;

    /// Per-request timeout for this provider.
    fn timeout(&self) -> Duration;
}

/// Force a tag list to exactly four entries.
///
/// Duplicates and empty entries are dropped, the list is truncated to
/// four, and short lists are padded from [`FALLBACK_TAGS`] (skipping any
/// fallback already present).
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(4);
    for tag in tags {
        let tag = tag.trim().to_string();
        if tag.is_empty() || out.contains(&tag) {
            continue;
        }
        out.push(tag);
        if out.len() == 4 {
            return out;
        }
    }
    for fallback in FALLBACK_TAGS {
        if out.len() == 4 {
            break;
        }
        if !out.iter().any(|t| t == fallback) {
            out.push(fallback.to_string());
        }
    }
    out
}

/// The caption used when analysis fails entirely.
pub fn fallback_caption() -> Caption {
    Caption {
        description: FALLBACK_DESCRIPTION.to_string(),
        tags: FALLBACK_TAGS.iter().map(|t| t.to_string()).collect(),
    }
}

/// Resolve `${ENV_VAR}` references in config strings.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok()
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Factory that creates the configured provider.
pub struct CaptionProviderFactory;

impl CaptionProviderFactory {
    /// Create a caption provider from the config section.
    ///
    /// Currently Gemini is the only implementation.
    pub fn create(
        config: &CaptionConfig,
        timeout_ms: u64,
    ) -> Result<Box<dyn CaptionProvider>, PipelineError> {
        let cfg = config.gemini.clone().ok_or_else(|| PipelineError::Caption {
            message: "No caption provider configured. Add a [caption.gemini] section.".to_string(),
            status_code: None,
        })?;
        let api_key = resolve_env_var(&cfg.api_key).ok_or_else(|| PipelineError::Caption {
            message: "Gemini API key not set. Set GEMINI_API_KEY env var.".to_string(),
            status_code: None,
        })?;
        Ok(Box::new(super::gemini::GeminiProvider::new(
            &cfg.endpoint,
            &api_key,
            &cfg.model,
            Duration::from_millis(timeout_ms),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_input_from_bytes_jpeg() {
        let input = ImageInput::from_bytes(&[0xFF, 0xD8, 0xFF], "jpeg");
        assert_eq!(input.media_type, "image/jpeg");
        assert!(!input.data.is_empty());
    }

    #[test]
    fn test_image_input_unknown_format_defaults_to_jpeg() {
        let input = ImageInput::from_bytes(&[1, 2, 3], "xcf");
        assert_eq!(input.media_type, "image/jpeg");
    }

    #[test]
    fn test_normalize_tags_pads_to_four() {
        let tags = normalize_tags(vec!["海边".to_string()]);
        assert_eq!(tags, vec!["海边", "图片", "照片", "记录"]);
    }

    #[test]
    fn test_normalize_tags_truncates_to_four() {
        let tags = normalize_tags(
            ["a", "b", "c", "d", "e", "f"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        assert_eq!(tags, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_normalize_tags_skips_duplicate_fallbacks() {
        let tags = normalize_tags(vec!["图片".to_string(), "图片".to_string()]);
        assert_eq!(tags, vec!["图片", "照片", "记录", "回忆"]);
    }

    #[test]
    fn test_normalize_tags_drops_empty_entries() {
        let tags = normalize_tags(vec!["  ".to_string(), "猫".to_string()]);
        assert_eq!(tags[0], "猫");
        assert_eq!(tags.len(), 4);
    }

    #[test]
    fn test_fallback_caption_shape() {
        let caption = fallback_caption();
        assert_eq!(caption.description, FALLBACK_DESCRIPTION);
        assert_eq!(caption.tags.len(), 4);
    }

    #[test]
    fn test_resolve_env_var() {
        // Non-env-var strings pass through
        assert_eq!(resolve_env_var("plain-key"), Some("plain-key".to_string()));
        // Empty returns None
        assert_eq!(resolve_env_var(""), None);
        // Unset env var returns None
        assert_eq!(resolve_env_var("${DEFINITELY_NOT_SET_XYZ_123}"), None);
    }

    #[test]
    fn test_factory_requires_config_section() {
        let result = CaptionProviderFactory::create(&CaptionConfig::default(), 1000);
        assert!(matches!(result, Err(PipelineError::Caption { .. })));
    }

    /// Canned provider for exercising the trait without a network.
    struct MockProvider {
        calls: std::sync::atomic::AtomicU32,
        fail: bool,
    }

    impl MockProvider {
        fn new(fail: bool) -> Self {
            Self {
                calls: std::sync::atomic::AtomicU32::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl CaptionProvider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn analyze(&self, _image: &ImageInput) -> Result<Caption, PipelineError> {
            self.calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if self.fail {
                return Err(PipelineError::Caption {
                    message: "mock failure".to_string(),
                    status_code: Some(500),
                });
            }
            Ok(Caption {
                description: "海边的日落".to_string(),
                tags: normalize_tags(vec!["海边".to_string(), "日落".to_string()]),
            })
        }

        async fn rank(
            &self,
            _query: &str,
            images: &[ImageSummary],
        ) -> Result<Vec<u64>, PipelineError> {
            Ok(images.iter().map(|i| i.id).take(MAX_RANK_RESULTS).collect())
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(1)
        }
    }

    #[tokio::test]
    async fn test_mock_provider_as_trait_object() {
        let provider: Box<dyn CaptionProvider> = Box::new(MockProvider::new(false));
        let image = ImageInput::from_bytes(&[1, 2, 3], "jpeg");

        let caption = provider.analyze(&image).await.unwrap();
        assert_eq!(caption.description, "海边的日落");
        assert_eq!(caption.tags.len(), 4);
        assert_eq!(caption.tags[0], "海边");
    }

    #[tokio::test]
    async fn test_mock_provider_rank_caps_results() {
        let provider = MockProvider::new(false);
        let summaries: Vec<ImageSummary> = (1..=5)
            .map(|id| ImageSummary {
                id,
                title: format!("img {id}"),
                description: String::new(),
            })
            .collect();
        let ids = provider.rank("日落", &summaries).await.unwrap();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_failed_analysis_falls_back() {
        let provider = MockProvider::new(true);
        let image = ImageInput::from_bytes(&[1, 2, 3], "jpeg");
        let caption = match provider.analyze(&image).await {
            Ok(caption) => caption,
            Err(_) => fallback_caption(),
        };
        assert_eq!(caption.description, FALLBACK_DESCRIPTION);
        assert_eq!(caption.tags, FALLBACK_TAGS.map(String::from).to_vec());
        assert_eq!(
            provider.calls.load(std::sync::atomic::Ordering::SeqCst),
            1
        );
    }
}
