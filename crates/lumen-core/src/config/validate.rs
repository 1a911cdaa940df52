//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.processing.parallel_workers == 0 {
            return Err(ConfigError::ValidationError(
                "processing.parallel_workers must be > 0".into(),
            ));
        }
        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_file_size_mb must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.limits.decode_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.decode_timeout_ms must be > 0".into(),
            ));
        }
        if self.limits.caption_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.caption_timeout_ms must be > 0".into(),
            ));
        }
        if self.thumbnail.width == 0 || self.thumbnail.height == 0 {
            return Err(ConfigError::ValidationError(
                "thumbnail.width and thumbnail.height must be > 0".into(),
            ));
        }
        if self.thumbnail.aspect_width == 0 || self.thumbnail.aspect_height == 0 {
            return Err(ConfigError::ValidationError(
                "thumbnail.aspect_width and thumbnail.aspect_height must be > 0".into(),
            ));
        }
        if self.thumbnail.quality == 0 || self.thumbnail.quality > 100 {
            return Err(ConfigError::ValidationError(
                "thumbnail.quality must be between 1 and 100".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_parallel_workers() {
        let mut config = Config::default();
        config.processing.parallel_workers = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("parallel_workers"));
    }

    #[test]
    fn test_validate_rejects_zero_thumbnail_dimension() {
        let mut config = Config::default();
        config.thumbnail.height = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("thumbnail.width"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.limits.decode_timeout_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("decode_timeout_ms"));
    }

    #[test]
    fn test_validate_rejects_out_of_range_quality() {
        let mut config = Config::default();
        config.thumbnail.quality = 0;
        assert!(config.validate().is_err());

        config.thumbnail.quality = 101;
        assert!(config.validate().is_err());

        config.thumbnail.quality = 100;
        assert!(config.validate().is_ok());
    }
}
