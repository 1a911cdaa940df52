//! Image decoding with format detection, orientation handling, and timeout.

use image::{DynamicImage, GenericImageView, ImageFormat};
use std::path::Path;
use std::time::Duration;
use tokio::time::timeout;

use crate::config::LimitsConfig;
use crate::error::PipelineError;

/// Image decoder with configurable limits and timeout.
pub struct ImageDecoder {
    limits: LimitsConfig,
}

/// Result of decoding an image.
#[derive(Debug)]
pub struct DecodedImage {
    /// The decoded frame, already rotated/flipped per its EXIF orientation
    pub image: DynamicImage,
    /// Detected image format
    pub format: ImageFormat,
    /// Stored frame width in pixels, before orientation was applied
    pub width: u32,
    /// Stored frame height in pixels, before orientation was applied
    pub height: u32,
}

impl ImageDecoder {
    /// Create a new decoder with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Decode an image from an in-memory byte buffer with validation and timeout.
    pub async fn decode_from_bytes(
        &self,
        bytes: Vec<u8>,
        path: &Path,
    ) -> Result<DecodedImage, PipelineError> {
        let file_size = bytes.len() as u64;
        let max_bytes = self.limits.max_file_size_mb * 1024 * 1024;
        if file_size > max_bytes {
            return Err(PipelineError::FileTooLarge {
                path: path.to_path_buf(),
                size_mb: file_size / (1024 * 1024),
                max_mb: self.limits.max_file_size_mb,
            });
        }

        let path_owned = path.to_path_buf();
        let timeout_duration = Duration::from_millis(self.limits.decode_timeout_ms);

        let decode_result = timeout(timeout_duration, async {
            tokio::task::spawn_blocking(move || Self::decode_bytes_sync(bytes, &path_owned)).await
        })
        .await;

        match decode_result {
            Ok(Ok(Ok(decoded))) => {
                if decoded.width > self.limits.max_image_dimension
                    || decoded.height > self.limits.max_image_dimension
                {
                    return Err(PipelineError::ImageTooLarge {
                        path: path.to_path_buf(),
                        width: decoded.width,
                        height: decoded.height,
                        max_dim: self.limits.max_image_dimension,
                    });
                }
                Ok(decoded)
            }
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(e)) => Err(PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Task join error: {}", e),
            }),
            Err(_) => Err(PipelineError::Timeout {
                path: path.to_path_buf(),
                stage: "decode".to_string(),
                timeout_ms: self.limits.decode_timeout_ms,
            }),
        }
    }

    /// Synchronous decode from bytes (runs in spawn_blocking).
    fn decode_bytes_sync(bytes: Vec<u8>, path: &Path) -> Result<DecodedImage, PipelineError> {
        use std::io::Cursor;

        let orientation = exif_orientation(&bytes);

        let cursor = Cursor::new(bytes);
        let reader = image::ImageReader::new(cursor)
            .with_guessed_format()
            .map_err(|e| PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Cannot detect image format: {}", e),
            })?;
        let format = match reader.format() {
            Some(f) => f,
            None => ImageFormat::from_path(path).map_err(|_| PipelineError::UnsupportedFormat {
                path: path.to_path_buf(),
                format: path
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("unknown")
                    .to_string(),
            })?,
        };
        let image = reader.decode().map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let (width, height) = image.dimensions();
        let image = normalize_orientation(image, orientation);
        Ok(DecodedImage {
            image,
            format,
            width,
            height,
        })
    }
}

/// Read the EXIF orientation value (1-8) from raw image bytes.
///
/// Returns 1 (no transform) when the bytes carry no EXIF directory or no
/// orientation field.
pub fn exif_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = std::io::Cursor::new(bytes);
    let Ok(exif) = exif::Reader::new().read_from_container(&mut cursor) else {
        return 1;
    };
    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .unwrap_or(1)
}

/// Apply an EXIF orientation (1-8) so the frame displays upright.
pub fn normalize_orientation(image: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate270().fliph(),
        6 => image.rotate90(),
        7 => image.rotate90().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}

/// Detect the format of raw image bytes, as a lowercase identifier.
///
/// Returns `None` when the magic bytes match no format the decoder knows.
pub fn sniff_format(bytes: &[u8]) -> Option<String> {
    image::guess_format(bytes).ok().map(format_to_string)
}

/// Convert an ImageFormat to a string representation.
pub fn format_to_string(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "jpeg".to_string(),
        ImageFormat::Png => "png".to_string(),
        ImageFormat::WebP => "webp".to_string(),
        ImageFormat::Gif => "gif".to_string(),
        ImageFormat::Tiff => "tiff".to_string(),
        ImageFormat::Bmp => "bmp".to_string(),
        _ => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::png_bytes;

    #[test]
    fn test_format_to_string() {
        assert_eq!(format_to_string(ImageFormat::Jpeg), "jpeg");
        assert_eq!(format_to_string(ImageFormat::Png), "png");
        assert_eq!(format_to_string(ImageFormat::WebP), "webp");
    }

    #[test]
    fn test_sniff_format() {
        assert_eq!(sniff_format(&png_bytes(2, 2)).as_deref(), Some("png"));
        assert_eq!(sniff_format(&[0u8; 16]), None);
    }

    #[test]
    fn test_orientation_defaults_to_identity() {
        // PNG without EXIF
        assert_eq!(exif_orientation(&png_bytes(4, 2)), 1);
    }

    #[test]
    fn test_normalize_orientation_swaps_dimensions() {
        let img = DynamicImage::new_rgb8(40, 20);
        let rotated = normalize_orientation(img, 6);
        assert_eq!(rotated.dimensions(), (20, 40));

        let img = DynamicImage::new_rgb8(40, 20);
        let flipped = normalize_orientation(img, 2);
        assert_eq!(flipped.dimensions(), (40, 20));
    }

    #[tokio::test]
    async fn test_decode_from_bytes_reports_stored_dimensions() {
        let decoder = ImageDecoder::new(crate::config::LimitsConfig::default());
        let decoded = decoder
            .decode_from_bytes(png_bytes(6, 4), std::path::Path::new("t.png"))
            .await
            .unwrap();
        assert_eq!((decoded.width, decoded.height), (6, 4));
        assert_eq!(decoded.format, ImageFormat::Png);
    }

    #[tokio::test]
    async fn test_decode_garbage_fails() {
        let decoder = ImageDecoder::new(crate::config::LimitsConfig::default());
        let err = decoder
            .decode_from_bytes(vec![0u8; 32], std::path::Path::new("bad.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_decode_rejects_oversized_dimensions() {
        let mut limits = crate::config::LimitsConfig::default();
        limits.max_image_dimension = 4;
        let decoder = ImageDecoder::new(limits);
        let err = decoder
            .decode_from_bytes(png_bytes(6, 4), std::path::Path::new("t.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ImageTooLarge { .. }));
    }
}
