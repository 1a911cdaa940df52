//! Upload validation before decoding.

use std::path::Path;

use crate::config::LimitsConfig;
use crate::error::PipelineError;

/// Validates uploaded bytes before the expensive decode stage.
pub struct Validator {
    limits: LimitsConfig,
}

impl Validator {
    /// Create a new validator with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Perform quick validation on raw upload bytes.
    ///
    /// Checks:
    /// - Size is within limits
    /// - The header carries known image magic bytes
    ///
    /// `path` provides error context only; nothing is read from disk.
    pub fn validate(&self, bytes: &[u8], path: &Path) -> Result<(), PipelineError> {
        let max_bytes = self.limits.max_file_size_mb * 1024 * 1024;
        if bytes.len() as u64 > max_bytes {
            return Err(PipelineError::FileTooLarge {
                path: path.to_path_buf(),
                size_mb: bytes.len() as u64 / (1024 * 1024),
                max_mb: self.limits.max_file_size_mb,
            });
        }

        if bytes.len() < 4 {
            return Err(PipelineError::Decode {
                path: path.to_path_buf(),
                message: "File too small to be a valid image".to_string(),
            });
        }

        if !Self::is_valid_image_header(bytes) {
            return Err(PipelineError::UnsupportedFormat {
                path: path.to_path_buf(),
                format: "unrecognized magic bytes".to_string(),
            });
        }

        Ok(())
    }

    /// Check if the leading bytes match a supported image format.
    fn is_valid_image_header(header: &[u8]) -> bool {
        if header.len() < 4 {
            return false;
        }

        // JPEG: FF D8 FF
        if header[0] == 0xFF && header[1] == 0xD8 && header[2] == 0xFF {
            return true;
        }

        // PNG: 89 50 4E 47
        if header[0] == 0x89 && header[1] == b'P' && header[2] == b'N' && header[3] == b'G' {
            return true;
        }

        // GIF: GIF8
        if header[0] == b'G' && header[1] == b'I' && header[2] == b'F' && header[3] == b'8' {
            return true;
        }

        // WebP: RIFF....WEBP
        if header[0] == b'R' && header[1] == b'I' && header[2] == b'F' && header[3] == b'F' {
            if header.len() >= 12 {
                return header[8] == b'W'
                    && header[9] == b'E'
                    && header[10] == b'B'
                    && header[11] == b'P';
            }
            return false;
        }

        // BMP: BM
        if header[0] == b'B' && header[1] == b'M' {
            return true;
        }

        // TIFF: II (little-endian) or MM (big-endian) followed by version 42
        let is_tiff_le =
            header[0] == b'I' && header[1] == b'I' && header[2] == 0x2A && header[3] == 0x00;
        let is_tiff_be =
            header[0] == b'M' && header[1] == b'M' && header[2] == 0x00 && header[3] == 0x2A;
        is_tiff_le || is_tiff_be
    }
}
