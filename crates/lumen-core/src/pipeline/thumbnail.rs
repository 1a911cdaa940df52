//! Fixed-aspect thumbnail generation with JPEG output.
//!
//! The input frame is flattened to RGB (alpha composited over white),
//! center-cropped to the configured aspect ratio, then resized to the exact
//! target dimensions. Output is always JPEG regardless of the source format.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, RgbImage};
use std::io::Cursor;
use std::path::Path;

use crate::config::ThumbnailConfig;
use crate::error::PipelineError;
use crate::types::Thumbnail;

/// Generates thumbnails from decoded images.
pub struct ThumbnailGenerator {
    config: ThumbnailConfig,
}

impl ThumbnailGenerator {
    /// Create a new thumbnail generator with the given configuration.
    pub fn new(config: ThumbnailConfig) -> Self {
        Self { config }
    }

    /// Generate a thumbnail for a decoded image.
    ///
    /// `path` is only used for error context. The generator holds no state
    /// between calls, so regenerating is just calling this again.
    pub fn generate(&self, image: &DynamicImage, path: &Path) -> Result<Thumbnail, PipelineError> {
        let (src_w, src_h) = image.dimensions();
        if src_w == 0 || src_h == 0 {
            return Err(PipelineError::Thumbnail {
                path: path.to_path_buf(),
                message: "source image has a zero dimension".to_string(),
            });
        }

        let rgb = flatten_to_rgb(image);

        let (x, y, w, h) = crop_box(
            src_w,
            src_h,
            self.config.aspect_width,
            self.config.aspect_height,
        );
        let cropped = image::imageops::crop_imm(&rgb, x, y, w, h).to_image();

        let resized = image::imageops::resize(
            &cropped,
            self.config.width,
            self.config.height,
            FilterType::Lanczos3,
        );

        let mut buffer = Cursor::new(Vec::new());
        JpegEncoder::new_with_quality(&mut buffer, self.config.quality)
            .encode_image(&resized)
            .map_err(|e| PipelineError::Thumbnail {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        Ok(Thumbnail {
            bytes: buffer.into_inner(),
            width: self.config.width,
            height: self.config.height,
        })
    }
}

/// Flatten any pixel format to RGB, compositing alpha over white.
fn flatten_to_rgb(image: &DynamicImage) -> RgbImage {
    match image {
        DynamicImage::ImageRgb8(rgb) => rgb.clone(),
        DynamicImage::ImageRgba8(rgba) => {
            let mut out = RgbImage::new(rgba.width(), rgba.height());
            for (x, y, pixel) in rgba.enumerate_pixels() {
                let [r, g, b, a] = pixel.0;
                let (r, g, b, a) = (r as u16, g as u16, b as u16, a as u16);
                out.put_pixel(
                    x,
                    y,
                    image::Rgb([
                        ((r * a + 255 * (255 - a)) / 255) as u8,
                        ((g * a + 255 * (255 - a)) / 255) as u8,
                        ((b * a + 255 * (255 - a)) / 255) as u8,
                    ]),
                );
            }
            out
        }
        other => flatten_to_rgb(&DynamicImage::ImageRgba8(other.to_rgba8())),
    }
}

/// Largest centered crop box with the given aspect ratio, in integer math.
///
/// Returns `(x, y, width, height)`. Offsets round down, so an odd leftover
/// pixel lands on the right/bottom edge.
pub(crate) fn crop_box(src_w: u32, src_h: u32, aspect_w: u32, aspect_h: u32) -> (u32, u32, u32, u32) {
    // Compare src_w/src_h against aspect_w/aspect_h without floats.
    let lhs = u64::from(src_w) * u64::from(aspect_h);
    let rhs = u64::from(src_h) * u64::from(aspect_w);

    if lhs > rhs {
        // Wider than target: full height, trim the sides.
        let crop_w = (rhs / u64::from(aspect_h)) as u32;
        let x = (src_w - crop_w) / 2;
        (x, 0, crop_w, src_h)
    } else {
        // Taller than target (or exact): full width, trim top and bottom.
        let crop_h = (lhs / u64::from(aspect_w)) as u32;
        let y = (src_h - crop_h) / 2;
        (0, y, src_w, crop_h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator() -> ThumbnailGenerator {
        ThumbnailGenerator::new(ThumbnailConfig::default())
    }

    #[test]
    fn test_crop_box_wide_image() {
        // 4000x2000 cropped to 4:3 keeps full height
        assert_eq!(crop_box(4000, 2000, 4, 3), (667, 0, 2666, 2000));
    }

    #[test]
    fn test_crop_box_tall_image() {
        // 2000x4000 cropped to 4:3 keeps full width
        assert_eq!(crop_box(2000, 4000, 4, 3), (0, 1250, 2000, 1500));
    }

    #[test]
    fn test_crop_box_exact_aspect_is_identity() {
        assert_eq!(crop_box(400, 300, 4, 3), (0, 0, 400, 300));
        assert_eq!(crop_box(4000, 3000, 4, 3), (0, 0, 4000, 3000));
    }

    #[test]
    fn test_generate_produces_jpeg_at_target_size() {
        let img = DynamicImage::new_rgb8(1000, 500);
        let thumb = generator().generate(&img, Path::new("t.png")).unwrap();
        assert_eq!((thumb.width, thumb.height), (400, 300));
        // JPEG SOI marker
        assert_eq!(&thumb.bytes[0..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_generate_upscales_small_images() {
        let img = DynamicImage::new_rgb8(40, 30);
        let thumb = generator().generate(&img, Path::new("t.png")).unwrap();
        assert_eq!((thumb.width, thumb.height), (400, 300));
    }

    #[test]
    fn test_generate_is_deterministic() {
        let img = DynamicImage::new_rgb8(800, 600);
        let a = generator().generate(&img, Path::new("t.png")).unwrap();
        let b = generator().generate(&img, Path::new("t.png")).unwrap();
        assert_eq!(a.bytes, b.bytes);
    }

    #[test]
    fn test_generate_flattens_alpha() {
        // Fully transparent RGBA should encode without error (white fill)
        let img = DynamicImage::ImageRgba8(image::RgbaImage::new(800, 600));
        let thumb = generator().generate(&img, Path::new("t.png")).unwrap();
        assert!(!thumb.bytes.is_empty());
    }

    #[test]
    fn test_flatten_composites_over_white() {
        let mut rgba = image::RgbaImage::new(1, 1);
        rgba.put_pixel(0, 0, image::Rgba([0, 0, 0, 0]));
        let out = flatten_to_rgb(&DynamicImage::ImageRgba8(rgba));
        assert_eq!(out.get_pixel(0, 0).0, [255, 255, 255]);

        let mut rgba = image::RgbaImage::new(1, 1);
        rgba.put_pixel(0, 0, image::Rgba([10, 20, 30, 255]));
        let out = flatten_to_rgb(&DynamicImage::ImageRgba8(rgba));
        assert_eq!(out.get_pixel(0, 0).0, [10, 20, 30]);
    }
}
