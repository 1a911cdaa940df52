//! EXIF metadata extraction and derived tags.
//!
//! Extraction never fails: malformed or absent EXIF directories simply
//! yield fewer fields, and the derived tag list degrades to placeholders
//! (today's date, the unknown-location marker).

use chrono::{Local, NaiveDate, NaiveDateTime};
use exif::{In, Tag, Value};
use std::io::Cursor;

use crate::pipeline::geo::GeoTagger;
use crate::types::{GpsPosition, ImageMetadata};

/// Tag applied when no usable GPS coordinate is present.
pub const UNKNOWN_LOCATION_TAG: &str = "未知位置";

/// Extracts EXIF metadata and derives the standard tag set.
pub struct MetadataExtractor;

impl MetadataExtractor {
    /// Extract metadata from raw image bytes.
    ///
    /// `width` and `height` are the decoded dimensions; the extractor does
    /// not decode the image itself. The derived tags come out in a fixed
    /// order: date, location, lens make, lens model, resolution.
    pub fn extract(bytes: &[u8], width: u32, height: u32) -> ImageMetadata {
        Self::extract_with_today(bytes, width, height, Local::now().date_naive())
    }

    /// Like [`extract`](Self::extract) with the date-tag fallback pinned,
    /// so tests are deterministic.
    pub fn extract_with_today(
        bytes: &[u8],
        width: u32,
        height: u32,
        today: NaiveDate,
    ) -> ImageMetadata {
        let exif = {
            let mut cursor = Cursor::new(bytes);
            exif::Reader::new().read_from_container(&mut cursor).ok()
        };

        let captured_at = exif.as_ref().and_then(Self::get_datetime);
        let location = exif.as_ref().and_then(Self::get_position);

        let mut tags = Vec::with_capacity(5);

        // Exactly one date tag: the capture date when known, today otherwise.
        let date = captured_at.map(|dt| dt.date()).unwrap_or(today);
        tags.push(date.format("%Y.%m.%d").to_string());

        match location {
            Some(pos) => tags.push(GeoTagger::label(pos.latitude, pos.longitude)),
            None => tags.push(UNKNOWN_LOCATION_TAG.to_string()),
        }

        if let Some(exif) = exif.as_ref() {
            if let Some(make) = Self::get_string(exif, Tag::LensMake) {
                tags.push(make);
            }
            if let Some(model) = Self::get_string(exif, Tag::LensModel) {
                tags.push(model);
            }
        }

        tags.push(format!("{}x{}", width, height));

        ImageMetadata {
            width,
            height,
            captured_at,
            location,
            derived_tags: tags,
        }
    }

    /// Get a cleaned string field. Returns `None` when the field is absent
    /// or empty after trimming quotes, NULs, and whitespace.
    fn get_string(exif: &exif::Exif, tag: Tag) -> Option<String> {
        let field = exif.get_field(tag, In::PRIMARY)?;
        let s = field.display_value().to_string();
        let cleaned = s.trim_matches(|c: char| c == '"' || c == '\0' || c.is_whitespace());
        if cleaned.is_empty() {
            None
        } else {
            Some(cleaned.to_string())
        }
    }

    /// Parse the primary DateTime field ("YYYY:MM:DD HH:MM:SS").
    fn get_datetime(exif: &exif::Exif) -> Option<NaiveDateTime> {
        let field = exif.get_field(Tag::DateTime, In::PRIMARY)?;
        let s = field.display_value().to_string();
        let s = s.trim_matches('"');
        NaiveDateTime::parse_from_str(s, "%Y:%m:%d %H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
            .ok()
    }

    /// Both axes must be present with their hemisphere refs; otherwise the
    /// image has no usable position.
    fn get_position(exif: &exif::Exif) -> Option<GpsPosition> {
        let latitude = Self::get_gps_coord(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef)?;
        let longitude = Self::get_gps_coord(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef)?;
        Some(GpsPosition::new(latitude, longitude))
    }

    /// Get GPS coordinate, converting from degrees/minutes/seconds to decimal.
    fn get_gps_coord(exif: &exif::Exif, coord_tag: Tag, ref_tag: Tag) -> Option<f64> {
        let coord = exif.get_field(coord_tag, In::PRIMARY)?;
        let reference = exif.get_field(ref_tag, In::PRIMARY)?;

        let degrees = Self::parse_gps_rationals(&coord.value)?;
        let ref_str = reference.display_value().to_string();

        // Apply sign based on reference (N/S for lat, E/W for lon)
        let sign = if ref_str.contains('S') || ref_str.contains('W') {
            -1.0
        } else {
            1.0
        };

        Some(sign * degrees)
    }

    /// Parse GPS rationals (degrees, minutes, seconds) to decimal degrees.
    ///
    /// A rational with a zero denominator contributes 0.0 rather than
    /// poisoning the result with infinity.
    fn parse_gps_rationals(value: &Value) -> Option<f64> {
        match value {
            Value::Rational(rationals) if rationals.len() >= 3 => {
                let degrees = rational_to_f64(&rationals[0]);
                let minutes = rational_to_f64(&rationals[1]);
                let seconds = rational_to_f64(&rationals[2]);
                Some(degrees + minutes / 60.0 + seconds / 3600.0)
            }
            _ => None,
        }
    }
}

fn rational_to_f64(r: &exif::Rational) -> f64 {
    if r.denom == 0 {
        0.0
    } else {
        r.to_f64()
    }
}
