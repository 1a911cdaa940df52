//! Coarse geographic labeling from GPS coordinates.
//!
//! No geocoding service is involved; coordinates are matched against a
//! small fixed list of bounding boxes. Anything that falls outside every
//! box gets a formatted coordinate label instead.

/// An axis-aligned region with an inclusive bounding box.
struct Region {
    label: &'static str,
    lat_min: f64,
    lat_max: f64,
    lon_min: f64,
    lon_max: f64,
}

/// Checked in order; the first match wins, so overlapping boxes resolve
/// deterministically.
const REGIONS: &[Region] = &[
    Region {
        label: "中国",
        lat_min: 18.0,
        lat_max: 54.0,
        lon_min: 73.0,
        lon_max: 135.0,
    },
    Region {
        label: "日本",
        lat_min: 24.0,
        lat_max: 46.0,
        lon_min: 122.0,
        lon_max: 146.0,
    },
    Region {
        label: "韩国",
        lat_min: 33.0,
        lat_max: 43.0,
        lon_min: 124.0,
        lon_max: 132.0,
    },
    Region {
        label: "美国",
        lat_min: 25.0,
        lat_max: 49.0,
        lon_min: -125.0,
        lon_max: -66.0,
    },
    Region {
        label: "欧洲",
        lat_min: 41.0,
        lat_max: 51.0,
        lon_min: -5.0,
        lon_max: 10.0,
    },
];

/// Maps coordinates to region labels.
pub struct GeoTagger;

impl GeoTagger {
    /// Label for a coordinate pair: a region name if any bounding box
    /// contains it, otherwise the coordinates formatted to two decimals.
    pub fn label(latitude: f64, longitude: f64) -> String {
        for region in REGIONS {
            if latitude >= region.lat_min
                && latitude <= region.lat_max
                && longitude >= region.lon_min
                && longitude <= region.lon_max
            {
                return region.label.to_string();
            }
        }
        format!("位置: {:.2}°, {:.2}°", latitude, longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_beijing_is_china() {
        assert_eq!(GeoTagger::label(39.9042, 116.4074), "中国");
    }

    #[test]
    fn test_label_tokyo_is_japan() {
        assert_eq!(GeoTagger::label(35.6762, 139.6503), "日本");
    }

    #[test]
    fn test_label_seoul_prefers_first_match() {
        // Seoul sits inside both the China and Korea boxes; the China box
        // is checked first.
        assert_eq!(GeoTagger::label(37.5665, 126.978), "中国");
    }

    #[test]
    fn test_label_new_york_is_usa() {
        assert_eq!(GeoTagger::label(40.7128, -74.006), "美国");
    }

    #[test]
    fn test_label_paris_is_europe() {
        assert_eq!(GeoTagger::label(48.8566, 2.3522), "欧洲");
    }

    #[test]
    fn test_label_boundary_is_inclusive() {
        assert_eq!(GeoTagger::label(18.0, 73.0), "中国");
        assert_eq!(GeoTagger::label(54.0, 135.0), "中国");
    }

    #[test]
    fn test_label_open_ocean_falls_back_to_coordinates() {
        assert_eq!(GeoTagger::label(0.0, 0.0), "位置: 0.00°, 0.00°");
        assert_eq!(GeoTagger::label(-33.8688, 151.2093), "位置: -33.87°, 151.21°");
    }
}
