//! EXIF GPS reading.
//!
//! Coordinates are stored as three rationals (degrees, minutes, seconds) plus
//! an `N`/`S` or `E`/`W` reference tag. Missing or malformed metadata is the
//! common case and simply yields `None`.

use exif::{In, Tag, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decimal-degree coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Build a point, rejecting non-finite or out-of-range values.
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && latitude.abs() <= 90.0
            && longitude.abs() <= 180.0;
        valid.then_some(Self {
            latitude,
            longitude,
        })
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5}, {:.5}", self.latitude, self.longitude)
    }
}

/// Parse EXIF from an in-memory image container (JPEG, TIFF, PNG, WebP, HEIF).
pub(crate) fn read_exif(bytes: &[u8]) -> Option<exif::Exif> {
    let mut cursor = std::io::Cursor::new(bytes);
    exif::Reader::new().read_from_container(&mut cursor).ok()
}

/// Read the GPS position embedded in an image, if any.
pub fn read_gps(bytes: &[u8]) -> Option<GeoPoint> {
    let exif = read_exif(bytes)?;
    gps_from_exif(&exif)
}

fn gps_from_exif(exif: &exif::Exif) -> Option<GeoPoint> {
    let lat = parse_dms(&exif.get_field(Tag::GPSLatitude, In::PRIMARY)?.value)?;
    let lon = parse_dms(&exif.get_field(Tag::GPSLongitude, In::PRIMARY)?.value)?;

    let lat_ref = exif
        .get_field(Tag::GPSLatitudeRef, In::PRIMARY)
        .and_then(|f| ref_letter(&f.value));
    let lon_ref = exif
        .get_field(Tag::GPSLongitudeRef, In::PRIMARY)
        .and_then(|f| ref_letter(&f.value));

    let lat = if lat_ref == Some(b'S') { -lat } else { lat };
    let lon = if lon_ref == Some(b'W') { -lon } else { lon };

    GeoPoint::new(lat, lon)
}

/// Degrees/minutes/seconds rationals → positive decimal degrees.
fn parse_dms(value: &Value) -> Option<f64> {
    match value {
        Value::Rational(rats) if rats.len() >= 3 => {
            if rats[..3].iter().any(|r| r.denom == 0) {
                return None;
            }
            Some(rats[0].to_f64() + rats[1].to_f64() / 60.0 + rats[2].to_f64() / 3600.0)
        }
        _ => None,
    }
}

fn ref_letter(value: &Value) -> Option<u8> {
    match value {
        Value::Ascii(parts) => parts
            .first()
            .and_then(|s| s.first())
            .map(|c| c.to_ascii_uppercase()),
        _ => None,
    }
}
