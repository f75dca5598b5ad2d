//! Shared test utilities for the place-photos test suite.
//!
//! Provides in-memory image builders (plain JPEG/PNG, JPEG carrying EXIF GPS
//! or orientation) and a scripted [`AddressResolver`].
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let with_gps = RawFile::new("seoul.jpg", jpeg_with_gps(8, 8, 37.5665, 126.978));
//! let resolver = StaticResolver::always("Seoul, KR");
//! ```

use crate::location::{AddressResolver, GeoPoint, ResolveError};
use async_trait::async_trait;
use exif::experimental::Writer;
use exif::{Field, In, Rational, Tag, Value};
use image::{ImageEncoder, RgbImage, RgbaImage};
use std::sync::atomic::{AtomicUsize, Ordering};

// =========================================================================
// Image builders
// =========================================================================

/// Encode a small gradient JPEG in memory.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    encode_jpeg(&img)
}

/// Encode a JPEG full of high-frequency noise, which compresses poorly.
pub fn noisy_jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        let v = x.wrapping_mul(2_654_435_761).wrapping_add(y.wrapping_mul(40_503)) >> 7;
        image::Rgb([v as u8, (v >> 8) as u8, (v >> 16) as u8])
    });
    encode_jpeg(&img)
}

/// Encode a PNG with a translucent alpha channel.
pub fn png_rgba_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x % 256) as u8, (y % 256) as u8, 64, 128])
    });
    let mut buf = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgba8)
        .unwrap();
    buf
}

/// A JPEG whose EXIF carries the given GPS position.
pub fn jpeg_with_gps(width: u32, height: u32, latitude: f64, longitude: f64) -> Vec<u8> {
    let lat_ref = if latitude < 0.0 { b"S" } else { b"N" };
    let lon_ref = if longitude < 0.0 { b"W" } else { b"E" };
    let fields = [
        field(Tag::GPSLatitudeRef, Value::Ascii(vec![lat_ref.to_vec()])),
        field(Tag::GPSLatitude, Value::Rational(dms(latitude))),
        field(Tag::GPSLongitudeRef, Value::Ascii(vec![lon_ref.to_vec()])),
        field(Tag::GPSLongitude, Value::Rational(dms(longitude))),
    ];
    embed_exif(&jpeg_bytes(width, height), &fields)
}

/// A JPEG whose EXIF carries the given orientation (1-8).
pub fn jpeg_with_orientation(width: u32, height: u32, orientation: u16) -> Vec<u8> {
    let fields = [field(Tag::Orientation, Value::Short(vec![orientation]))];
    embed_exif(&jpeg_bytes(width, height), &fields)
}

fn encode_jpeg(img: &RgbImage) -> Vec<u8> {
    let mut buf = Vec::new();
    image::codecs::jpeg::JpegEncoder::new(&mut buf)
        .write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgb8,
        )
        .unwrap();
    buf
}

fn field(tag: Tag, value: Value) -> Field {
    Field {
        tag,
        ifd_num: In::PRIMARY,
        value,
    }
}

/// Decimal degrees → degrees/minutes/centi-seconds rationals.
fn dms(decimal: f64) -> Vec<Rational> {
    let abs = decimal.abs();
    let degrees = abs.trunc();
    let minutes = ((abs - degrees) * 60.0).trunc();
    let seconds = (abs - degrees - minutes / 60.0) * 3600.0;
    vec![
        Rational {
            num: degrees as u32,
            denom: 1,
        },
        Rational {
            num: minutes as u32,
            denom: 1,
        },
        Rational {
            num: (seconds * 100.0).round() as u32,
            denom: 100,
        },
    ]
}

/// Insert an APP1 `Exif` segment right after the JPEG SOI marker.
fn embed_exif(jpeg: &[u8], fields: &[Field]) -> Vec<u8> {
    let mut writer = Writer::new();
    for f in fields {
        writer.push_field(f);
    }
    let mut tiff = std::io::Cursor::new(Vec::new());
    writer.write(&mut tiff, false).unwrap();
    let tiff = tiff.into_inner();

    let segment_len = (2 + 6 + tiff.len()) as u16;
    let mut out = Vec::with_capacity(jpeg.len() + tiff.len() + 10);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&segment_len.to_be_bytes());
    out.extend_from_slice(b"Exif\0\0");
    out.extend_from_slice(&tiff);
    out.extend_from_slice(&jpeg[2..]);
    out
}

// =========================================================================
// Resolvers
// =========================================================================

/// Scripted resolver that counts calls.
///
/// Unknown latitudes fail with [`ResolveError::Lookup`].
pub struct StaticResolver {
    answers: Vec<(Option<f64>, String)>,
    calls: AtomicUsize,
}

impl StaticResolver {
    /// Resolve every point to `address`.
    pub fn always(address: &str) -> Self {
        Self {
            answers: vec![(None, address.to_string())],
            calls: AtomicUsize::new(0),
        }
    }

    /// Resolve points by (approximate) latitude.
    pub fn by_latitude(table: &[(f64, &str)]) -> Self {
        Self {
            answers: table
                .iter()
                .map(|(lat, addr)| (Some(*lat), addr.to_string()))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AddressResolver for StaticResolver {
    async fn resolve(&self, point: GeoPoint) -> Result<Option<String>, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answers
            .iter()
            .find(|(lat, _)| lat.is_none_or(|l| (l - point.latitude).abs() < 1e-3))
            .map(|(_, addr)| Some(addr.clone()))
            .ok_or_else(|| ResolveError::Lookup(format!("no address near {point}")))
    }
}
