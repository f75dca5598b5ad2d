//! Pure Rust compressor, everything statically linked.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate (pure Rust decoders) |
//! | Validate AVIF container | `avif-parse` |
//! | Orientation | `kamadak-exif` `Orientation` tag |
//! | Resize | `image::DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) |
//!
//! AVIF and HEIC inputs have no decoder compiled in. They pass through
//! untouched when already inside the byte budget and fail otherwise.

use super::backend::{CompressError, Compressor};
use super::calculations::{fit_within, quality_ladder};
use super::params::{CompressParams, OutputFormat};
use crate::location::gps::read_exif;
use crate::types::{Payload, RawFile};
use exif::{In, Tag};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// What the leading bytes of a file say it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sniffed {
    /// A format the `image` crate can decode.
    Decodable(ImageFormat),
    /// An ISO-BMFF still image we can only pass through.
    Container(ContainerKind),
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContainerKind {
    Avif,
    Heic,
}

impl ContainerKind {
    fn mime(self) -> &'static str {
        match self {
            ContainerKind::Avif => "image/avif",
            ContainerKind::Heic => "image/heic",
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerKind::Avif => f.write_str("AVIF"),
            ContainerKind::Heic => f.write_str("HEIC"),
        }
    }
}

const AVIF_BRANDS: &[&[u8; 4]] = &[b"avif", b"avis"];
const HEIC_BRANDS: &[&[u8; 4]] = &[
    b"heic", b"heix", b"hevc", b"hevx", b"heim", b"heis", b"mif1", b"msf1",
];

fn sniff(bytes: &[u8]) -> Sniffed {
    if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
        let brand = &bytes[8..12];
        if AVIF_BRANDS.iter().any(|b| &b[..] == brand) {
            return Sniffed::Container(ContainerKind::Avif);
        }
        if HEIC_BRANDS.iter().any(|b| &b[..] == brand) {
            return Sniffed::Container(ContainerKind::Heic);
        }
    }
    match image::guess_format(bytes) {
        Ok(
            format @ (ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Tiff | ImageFormat::WebP),
        ) => Sniffed::Decodable(format),
        _ => Sniffed::Unknown,
    }
}

/// EXIF orientation (1-8), defaulting to 1 when absent or invalid.
fn read_orientation(bytes: &[u8]) -> u32 {
    read_exif(bytes)
        .and_then(|exif| {
            exif.get_field(Tag::Orientation, In::PRIMARY)
                .and_then(|field| field.value.get_uint(0))
        })
        .filter(|v| (1..=8).contains(v))
        .unwrap_or(1)
}

/// Rotate/flip so the pixels display upright once EXIF is gone.
fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

/// Encoder quality byte, saturating at 100.
fn encoder_quality(quality: u32) -> u8 {
    u8::try_from(quality.min(100)).unwrap_or(100)
}

fn encode(img: &DynamicImage, format: OutputFormat, quality: u32) -> Result<Vec<u8>, String> {
    let mut buf = Vec::new();
    match format {
        OutputFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            let encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, encoder_quality(quality));
            rgb.write_with_encoder(encoder)
        }
        OutputFormat::Avif => {
            let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
            let encoder =
                image::codecs::avif::AvifEncoder::new_with_speed_quality(&mut buf, 6, encoder_quality(quality));
            rgba.write_with_encoder(encoder)
        }
    }
    .map_err(|e| e.to_string())?;
    Ok(buf)
}

/// Pure Rust compressor using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustCompressor;

impl RustCompressor {
    pub fn new() -> Self {
        Self
    }

    fn recompress(
        &self,
        file: &RawFile,
        format: ImageFormat,
        params: &CompressParams,
    ) -> Result<Payload, CompressError> {
        let img = image::load_from_memory_with_format(&file.bytes, format).map_err(|e| {
            CompressError::Decode {
                name: file.name.clone(),
                reason: e.to_string(),
            }
        })?;
        let orientation = read_orientation(&file.bytes);
        let img = apply_orientation(img, orientation);

        let resize_to = fit_within((img.width(), img.height()), params.max_dimension);
        let img = match resize_to {
            Some((w, h)) => img.resize_exact(w, h, FilterType::Lanczos3),
            None => img,
        };

        let mut best: Option<Vec<u8>> = None;
        for quality in quality_ladder(
            params.quality.value(),
            params.min_quality.value(),
            params.quality_step,
        ) {
            let encoded =
                encode(&img, params.format, quality).map_err(|reason| CompressError::Encode {
                    name: file.name.clone(),
                    reason,
                })?;
            let fits = encoded.len() as u64 <= params.max_bytes;
            if best.as_ref().is_none_or(|b| encoded.len() < b.len()) {
                best = Some(encoded);
            }
            if fits {
                break;
            }
        }
        let encoded = best.ok_or_else(|| CompressError::Encode {
            name: file.name.clone(),
            reason: "no quality level produced output".into(),
        })?;

        // Re-encoding a small, already-compact file can make it bigger.
        if resize_to.is_none() && orientation == 1 && file.len() <= encoded.len() {
            debug!(file = %file.name, "re-encode not smaller, keeping original");
            return Ok(Payload::new(
                file.name.clone(),
                format.to_mime_type(),
                Arc::clone(&file.bytes),
            ));
        }

        debug!(
            file = %file.name,
            before = file.len(),
            after = encoded.len(),
            "compressed"
        );
        Ok(Payload::new(
            format!("{}.{}", file.stem(), params.format.extension()),
            params.format.mime(),
            encoded,
        ))
    }

    fn pass_through(
        &self,
        file: &RawFile,
        kind: ContainerKind,
        params: &CompressParams,
    ) -> Result<Payload, CompressError> {
        if kind == ContainerKind::Avif {
            avif_parse::read_avif(&mut std::io::Cursor::new(&file.bytes[..])).map_err(|e| {
                CompressError::Decode {
                    name: file.name.clone(),
                    reason: format!("invalid AVIF container: {e:?}"),
                }
            })?;
        }
        if file.len() as u64 > params.max_bytes {
            return Err(CompressError::Unsupported {
                name: file.name.clone(),
                reason: format!(
                    "{kind} cannot be re-encoded and exceeds {} bytes",
                    params.max_bytes
                ),
            });
        }
        Ok(Payload::new(
            file.name.clone(),
            kind.mime(),
            Arc::clone(&file.bytes),
        ))
    }
}

impl Default for RustCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compressor for RustCompressor {
    fn compress(&self, file: &RawFile, params: &CompressParams) -> Result<Payload, CompressError> {
        match sniff(&file.bytes) {
            Sniffed::Decodable(format) => self.recompress(file, format, params),
            Sniffed::Container(kind) => self.pass_through(file, kind, params),
            Sniffed::Unknown => Err(CompressError::Unsupported {
                name: file.name.clone(),
                reason: "not a recognized image".into(),
            }),
        }
    }
}
