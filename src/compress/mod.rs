//! Compression engine: shrinks selected photos before upload.
//!
//! | Step | Crate / function |
//! |---|---|
//! | **Sniff** | `image::guess_format` + ISO-BMFF `ftyp` brand check |
//! | **Orientation** | EXIF `Orientation` via `kamadak-exif`, applied before re-encode |
//! | **Resize** | Lanczos3 down to `max_dimension` on the longer edge |
//! | **Encode** | JPEG (`JpegEncoder`) or AVIF (rav1e), stepping quality down to fit `max_bytes` |
//! | **Batch** | `spawn_blocking` + rayon, order-preserving, per-file results |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension and quality math (unit testable)
//! - **Parameters**: What to produce ([`CompressParams`], [`Quality`], [`OutputFormat`])
//! - **Backend**: [`Compressor`] trait + [`RustCompressor`]
//! - **Engine**: [`compress_batch`], the async batch entry point

pub mod backend;
mod calculations;
pub mod engine;
mod params;
pub mod rust_backend;

pub use backend::{CompressError, Compressor};
pub use calculations::{fit_within, quality_ladder};
pub use engine::compress_batch;
pub use params::{CompressParams, OutputFormat, Quality};
pub use rust_backend::RustCompressor;
