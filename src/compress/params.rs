//! Parameter types for compression.
//!
//! These structs describe *what* to produce, not *how*. The engine hands them
//! to whichever [`Compressor`](super::Compressor) is plugged in, so tests can
//! swap in a mock without touching the pipeline.

use crate::config::CompressionConfig;
use serde::{Deserialize, Serialize};

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

/// Encoded format of compressed payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Avif,
}

impl OutputFormat {
    pub fn mime(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Avif => "image/avif",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Avif => "avif",
        }
    }
}

/// Everything a compressor needs to know about the target artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressParams {
    /// Longest edge allowed in the output, in pixels.
    pub max_dimension: u32,
    /// Byte budget the quality ladder tries to get under.
    pub max_bytes: u64,
    /// Starting quality.
    pub quality: Quality,
    /// Lowest quality the ladder may step down to.
    pub min_quality: Quality,
    pub quality_step: u32,
    pub format: OutputFormat,
}

impl CompressParams {
    pub fn from_config(config: &CompressionConfig) -> Self {
        Self {
            max_dimension: config.max_dimension,
            max_bytes: config.max_bytes,
            quality: Quality::new(config.quality),
            min_quality: Quality::new(config.min_quality),
            quality_step: config.quality_step,
            format: config.format,
        }
    }
}

impl Default for CompressParams {
    fn default() -> Self {
        Self::from_config(&CompressionConfig::default())
    }
}
