//! Compressor trait and shared error type.
//!
//! The [`Compressor`] trait is the seam between the async batch engine and
//! the pixel work. The production implementation is
//! [`RustCompressor`](super::rust_backend::RustCompressor); tests plug in
//! mocks that fail or panic on chosen files.

use super::params::CompressParams;
use crate::types::{Payload, RawFile};
use thiserror::Error;

/// Per-file compression failure. Never fatal to the batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompressError {
    #[error("Failed to decode {name}: {reason}")]
    Decode { name: String, reason: String },
    #[error("Failed to encode {name}: {reason}")]
    Encode { name: String, reason: String },
    #[error("Unsupported image {name}: {reason}")]
    Unsupported { name: String, reason: String },
    #[error("Compression of {name} aborted: {reason}")]
    Aborted { name: String, reason: String },
}

impl CompressError {
    /// Name of the file the error belongs to.
    pub fn file_name(&self) -> &str {
        match self {
            CompressError::Decode { name, .. }
            | CompressError::Encode { name, .. }
            | CompressError::Unsupported { name, .. }
            | CompressError::Aborted { name, .. } => name,
        }
    }
}

/// Turns one raw file into one compressed payload.
///
/// Implementations must be `Send + Sync`: the engine fans a batch out over a
/// rayon pool from inside a blocking task.
pub trait Compressor: Send + Sync {
    fn compress(&self, file: &RawFile, params: &CompressParams) -> Result<Payload, CompressError>;
}
