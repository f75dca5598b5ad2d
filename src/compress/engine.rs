//! Async batch entry point for compression.
//!
//! A batch runs on tokio's blocking pool and fans out over rayon. Results
//! come back in input order with one slot per file, so a failure or a panic
//! in one file never shifts or drops the others.

use super::backend::{CompressError, Compressor};
use super::params::CompressParams;
use crate::types::{Payload, RawFile};
use rayon::prelude::*;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Compress `files` concurrently, preserving order and cardinality.
pub async fn compress_batch(
    compressor: Arc<dyn Compressor>,
    files: Vec<RawFile>,
    params: CompressParams,
) -> Vec<Result<Payload, CompressError>> {
    if files.is_empty() {
        return Vec::new();
    }

    let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
    let started = Instant::now();
    let task = tokio::task::spawn_blocking(move || {
        files
            .par_iter()
            .map(|file| compress_one(compressor.as_ref(), file, &params))
            .collect::<Vec<_>>()
    });

    match task.await {
        Ok(results) => {
            debug!(
                files = results.len(),
                failed = results.iter().filter(|r| r.is_err()).count(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "compression batch finished"
            );
            results
        }
        Err(e) => {
            warn!(error = %e, "compression task did not complete");
            names
                .into_iter()
                .map(|name| {
                    Err(CompressError::Aborted {
                        name,
                        reason: e.to_string(),
                    })
                })
                .collect()
        }
    }
}

fn compress_one(
    compressor: &dyn Compressor,
    file: &RawFile,
    params: &CompressParams,
) -> Result<Payload, CompressError> {
    catch_unwind(AssertUnwindSafe(|| compressor.compress(file, params))).unwrap_or_else(|_| {
        Err(CompressError::Aborted {
            name: file.name.clone(),
            reason: "compressor panicked".into(),
        })
    })
}
