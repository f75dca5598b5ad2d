//! Address resolution seam.
//!
//! Turning coordinates into a human-readable address is an external
//! capability (a geocoding service). The pipeline only depends on the
//! [`AddressResolver`] trait.

use super::gps::GeoPoint;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("address lookup failed: {0}")]
    Lookup(String),
    #[error("address service unavailable: {0}")]
    Unavailable(String),
}

/// Resolves a coordinate to an address string.
///
/// `Ok(None)` means the service answered but knows no address for the point.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    async fn resolve(&self, point: GeoPoint) -> Result<Option<String>, ResolveError>;
}

/// Offline resolver that renders the coordinates themselves as the address.
#[derive(Debug, Clone, Default)]
pub struct CoordinateResolver;

impl CoordinateResolver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AddressResolver for CoordinateResolver {
    async fn resolve(&self, point: GeoPoint) -> Result<Option<String>, ResolveError> {
        Ok(Some(point.to_string()))
    }
}
