//! First-match-wins address extraction over a batch of selected files.
//!
//! Files are scanned in selection order. The first file whose GPS position
//! resolves to an address wins and scanning stops. Files without GPS, and
//! files whose lookup fails or comes back empty, are skipped. None of these
//! misses is an error: most photos carry no location at all.
//!
//! The address field belongs to the surrounding form. What happens when it
//! already holds a value is decided by [`AddressPolicy`].

use super::gps::read_gps;
use super::resolver::AddressResolver;
use crate::types::RawFile;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// What to do when the form already has an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressPolicy {
    /// Never overwrite; report the found address as a suggestion.
    #[default]
    KeepExisting,
    /// Replace whatever is there with the found address.
    Overwrite,
    /// Do not scan at all when an address is present.
    SkipWhenSet,
}

/// Result of one extraction pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressOutcome {
    /// An address was found and should be written to the field.
    Resolved(String),
    /// An address was found but the field already had a value, which is kept.
    Suggested { current: String, found: String },
    /// Scanning was skipped because the field already had a value.
    Skipped,
    /// No file yielded an address. The field is left unchanged.
    NoLocation,
}

/// The form-owned address field.
pub trait AddressSlot: Send + Sync {
    fn current(&self) -> String;
    fn set(&self, address: String);
}

/// Shared in-memory address field.
#[derive(Debug, Clone, Default)]
pub struct SharedAddress(Arc<Mutex<String>>);

impl SharedAddress {
    pub fn new(initial: impl Into<String>) -> Self {
        Self(Arc::new(Mutex::new(initial.into())))
    }
}

impl AddressSlot for SharedAddress {
    fn current(&self) -> String {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set(&self, address: String) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = address;
    }
}

pub struct AddressExtractor {
    resolver: Arc<dyn AddressResolver>,
    policy: AddressPolicy,
}

impl AddressExtractor {
    pub fn new(resolver: Arc<dyn AddressResolver>, policy: AddressPolicy) -> Self {
        Self { resolver, policy }
    }

    pub fn policy(&self) -> AddressPolicy {
        self.policy
    }

    /// Scan `files` and decide what the address should become.
    pub async fn extract(&self, files: &[RawFile], current: &str) -> AddressOutcome {
        let has_current = !current.trim().is_empty();
        if has_current && self.policy == AddressPolicy::SkipWhenSet {
            debug!("address already set, skipping GPS scan");
            return AddressOutcome::Skipped;
        }

        let Some(found) = self.first_address(files).await else {
            return AddressOutcome::NoLocation;
        };

        match (has_current, self.policy) {
            (true, AddressPolicy::KeepExisting) if found != current => {
                AddressOutcome::Suggested {
                    current: current.to_string(),
                    found,
                }
            }
            _ => AddressOutcome::Resolved(found),
        }
    }

    /// Like [`extract`](Self::extract), writing a resolved address into `slot`.
    pub async fn extract_into(&self, files: &[RawFile], slot: &dyn AddressSlot) -> AddressOutcome {
        let current = slot.current();
        let outcome = self.extract(files, &current).await;
        if let AddressOutcome::Resolved(address) = &outcome {
            slot.set(address.clone());
        }
        outcome
    }

    async fn first_address(&self, files: &[RawFile]) -> Option<String> {
        for (index, file) in files.iter().enumerate() {
            let Some(point) = read_gps(&file.bytes) else {
                continue;
            };
            match self.resolver.resolve(point).await {
                Ok(Some(address)) if !address.trim().is_empty() => {
                    debug!(index, file = %file.name, %address, "address resolved from GPS");
                    return Some(address.trim().to_string());
                }
                Ok(_) => {
                    debug!(index, file = %file.name, %point, "no address for GPS position");
                }
                Err(e) => {
                    warn!(index, file = %file.name, error = %e, "address lookup failed");
                }
            }
        }
        None
    }
}
