//! Shared types used across the intake pipeline.
//!
//! A [`RawFile`] is what the user selected. The compression stage turns it
//! into a [`Payload`], which is wrapped in an [`ImageEntry`] once it lands in
//! the ordered list. Identities are explicit ids rather than byte equality, so
//! a cloned payload still maps to the same preview handle.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Hard cap on the number of images a single place entry may carry.
pub const MAX_IMAGES: usize = 8;

/// File extensions accepted at intake (compared case-insensitively).
pub const ACCEPTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "avif", "heic"];

/// Stable identity of an entry in the ordered list, independent of position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(Uuid);

impl EntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identity of a compressed payload. Preview handles are keyed by this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PayloadId(Uuid);

impl PayloadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PayloadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PayloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A file as selected by the user, before compression.
#[derive(Debug, Clone)]
pub struct RawFile {
    pub name: String,
    pub bytes: Arc<[u8]>,
}

impl RawFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Lowercased extension of the file name, if any.
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    /// File name without its extension.
    pub fn stem(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.name,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.extension()
            .is_some_and(|ext| ACCEPTED_EXTENSIONS.contains(&ext.as_str()))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A compressed image artifact. Immutable once built.
#[derive(Debug, Clone)]
pub struct Payload {
    id: PayloadId,
    name: String,
    mime: String,
    bytes: Arc<[u8]>,
}

impl Payload {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            id: PayloadId::new(),
            name: name.into(),
            mime: mime.into(),
            bytes: bytes.into(),
        }
    }

    pub fn id(&self) -> PayloadId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn bytes(&self) -> &Arc<[u8]> {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Extension matching the payload's MIME subtype (`jpg` for JPEG).
    pub fn extension(&self) -> &str {
        match self.mime.split_once('/').map(|(_, sub)| sub) {
            Some("jpeg") | None | Some("") => "jpg",
            Some(sub) => sub,
        }
    }
}

/// One item in the ordered image list.
///
/// Entries are never edited in place: replacing a payload means removing the
/// entry and appending a new one.
#[derive(Debug, Clone)]
pub struct ImageEntry {
    id: EntryId,
    payload: Payload,
}

impl ImageEntry {
    pub fn new(payload: Payload) -> Self {
        Self {
            id: EntryId::new(),
            payload,
        }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }
}

/// What the downstream submission flow receives for each entry, in list order.
#[derive(Debug, Clone)]
pub struct SubmittedImage {
    pub identity: EntryId,
    pub payload: Payload,
}
