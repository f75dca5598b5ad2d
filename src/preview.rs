//! Preview handle registry.
//!
//! A preview handle is a process-local, revocable reference used to display
//! a payload without re-reading it. Handles are keyed by [`PayloadId`]: asking
//! twice for the same payload returns the same handle instance, and releasing
//! revokes it for every outstanding clone.
//!
//! Handles are display-only. They are never serialized and their URLs are
//! meaningless outside the current process.

use crate::types::{Payload, PayloadId};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::trace;
use uuid::Uuid;

const URL_SCHEME: &str = "blob:place-photos/";

#[derive(Debug)]
struct HandleInner {
    url: String,
    mime: String,
    bytes: Arc<[u8]>,
    revoked: AtomicBool,
}

/// Cheaply clonable display handle for one payload.
#[derive(Debug, Clone)]
pub struct PreviewHandle(Arc<HandleInner>);

impl PreviewHandle {
    fn new(payload: &Payload) -> Self {
        Self(Arc::new(HandleInner {
            url: format!("{URL_SCHEME}{}", Uuid::new_v4()),
            mime: payload.mime().to_string(),
            bytes: Arc::clone(payload.bytes()),
            revoked: AtomicBool::new(false),
        }))
    }

    pub fn url(&self) -> &str {
        &self.0.url
    }

    pub fn mime(&self) -> &str {
        &self.0.mime
    }

    /// Bytes to display, or `None` once the handle has been released.
    pub fn bytes(&self) -> Option<&[u8]> {
        if self.is_revoked() {
            None
        } else {
            Some(&self.0.bytes[..])
        }
    }

    pub fn is_revoked(&self) -> bool {
        self.0.revoked.load(Ordering::Acquire)
    }

    /// True when both values refer to the same allocated handle.
    pub fn ptr_eq(&self, other: &PreviewHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn revoke(&self) {
        self.0.revoked.store(true, Ordering::Release);
    }
}

/// Outstanding preview handles, one per payload.
#[derive(Debug, Default)]
pub struct PreviewRegistry {
    handles: HashMap<PayloadId, PreviewHandle>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the handle for `payload`, allocating it on first access.
    pub fn acquire(&mut self, payload: &Payload) -> PreviewHandle {
        self.handles
            .entry(payload.id())
            .or_insert_with(|| {
                let handle = PreviewHandle::new(payload);
                trace!(payload = %payload.id(), url = handle.url(), "preview handle allocated");
                handle
            })
            .clone()
    }

    /// Revoke and forget the handle for `id`. Returns whether one existed.
    pub fn release(&mut self, id: PayloadId) -> bool {
        match self.handles.remove(&id) {
            Some(handle) => {
                handle.revoke();
                trace!(payload = %id, url = handle.url(), "preview handle released");
                true
            }
            None => false,
        }
    }

    pub fn lookup(&self, id: PayloadId) -> Option<PreviewHandle> {
        self.handles.get(&id).cloned()
    }

    pub fn contains(&self, id: PayloadId) -> bool {
        self.handles.contains_key(&id)
    }

    /// Revoke every outstanding handle. Returns how many were released.
    pub fn release_all(&mut self) -> usize {
        let count = self.handles.len();
        for (_, handle) in self.handles.drain() {
            handle.revoke();
        }
        count
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl Drop for PreviewRegistry {
    fn drop(&mut self) {
        self.release_all();
    }
}
