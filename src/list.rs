//! The ordered, bounded image list of one place entry.
//!
//! The list owns the [`PreviewRegistry`] for its payloads, so a handle exists
//! exactly while some entry references the payload: `append` acquires,
//! `remove_at` and `clear` release, and `reorder` leaves handles alone.
//!
//! Position is the only source of truth for the cover image. Whatever sits at
//! index 0 is the representative image of the place.

use crate::preview::{PreviewHandle, PreviewRegistry};
use crate::types::{EntryId, ImageEntry, MAX_IMAGES, SubmittedImage};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListError {
    #[error("image list is full ({max} images)")]
    CapacityExceeded { max: usize },
    #[error("no image at position {index} (list has {len})")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("reorder must list every image exactly once: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("reorder references unknown image {0}")]
    UnknownEntry(EntryId),
    #[error("image {0} is listed more than once")]
    DuplicateEntry(EntryId),
}

#[derive(Debug, Default)]
pub struct ImageList {
    entries: Vec<ImageEntry>,
    previews: PreviewRegistry,
}

impl ImageList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and return its preview handle.
    ///
    /// Fails without side effects when the list already holds [`MAX_IMAGES`]
    /// or already contains an entry with the same id.
    pub fn append(&mut self, entry: ImageEntry) -> Result<PreviewHandle, ListError> {
        if self.is_full() {
            return Err(ListError::CapacityExceeded { max: MAX_IMAGES });
        }
        if self.position(entry.id()).is_some() {
            return Err(ListError::DuplicateEntry(entry.id()));
        }
        let handle = self.previews.acquire(entry.payload());
        debug!(entry = %entry.id(), position = self.entries.len(), "image appended");
        self.entries.push(entry);
        Ok(handle)
    }

    /// Remove the entry at `index`, releasing its preview handle.
    pub fn remove_at(&mut self, index: usize) -> Result<ImageEntry, ListError> {
        if index >= self.entries.len() {
            return Err(ListError::IndexOutOfBounds {
                index,
                len: self.entries.len(),
            });
        }
        let removed = self.entries.remove(index);
        let payload_id = removed.payload().id();
        let still_referenced = self.entries.iter().any(|e| e.payload().id() == payload_id);
        if !still_referenced {
            self.previews.release(payload_id);
        }
        debug!(entry = %removed.id(), position = index, "image removed");
        Ok(removed)
    }

    /// Replace the order wholesale with a permutation of the current ids.
    ///
    /// Anything that adds, drops, or repeats an id is rejected and the list is
    /// left untouched.
    pub fn reorder(&mut self, order: &[EntryId]) -> Result<(), ListError> {
        if order.len() != self.entries.len() {
            return Err(ListError::LengthMismatch {
                expected: self.entries.len(),
                actual: order.len(),
            });
        }

        let mut seen = HashSet::with_capacity(order.len());
        for id in order {
            if !seen.insert(*id) {
                return Err(ListError::DuplicateEntry(*id));
            }
        }

        let mut by_id: HashMap<EntryId, ImageEntry> =
            self.entries.iter().map(|e| (e.id(), e.clone())).collect();
        let mut reordered = Vec::with_capacity(order.len());
        for id in order {
            let entry = by_id.remove(id).ok_or(ListError::UnknownEntry(*id))?;
            reordered.push(entry);
        }

        self.entries = reordered;
        debug!(len = self.entries.len(), "image list reordered");
        Ok(())
    }

    /// Drop every entry and release every handle. Returns the number of
    /// handles released.
    pub fn clear(&mut self) -> usize {
        self.entries.clear();
        self.previews.release_all()
    }

    /// The cover image: whatever entry is at index 0.
    pub fn representative(&self) -> Option<&ImageEntry> {
        self.entries.first()
    }

    pub fn entries(&self) -> &[ImageEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&ImageEntry> {
        self.entries.get(index)
    }

    pub fn ids(&self) -> Vec<EntryId> {
        self.entries.iter().map(ImageEntry::id).collect()
    }

    pub fn position(&self, id: EntryId) -> Option<usize> {
        self.entries.iter().position(|e| e.id() == id)
    }

    /// Preview handle for the entry at `index`. Allocates nothing.
    pub fn preview(&self, index: usize) -> Option<PreviewHandle> {
        let entry = self.entries.get(index)?;
        self.previews.lookup(entry.payload().id())
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    /// Entries in list order, shaped for the submission flow.
    pub fn submission(&self) -> Vec<SubmittedImage> {
        self.entries
            .iter()
            .map(|e| SubmittedImage {
                identity: e.id(),
                payload: e.payload().clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= MAX_IMAGES
    }

    /// How many more images fit before the cap.
    pub fn remaining(&self) -> usize {
        MAX_IMAGES.saturating_sub(self.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Payload;

    fn entry(name: &str) -> ImageEntry {
        ImageEntry::new(Payload::new(name, "image/jpeg", name.as_bytes().to_vec()))
    }

    fn filled(n: usize) -> ImageList {
        let mut list = ImageList::new();
        for i in 0..n {
            list.append(entry(&format!("{i}.jpg"))).unwrap();
        }
        list
    }

    fn names(list: &ImageList) -> Vec<String> {
        list.entries()
            .iter()
            .map(|e| e.payload().name().to_string())
            .collect()
    }

    #[test]
    fn append_acquires_handle() {
        let mut list = ImageList::new();
        let e = entry("a.jpg");
        let payload_id = e.payload().id();
        let handle = list.append(e).unwrap();
        assert!(!handle.is_revoked());
        assert!(list.previews().contains(payload_id));
        assert!(list.preview(0).unwrap().ptr_eq(&handle));
    }

    #[test]
    fn append_rejects_same_entry_twice() {
        let mut list = ImageList::new();
        let e = entry("a.jpg");
        let handle = list.append(e.clone()).unwrap();

        assert_eq!(list.append(e.clone()).unwrap_err(), ListError::DuplicateEntry(e.id()));
        assert_eq!(list.len(), 1);
        assert!(!handle.is_revoked());

        list.reorder(&list.ids()).unwrap();
        list.remove_at(0).unwrap();
        assert!(handle.is_revoked());
        assert!(list.is_empty());
    }

    #[test]
    fn append_rejects_at_capacity() {
        let mut list = filled(MAX_IMAGES);
        assert!(list.is_full());
        assert_eq!(list.remaining(), 0);

        let result = list.append(entry("extra.jpg"));
        assert_eq!(result.unwrap_err(), ListError::CapacityExceeded { max: MAX_IMAGES });
        assert_eq!(list.len(), MAX_IMAGES);
        assert_eq!(list.previews().len(), MAX_IMAGES);
    }

    #[test]
    fn remove_releases_only_that_handle() {
        let mut list = filled(3);
        let kept: Vec<_> = [0, 2].iter().map(|&i| list.preview(i).unwrap()).collect();
        let removed_handle = list.preview(1).unwrap();

        let removed = list.remove_at(1).unwrap();
        assert_eq!(removed.payload().name(), "1.jpg");
        assert!(removed_handle.is_revoked());
        assert!(kept.iter().all(|h| !h.is_revoked()));
        assert_eq!(list.previews().len(), 2);
        assert_eq!(names(&list), vec!["0.jpg", "2.jpg"]);
    }

    #[test]
    fn remove_out_of_bounds_is_error() {
        let mut list = filled(2);
        assert_eq!(
            list.remove_at(2).unwrap_err(),
            ListError::IndexOutOfBounds { index: 2, len: 2 }
        );
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn remove_keeps_handle_for_shared_payload() {
        let mut list = ImageList::new();
        let payload = Payload::new("a.jpg", "image/jpeg", vec![1u8]);
        list.append(ImageEntry::new(payload.clone())).unwrap();
        list.append(ImageEntry::new(payload.clone())).unwrap();

        list.remove_at(0).unwrap();
        assert!(list.previews().contains(payload.id()));
        list.remove_at(0).unwrap();
        assert!(!list.previews().contains(payload.id()));
    }

    #[test]
    fn remove_first_promotes_next_to_representative() {
        let mut list = filled(3);
        list.remove_at(0).unwrap();
        assert_eq!(list.representative().unwrap().payload().name(), "1.jpg");
    }

    #[test]
    fn reorder_applies_permutation() {
        let mut list = filled(3);
        let ids = list.ids();
        let handles: Vec<_> = (0..3).map(|i| list.preview(i).unwrap()).collect();

        list.reorder(&[ids[2], ids[0], ids[1]]).unwrap();
        assert_eq!(names(&list), vec!["2.jpg", "0.jpg", "1.jpg"]);
        assert_eq!(list.representative().unwrap().id(), ids[2]);
        // Handles follow their payloads, not positions.
        assert!(list.preview(0).unwrap().ptr_eq(&handles[2]));
        assert!(handles.iter().all(|h| !h.is_revoked()));
    }

    #[test]
    fn reorder_rejects_wrong_length() {
        let mut list = filled(3);
        let ids = list.ids();
        assert_eq!(
            list.reorder(&ids[..2]).unwrap_err(),
            ListError::LengthMismatch {
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn reorder_rejects_duplicates_without_change() {
        let mut list = filled(3);
        let ids = list.ids();
        let err = list.reorder(&[ids[0], ids[0], ids[1]]).unwrap_err();
        assert_eq!(err, ListError::DuplicateEntry(ids[0]));
        assert_eq!(list.ids(), ids);
    }

    #[test]
    fn reorder_rejects_foreign_ids() {
        let mut list = filled(2);
        let ids = list.ids();
        let stranger = EntryId::new();
        assert_eq!(
            list.reorder(&[ids[0], stranger]).unwrap_err(),
            ListError::UnknownEntry(stranger)
        );
        assert_eq!(list.ids(), ids);
    }

    #[test]
    fn clear_releases_all() {
        let mut list = filled(4);
        let handles: Vec<_> = (0..4).map(|i| list.preview(i).unwrap()).collect();
        assert_eq!(list.clear(), 4);
        assert!(list.is_empty());
        assert!(handles.iter().all(PreviewHandle::is_revoked));
    }

    #[test]
    fn submission_follows_list_order() {
        let mut list = filled(3);
        let ids = list.ids();
        list.reorder(&[ids[1], ids[2], ids[0]]).unwrap();

        let submitted: Vec<_> = list.submission().iter().map(|s| s.identity).collect();
        assert_eq!(submitted, vec![ids[1], ids[2], ids[0]]);
    }

    #[test]
    fn empty_list_has_no_representative() {
        let list = ImageList::new();
        assert!(list.representative().is_none());
        assert!(list.preview(0).is_none());
        assert_eq!(list.remaining(), MAX_IMAGES);
    }
}
