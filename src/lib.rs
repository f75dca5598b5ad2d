//! # Place Photos
//!
//! Multi-image intake for place entries. A user selects photos for a place;
//! the pipeline infers an address from their GPS metadata, shrinks them for
//! upload, and keeps them in an ordered, reorderable list of at most eight
//! images, each with a revocable preview handle.
//!
//! # Architecture: One Selection, Four Stages
//!
//! ```text
//! select_files ─▶ Validate ─▶ Extract GPS ─▶ Compress ─▶ Append
//!                 (capacity)   (address)      (parallel)   (handles + list)
//! ```
//!
//! Validation and appending are synchronous. Extraction and compression are
//! the only suspension points: extraction awaits an external address
//! resolver, and compression runs on tokio's blocking pool, fanned out over
//! rayon. Results are re-correlated by file index, so entries land in the
//! order the user selected them.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`types`] | Shared data model: ids, raw files, compressed payloads, entries |
//! | [`preview`] | Preview handle registry: acquire, lookup, release, revoke |
//! | [`compress`] | Compression engine: resize, orient, re-encode to a byte budget |
//! | [`location`] | EXIF GPS reading and first-match-wins address extraction |
//! | [`list`] | The bounded ordered image list; index 0 is the cover |
//! | [`intake`] | Intake controller state machine, session context, notifications |
//! | [`retrieval`] | Downloading stored images with a suggested filename |
//! | [`config`] | `place-photos.toml` loading, validation, and merging |
//! | [`output`] | CLI output formatting for events, reports, and the list |
//!
//! # Design Decisions
//!
//! ## Explicit Identities
//!
//! Entries and payloads carry `uuid` ids. Preview handles are keyed by
//! payload id, never by byte equality, so a cloned payload maps to the same
//! handle and two identical photos still get separate entries.
//!
//! ## One Owner for the List
//!
//! [`intake::IntakeController`] owns the [`list::ImageList`], which owns the
//! [`preview::PreviewRegistry`]. Appends from a selection and removes or
//! reorders from the user all go through the controller, and handle
//! membership changes in lock-step with list membership.
//!
//! ## Reject, Don't Queue
//!
//! A second selection arriving mid-pipeline is rejected with
//! [`intake::IntakeError::Busy`]. The busy state is published on a `watch`
//! channel so the upload trigger can be disabled while it lasts.
//!
//! ## Keep the User's Address
//!
//! With the default policy, GPS never overwrites an address the user already
//! entered. The found address is reported as a suggestion instead. See
//! [`location::AddressPolicy`] for the alternatives.

pub mod compress;
pub mod config;
pub mod intake;
pub mod list;
pub mod location;
pub mod output;
pub mod preview;
pub mod retrieval;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
