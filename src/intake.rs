//! Intake controller: the single owner of a place entry's image list.
//!
//! Each file selection runs through
//!
//! ```text
//! Idle → Validating → Extracting → Compressing → Appending → Idle
//! ```
//!
//! Validation drops unsupported files and truncates the batch to the space
//! left under [`MAX_IMAGES`]. Extraction reads GPS from the accepted files and
//! may write the form's address. Compression shrinks the accepted files in
//! parallel. Appending registers a preview handle per compressed payload and
//! appends the entries in selection order, all under one lock.
//!
//! ## Re-entrancy
//!
//! Only one selection runs at a time. A selection that arrives while the
//! controller is not [`IntakeState::Idle`] is rejected with
//! [`IntakeError::Busy`] and has no side effects.
//!
//! ## Cancellation and teardown
//!
//! The busy state is held by a guard that returns the controller to `Idle`
//! when dropped, so a cancelled `select_files` future never wedges it.
//! Preview handles are only acquired inside the commit step. If the list was
//! torn down or the session closed while the pipeline was suspended, the
//! compressed results are discarded before any handle exists. A commit that
//! fails halfway releases what it already acquired.

use crate::compress::{CompressError, CompressParams, Compressor, compress_batch};
use crate::list::{ImageList, ListError};
use crate::location::{AddressExtractor, AddressOutcome, AddressSlot};
use crate::preview::PreviewHandle;
use crate::types::{EntryId, ImageEntry, MAX_IMAGES, Payload, RawFile, SubmittedImage};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntakeError {
    #[error("another selection is still being processed")]
    Busy,
    #[error("image list is full ({max} images)")]
    CapacityExceeded { max: usize },
    #[error("the write session has been closed")]
    SessionClosed,
    #[error("the image list was torn down while the selection was processed")]
    Cancelled,
    #[error(transparent)]
    List(#[from] ListError),
}

/// Pipeline stage of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntakeState {
    #[default]
    Idle,
    Validating,
    Extracting,
    Compressing,
    Appending,
}

impl IntakeState {
    pub fn is_busy(self) -> bool {
        self != IntakeState::Idle
    }
}

impl fmt::Display for IntakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IntakeState::Idle => "idle",
            IntakeState::Validating => "validating",
            IntakeState::Extracting => "extracting",
            IntakeState::Compressing => "compressing",
            IntakeState::Appending => "appending",
        };
        f.write_str(name)
    }
}

/// User-facing notifications. Logs go through `tracing`; these are meant to
/// be shown to the person selecting files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeEvent {
    /// The selection did not fit. `accepted` files proceed, `dropped` do not.
    CapacityExceeded {
        accepted: usize,
        dropped: usize,
        max: usize,
    },
    UnsupportedFile {
        name: String,
    },
    AddressResolved {
        address: String,
    },
    /// A GPS address was found but the field already holds a different value.
    AddressSuggested {
        current: String,
        found: String,
    },
    /// `index` is the file's position within the accepted batch.
    CompressionFailed {
        index: usize,
        name: String,
        reason: String,
    },
    EntryAppended {
        id: EntryId,
        name: String,
    },
    RetrievalFailed {
        path: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendedEntry {
    pub id: EntryId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedFile {
    pub index: usize,
    pub name: String,
    pub reason: String,
}

/// What one selection did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntakeReport {
    pub selected: usize,
    pub unsupported: Vec<String>,
    /// Accepted files cut off by the capacity limit, in selection order.
    pub dropped: Vec<String>,
    pub appended: Vec<AppendedEntry>,
    pub failed: Vec<FailedFile>,
    /// `None` when extraction did not run.
    pub address: Option<AddressOutcome>,
}

/// Session-scoped state of one write flow.
///
/// Created when the user enters the write flow and closed explicitly when
/// they leave it. Closing clears pending tags and makes every controller
/// bound to the session refuse further selections.
#[derive(Debug)]
pub struct SessionContext {
    id: Uuid,
    closed: AtomicBool,
    tags: Mutex<Vec<String>>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            closed: AtomicBool::new(false),
            tags: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Add a pending tag. Duplicates and blank tags are ignored.
    pub fn add_tag(&self, tag: impl Into<String>) -> bool {
        let tag = tag.into();
        let tag = tag.trim();
        if tag.is_empty() || self.is_closed() {
            return false;
        }
        let mut tags = self.tags.lock().unwrap_or_else(PoisonError::into_inner);
        if tags.iter().any(|t| t == tag) {
            return false;
        }
        tags.push(tag.to_string());
        true
    }

    pub fn tags(&self) -> Vec<String> {
        self.tags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Leave the write flow: clear tags and mark the session closed.
    pub fn close(&self) {
        self.tags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!(session = %self.id, "write session closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

struct Inner {
    list: ImageList,
    /// Bumped on teardown so in-flight selections can tell their list is gone.
    generation: u64,
}

pub struct IntakeController {
    session: Arc<SessionContext>,
    compressor: Arc<dyn Compressor>,
    extractor: AddressExtractor,
    params: CompressParams,
    inner: Mutex<Inner>,
    state: watch::Sender<IntakeState>,
    events: Option<Sender<IntakeEvent>>,
}

impl IntakeController {
    pub fn new(
        session: Arc<SessionContext>,
        compressor: Arc<dyn Compressor>,
        extractor: AddressExtractor,
        params: CompressParams,
    ) -> Self {
        let (state, _) = watch::channel(IntakeState::Idle);
        Self {
            session,
            compressor,
            extractor,
            params,
            inner: Mutex::new(Inner {
                list: ImageList::new(),
                generation: 0,
            }),
            state,
            events: None,
        }
    }

    /// Send user-facing notifications to `events`.
    pub fn with_events(mut self, events: Sender<IntakeEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Run one file selection through the pipeline.
    pub async fn select_files(
        &self,
        files: Vec<RawFile>,
        address: &dyn AddressSlot,
    ) -> Result<IntakeReport, IntakeError> {
        if self.session.is_closed() {
            return Err(IntakeError::SessionClosed);
        }
        let busy = BusyGuard::enter(&self.state).ok_or(IntakeError::Busy)?;

        let mut report = IntakeReport {
            selected: files.len(),
            ..IntakeReport::default()
        };

        let (mut batch, unsupported): (Vec<RawFile>, Vec<RawFile>) =
            files.into_iter().partition(RawFile::is_accepted);
        for file in unsupported {
            debug!(file = %file.name, "unsupported file skipped");
            self.emit(IntakeEvent::UnsupportedFile {
                name: file.name.clone(),
            });
            report.unsupported.push(file.name);
        }
        if batch.is_empty() {
            return Ok(report);
        }

        let (remaining, generation) = {
            let inner = self.lock();
            (inner.list.remaining(), inner.generation)
        };
        let accepted = batch.len().min(remaining);
        let dropped = batch.len() - accepted;
        if dropped > 0 {
            warn!(accepted, dropped, max = MAX_IMAGES, "selection exceeds image limit");
            self.emit(IntakeEvent::CapacityExceeded {
                accepted,
                dropped,
                max: MAX_IMAGES,
            });
        }
        if accepted == 0 {
            return Err(IntakeError::CapacityExceeded { max: MAX_IMAGES });
        }
        report.dropped = batch.split_off(accepted).into_iter().map(|f| f.name).collect();

        busy.advance(IntakeState::Extracting);
        let outcome = self.extractor.extract(&batch, &address.current()).await;
        self.ensure_live(generation)?;
        match &outcome {
            AddressOutcome::Resolved(found) => {
                address.set(found.clone());
                self.emit(IntakeEvent::AddressResolved {
                    address: found.clone(),
                });
            }
            AddressOutcome::Suggested { current, found } => {
                info!(%current, %found, "keeping existing address");
                self.emit(IntakeEvent::AddressSuggested {
                    current: current.clone(),
                    found: found.clone(),
                });
            }
            AddressOutcome::Skipped | AddressOutcome::NoLocation => {}
        }
        report.address = Some(outcome);

        busy.advance(IntakeState::Compressing);
        let results = compress_batch(Arc::clone(&self.compressor), batch, self.params.clone()).await;

        busy.advance(IntakeState::Appending);
        let events = self.commit(generation, results, &mut report)?;
        for event in events {
            self.emit(event);
        }
        info!(
            appended = report.appended.len(),
            failed = report.failed.len(),
            len = self.len(),
            "selection processed"
        );
        Ok(report)
    }

    /// Append compressed results under the lock, or nothing at all.
    fn commit(
        &self,
        generation: u64,
        results: Vec<Result<Payload, CompressError>>,
        report: &mut IntakeReport,
    ) -> Result<Vec<IntakeEvent>, IntakeError> {
        let mut inner = self.lock();
        if self.session.is_closed() {
            debug!("session closed mid-selection, discarding results");
            return Err(IntakeError::SessionClosed);
        }
        if inner.generation != generation {
            debug!("list torn down mid-selection, discarding results");
            return Err(IntakeError::Cancelled);
        }

        let mut events = Vec::new();
        let mut appended = Vec::new();
        let mut failed = Vec::new();
        let mut pending = PendingCommit::new(&mut inner.list);
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(payload) => {
                    let entry = ImageEntry::new(payload);
                    let record = AppendedEntry {
                        id: entry.id(),
                        name: entry.payload().name().to_string(),
                    };
                    pending.append(entry)?;
                    events.push(IntakeEvent::EntryAppended {
                        id: record.id,
                        name: record.name.clone(),
                    });
                    appended.push(record);
                }
                Err(e) => {
                    warn!(index, file = e.file_name(), error = %e, "compression failed, file skipped");
                    let failure = FailedFile {
                        index,
                        name: e.file_name().to_string(),
                        reason: e.to_string(),
                    };
                    events.push(IntakeEvent::CompressionFailed {
                        index,
                        name: failure.name.clone(),
                        reason: failure.reason.clone(),
                    });
                    failed.push(failure);
                }
            }
        }
        pending.finish();

        report.appended = appended;
        report.failed = failed;
        Ok(events)
    }

    /// Remove the entry at `index`, releasing its preview handle.
    pub fn remove_at(&self, index: usize) -> Result<ImageEntry, IntakeError> {
        Ok(self.lock().list.remove_at(index)?)
    }

    /// Replace the order with a permutation of the current entry ids.
    pub fn reorder(&self, order: &[EntryId]) -> Result<(), IntakeError> {
        Ok(self.lock().list.reorder(order)?)
    }

    /// Tear the list down: drop every entry and release every handle.
    ///
    /// A selection still in flight will discard its results.
    pub fn teardown(&self) -> usize {
        let mut inner = self.lock();
        inner.generation += 1;
        let released = inner.list.clear();
        debug!(released, "image list torn down");
        released
    }

    pub fn submission(&self) -> Vec<SubmittedImage> {
        self.lock().list.submission()
    }

    /// The cover image, if any.
    pub fn representative(&self) -> Option<ImageEntry> {
        self.lock().list.representative().cloned()
    }

    pub fn entries(&self) -> Vec<ImageEntry> {
        self.lock().list.entries().to_vec()
    }

    pub fn ids(&self) -> Vec<EntryId> {
        self.lock().list.ids()
    }

    pub fn preview(&self, index: usize) -> Option<PreviewHandle> {
        self.lock().list.preview(index)
    }

    /// Run `f` against the list. Do not call back into the controller from `f`.
    pub fn with_list<R>(&self, f: impl FnOnce(&ImageList) -> R) -> R {
        f(&self.lock().list)
    }

    pub fn len(&self) -> usize {
        self.lock().list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().list.is_empty()
    }

    pub fn state(&self) -> IntakeState {
        *self.state.borrow()
    }

    /// Watch the pipeline state, e.g. to disable the upload trigger while busy.
    pub fn subscribe(&self) -> watch::Receiver<IntakeState> {
        self.state.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.state().is_busy()
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    fn ensure_live(&self, generation: u64) -> Result<(), IntakeError> {
        if self.session.is_closed() {
            return Err(IntakeError::SessionClosed);
        }
        if self.lock().generation != generation {
            return Err(IntakeError::Cancelled);
        }
        Ok(())
    }

    fn emit(&self, event: IntakeEvent) {
        if let Some(tx) = &self.events {
            tx.send(event).ok();
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for IntakeController {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Holds the controller out of `Idle` for the life of one selection.
struct BusyGuard<'a> {
    state: &'a watch::Sender<IntakeState>,
}

impl<'a> BusyGuard<'a> {
    fn enter(state: &'a watch::Sender<IntakeState>) -> Option<Self> {
        let entered = state.send_if_modified(|current| {
            if current.is_busy() {
                return false;
            }
            *current = IntakeState::Validating;
            true
        });
        if entered {
            debug!(state = %IntakeState::Validating, "intake state");
        }
        entered.then_some(Self { state })
    }

    fn advance(&self, next: IntakeState) {
        debug!(state = %next, "intake state");
        self.state.send_replace(next);
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.state.send_replace(IntakeState::Idle);
        debug!(state = %IntakeState::Idle, "intake state");
    }
}

/// Entries appended by a commit that has not finished yet.
///
/// Dropped without [`finish`](Self::finish), it removes them again, which
/// releases their preview handles.
struct PendingCommit<'a> {
    list: &'a mut ImageList,
    appended: Vec<EntryId>,
}

impl<'a> PendingCommit<'a> {
    fn new(list: &'a mut ImageList) -> Self {
        Self {
            list,
            appended: Vec::new(),
        }
    }

    fn append(&mut self, entry: ImageEntry) -> Result<(), ListError> {
        let id = entry.id();
        self.list.append(entry)?;
        self.appended.push(id);
        Ok(())
    }

    fn finish(mut self) {
        self.appended.clear();
    }
}

impl Drop for PendingCommit<'_> {
    fn drop(&mut self) {
        for id in self.appended.drain(..).rev() {
            if let Some(index) = self.list.position(id) {
                self.list.remove_at(index).ok();
            }
        }
    }
}
