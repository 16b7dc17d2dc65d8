//! Batch state: the per-file item lifecycle and the shared batch collection.
//!
//! Item lifecycle:
//!
//! ```text
//! Ready -> Reading -> Scoring -> Completed
//!                 \          \-> Failed
//!                  \-> Failed
//! ```
//!
//! `Completed` and `Failed` are terminal. A retry re-arms a non-completed item as a
//! fresh attempt (`attempt + 1`) rather than transitioning out of `Failed`.
//!
//! The item collection lives in a `tokio::sync::watch` channel. The orchestrator is
//! the only writer while a run is active; observers call [`BatchHandle::subscribe`]
//! and are woken on every mutation.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{watch, RwLock};
use uuid::Uuid;

use crate::scoring::resolver::JobDescription;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Ready,
    Reading,
    Scoring,
    Completed,
    Failed,
}

impl ItemStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Failed)
    }

    pub fn can_transition_to(self, next: ItemStatus) -> bool {
        use ItemStatus::*;
        matches!(
            (self, next),
            (Ready, Reading)
                | (Reading, Scoring)
                | (Reading, Failed)
                | (Scoring, Completed)
                | (Scoring, Failed)
        )
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum TransitionError {
    #[error("illegal transition {from:?} -> {to:?} for item {item_id}")]
    Illegal {
        item_id: Uuid,
        from: ItemStatus,
        to: ItemStatus,
    },

    #[error("completed item {0} cannot be retried")]
    AlreadyCompleted(Uuid),

    #[error("item {0} is no longer part of the batch")]
    MissingItem(Uuid),
}

/// Reference to an uploaded file spooled to local disk.
#[derive(Debug, Clone, Serialize)]
pub struct SourceHandle {
    pub name: String,
    pub size_bytes: u64,
    pub mime_type: String,
    #[serde(skip)]
    pub path: PathBuf,
}

impl SourceHandle {
    /// Size as shown next to a selected file, e.g. `"1.2 MB"`.
    pub fn display_size(&self) -> String {
        format!("{:.1} MB", self.size_bytes as f64 / (1024.0 * 1024.0))
    }

    /// Text before the first `.`; the whole name when that would be empty.
    pub fn file_stem(&self) -> &str {
        match self.name.split('.').next() {
            Some(stem) if !stem.is_empty() => stem,
            _ => &self.name,
        }
    }
}

/// Structured outcome attached to a completed item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemResult {
    pub candidate_id: Uuid,
    pub job_id: Uuid,
    pub candidate_name: String,
    pub role_guess: String,
    pub match_score: i64,
    pub analysis: Option<String>,
}

/// One resume submission within a batch.
///
/// Fields are private so every status change goes through a checked transition:
/// `result` is present iff the item is `Completed`, `error` iff it is `Failed`.
#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    id: Uuid,
    source: SourceHandle,
    display_size: String,
    status: ItemStatus,
    progress_hint: u8,
    attempt: u32,
    result: Option<ItemResult>,
    error: Option<String>,
}

impl BatchItem {
    pub fn new(source: SourceHandle) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_size: source.display_size(),
            source,
            status: ItemStatus::Ready,
            progress_hint: 0,
            attempt: 1,
            result: None,
            error: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source(&self) -> &SourceHandle {
        &self.source
    }

    pub fn status(&self) -> ItemStatus {
        self.status
    }

    pub fn progress_hint(&self) -> u8 {
        self.progress_hint
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn result(&self) -> Option<&ItemResult> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn begin_reading(&mut self) -> Result<(), TransitionError> {
        self.advance(ItemStatus::Reading)?;
        self.raise_progress(10);
        Ok(())
    }

    pub fn begin_scoring(&mut self) -> Result<(), TransitionError> {
        self.advance(ItemStatus::Scoring)?;
        self.raise_progress(30);
        Ok(())
    }

    pub fn complete(&mut self, result: ItemResult) -> Result<(), TransitionError> {
        self.advance(ItemStatus::Completed)?;
        self.raise_progress(100);
        self.result = Some(result);
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), TransitionError> {
        self.advance(ItemStatus::Failed)?;
        self.progress_hint = 0;
        self.error = Some(reason.into());
        Ok(())
    }

    /// Starts a fresh attempt for an item that did not complete.
    /// A `Ready` item that has not started yet is left as is.
    pub fn rearm(&mut self) -> Result<(), TransitionError> {
        match self.status {
            ItemStatus::Completed => Err(TransitionError::AlreadyCompleted(self.id)),
            ItemStatus::Ready => Ok(()),
            _ => {
                self.status = ItemStatus::Ready;
                self.progress_hint = 0;
                self.attempt += 1;
                self.error = None;
                Ok(())
            }
        }
    }

    fn advance(&mut self, next: ItemStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError::Illegal {
                item_id: self.id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    fn raise_progress(&mut self, hint: u8) {
        self.progress_hint = self.progress_hint.max(hint.min(100));
    }
}

#[derive(Debug, Error)]
#[error("batch {0} has a scoring run in progress")]
pub struct BatchBusy(pub Uuid);

struct BatchInner {
    id: Uuid,
    created_at: DateTime<Utc>,
    items: watch::Sender<Vec<BatchItem>>,
    running: AtomicBool,
    job: Mutex<Option<JobDescription>>,
}

/// Shared handle to one batch. Cheap to clone.
#[derive(Clone)]
pub struct BatchHandle {
    inner: Arc<BatchInner>,
}

impl BatchHandle {
    pub fn new(items: Vec<BatchItem>) -> Self {
        let (tx, _rx) = watch::channel(items);
        Self {
            inner: Arc::new(BatchInner {
                id: Uuid::new_v4(),
                created_at: Utc::now(),
                items: tx,
                running: AtomicBool::new(false),
                job: Mutex::new(None),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Read-only view that is notified on every mutation.
    pub fn subscribe(&self) -> watch::Receiver<Vec<BatchItem>> {
        self.inner.items.subscribe()
    }

    pub fn snapshot(&self) -> Vec<BatchItem> {
        self.inner.items.borrow().clone()
    }

    pub fn item(&self, id: Uuid) -> Option<BatchItem> {
        self.inner.items.borrow().iter().find(|i| i.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The job the batch was last scored against, once materialized.
    pub fn job(&self) -> Option<JobDescription> {
        self.inner.job.lock().map(|j| (*j).clone()).unwrap_or(None)
    }

    pub(crate) fn set_job(&self, job: JobDescription) {
        if let Ok(mut slot) = self.inner.job.lock() {
            *slot = Some(job);
        }
    }

    /// Claims the batch for a run. Returns `None` while another run holds it.
    pub fn try_begin_run(&self) -> Option<RunGuard> {
        self.inner
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard {
                batch: self.clone(),
            })
    }

    pub fn add_items(&self, items: Vec<BatchItem>) -> Result<(), BatchBusy> {
        self.ensure_idle()?;
        self.inner.items.send_modify(|all| all.extend(items));
        Ok(())
    }

    pub fn remove_item(&self, id: Uuid) -> Result<Option<BatchItem>, BatchBusy> {
        self.ensure_idle()?;
        let mut removed = None;
        self.inner.items.send_modify(|all| {
            if let Some(pos) = all.iter().position(|i| i.id == id) {
                removed = Some(all.remove(pos));
            }
        });
        Ok(removed)
    }

    /// Applies a checked transition to one item and notifies observers.
    pub(crate) fn transition(
        &self,
        id: Uuid,
        apply: impl FnOnce(&mut BatchItem) -> Result<(), TransitionError>,
    ) -> Result<(), TransitionError> {
        let mut outcome = Err(TransitionError::MissingItem(id));
        self.inner.items.send_modify(|all| {
            if let Some(item) = all.iter_mut().find(|i| i.id == id) {
                outcome = apply(item);
            }
        });
        outcome
    }

    fn ensure_idle(&self) -> Result<(), BatchBusy> {
        if self.is_running() {
            return Err(BatchBusy(self.id()));
        }
        Ok(())
    }
}

/// Held for the duration of a run; releases the batch on drop.
pub struct RunGuard {
    batch: BatchHandle,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.batch.inner.running.store(false, Ordering::Release);
        // Wake observers so they see the batch go idle.
        self.batch.inner.items.send_modify(|_| {});
    }
}

/// All batches known to this process, keyed by batch id.
#[derive(Clone, Default)]
pub struct BatchRegistry {
    batches: Arc<RwLock<HashMap<Uuid, BatchHandle>>>,
}

impl BatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, batch: BatchHandle) {
        self.batches.write().await.insert(batch.id(), batch);
    }

    pub async fn get(&self, id: Uuid) -> Option<BatchHandle> {
        self.batches.read().await.get(&id).cloned()
    }

    /// Drops a batch from the registry. Refused while the batch has a run in progress.
    pub async fn remove(&self, id: Uuid) -> Result<Option<BatchHandle>, BatchBusy> {
        let mut batches = self.batches.write().await;
        match batches.get(&id) {
            Some(batch) if batch.is_running() => Err(BatchBusy(id)),
            _ => Ok(batches.remove(&id)),
        }
    }
}
