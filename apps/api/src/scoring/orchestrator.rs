//! Scoring Orchestrator: drives every batch item through its lifecycle.
//!
//! Flow per run: precondition guard → claim the batch → materialize the job (once) →
//! for each item in submission order: encode → oracle → persist candidate.
//!
//! Items run strictly one at a time. A read failure degrades to empty content; an
//! oracle or store failure marks only that item `Failed` and the loop moves on.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::candidate::NewCandidate;
use crate::scoring::batch::{
    BatchBusy, BatchHandle, ItemResult, ItemStatus, RunGuard, SourceHandle, TransitionError,
};
use crate::scoring::encoder::{encode, EncodedContent};
use crate::scoring::oracle::{bounded, AnalysisOracle, OracleError, ScoreRequest};
use crate::scoring::resolver::{materialize_job, JobDescription};
use crate::store::{RecruitStore, StoreError};

/// Status given to freshly scored candidates.
const NEW_CANDIDATE_STATUS: &str = "New";

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Busy(#[from] BatchBusy),

    #[error("failed to materialize job record: {0}")]
    Materialize(#[source] StoreError),
}

/// Why a single item ended up `Failed`.
#[derive(Debug, Error)]
pub enum ItemFailure {
    #[error("scoring failed: {0}")]
    Scoring(#[from] OracleError),

    #[error("saving candidate failed: {0}")]
    Persistence(#[from] StoreError),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Counts for one run. A no-op run (preconditions not met) is all zeros.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub completed: usize,
    pub failed: usize,
    /// Items already `Completed` before the run started.
    pub skipped: usize,
}

/// Whether a run over `batch` with `job` may start at all. Callers are expected to
/// check this before invoking a run; the run itself treats a violation as a no-op.
pub fn preconditions_hold(batch: &BatchHandle, job: &JobDescription) -> bool {
    job.has_text() && !batch.is_empty()
}

pub struct Orchestrator {
    oracle: Arc<dyn AnalysisOracle>,
    store: Arc<dyn RecruitStore>,
    oracle_timeout: Option<Duration>,
}

impl Orchestrator {
    pub fn new(
        oracle: Arc<dyn AnalysisOracle>,
        store: Arc<dyn RecruitStore>,
        oracle_timeout: Option<Duration>,
    ) -> Self {
        Self {
            oracle,
            store,
            oracle_timeout,
        }
    }

    pub fn oracle_timeout(&self) -> Option<Duration> {
        self.oracle_timeout
    }

    /// Runs the batch to completion. Per-item errors never escape; only a busy batch
    /// or a failed job materialization is returned, before any item is touched.
    pub async fn run_batch(
        &self,
        batch: &BatchHandle,
        job: JobDescription,
    ) -> Result<RunSummary, RunError> {
        let Some((guard, job)) = self.prepare(batch, job).await? else {
            return Ok(RunSummary::default());
        };
        Ok(self.process_items(guard, batch, &job).await)
    }

    /// Claims the batch and materializes the job, then runs the items on a spawned
    /// task. Errors are reported before the task starts. `Ok(None)` means the
    /// preconditions did not hold and nothing was started.
    pub async fn spawn_batch(
        self: Arc<Self>,
        batch: BatchHandle,
        job: JobDescription,
    ) -> Result<Option<(JobDescription, JoinHandle<RunSummary>)>, RunError> {
        let Some((guard, job)) = self.prepare(&batch, job).await? else {
            return Ok(None);
        };
        let resolved = job.clone();
        let handle = tokio::spawn(async move { self.process_items(guard, &batch, &job).await });
        Ok(Some((resolved, handle)))
    }

    async fn prepare(
        &self,
        batch: &BatchHandle,
        job: JobDescription,
    ) -> Result<Option<(RunGuard, JobDescription)>, RunError> {
        if !preconditions_hold(batch, &job) {
            warn!(
                "Batch {} not started: job description empty or no items",
                batch.id()
            );
            return Ok(None);
        }

        let guard = batch.try_begin_run().ok_or(BatchBusy(batch.id()))?;

        let has_pending = batch
            .snapshot()
            .iter()
            .any(|item| item.status() != ItemStatus::Completed);
        let job = if has_pending {
            let job = reuse_batch_job(batch, job);
            let job = materialize_job(self.store.as_ref(), job)
                .await
                .map_err(RunError::Materialize)?;
            batch.set_job(job.clone());
            job
        } else {
            job
        };

        Ok(Some((guard, job)))
    }

    async fn process_items(
        &self,
        _guard: RunGuard,
        batch: &BatchHandle,
        job: &JobDescription,
    ) -> RunSummary {
        let mut summary = RunSummary::default();
        let item_ids: Vec<Uuid> = batch.snapshot().iter().map(|item| item.id()).collect();

        info!(
            "Scoring batch {}: {} items against job {:?}",
            batch.id(),
            item_ids.len(),
            job.origin
        );

        for item_id in item_ids {
            match batch.item(item_id).map(|item| item.status()) {
                None => continue,
                Some(ItemStatus::Completed) => {
                    summary.skipped += 1;
                    continue;
                }
                Some(_) => {}
            }

            match self.process_item(batch, item_id, job).await {
                Ok(()) => summary.completed += 1,
                Err(failure) => {
                    warn!("Item {item_id} in batch {} failed: {failure}", batch.id());
                    if let Err(e) = batch.transition(item_id, |item| item.fail(failure.to_string())) {
                        warn!("Could not mark item {item_id} failed: {e}");
                    }
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Batch {} finished: completed={}, failed={}, skipped={}",
            batch.id(),
            summary.completed,
            summary.failed,
            summary.skipped
        );
        summary
    }

    async fn process_item(
        &self,
        batch: &BatchHandle,
        item_id: Uuid,
        job: &JobDescription,
    ) -> Result<(), ItemFailure> {
        batch.transition(item_id, |item| {
            item.rearm()?;
            item.begin_reading()
        })?;

        let source = batch
            .item(item_id)
            .map(|item| item.source().clone())
            .ok_or(TransitionError::MissingItem(item_id))?;

        let content = match encode(&source).await {
            Ok(content) => content,
            Err(e) => {
                warn!("Reading {} failed, scoring without content: {e}", source.name);
                EncodedContent::empty(&source.mime_type)
            }
        };

        batch.transition(item_id, |item| item.begin_scoring())?;

        let payload = bounded(
            self.oracle_timeout,
            self.oracle.score_resume(ScoreRequest {
                job_text: &job.source_text,
                display_name: &source.name,
                content: &content,
            }),
        )
        .await?;

        let stem = source.file_stem();
        let candidate = NewCandidate {
            id: Uuid::new_v4(),
            name: non_blank(payload.candidate_name.as_deref()).unwrap_or(stem).to_string(),
            role_guess: non_blank(payload.current_role.as_deref()).unwrap_or(stem).to_string(),
            match_score: payload.score(),
            analysis_note: non_blank(payload.analysis.as_deref()).map(str::to_string),
            // Materialization ran in `prepare`, so an origin is always present here.
            job_id: job.origin.unwrap_or_default(),
            resume_base64: content.data,
            resume_mime_type: content.mime_type,
            source_file_name: source.name.clone(),
            pipeline_status: NEW_CANDIDATE_STATUS.to_string(),
        };

        let row = self.store.insert_candidate(candidate).await?;

        batch.transition(item_id, |item| {
            item.complete(ItemResult {
                candidate_id: row.id,
                job_id: row.job_id,
                candidate_name: row.name,
                role_guess: row.role_guess,
                match_score: row.match_score,
                analysis: row.analysis_note,
            })
        })?;

        // The content now lives in the candidate record.
        release_spool(&source).await;
        Ok(())
    }
}

/// Ad hoc text the batch was already scored against keeps its materialized job.
fn reuse_batch_job(batch: &BatchHandle, job: JobDescription) -> JobDescription {
    if job.origin.is_some() {
        return job;
    }
    match batch.job() {
        Some(previous) if previous.origin.is_some() && previous.source_text == job.source_text => {
            previous
        }
        _ => job,
    }
}

/// Deletes a spooled upload. A file that is already gone is not an error.
pub async fn release_spool(source: &SourceHandle) {
    match tokio::fs::remove_file(&source.path).await {
        Ok(()) => debug!("Released spooled file {}", source.path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not delete spooled file {}: {e}", source.path.display()),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
