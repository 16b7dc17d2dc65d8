//! Test doubles for the scoring pipeline: a scripted oracle and a store with
//! injectable write failures.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::candidate::{CandidateRow, NewCandidate};
use crate::models::job::{JobRow, NewJob};
use crate::scoring::batch::{BatchHandle, ItemStatus, SourceHandle};
use crate::scoring::encoder::EncodedContent;
use crate::scoring::oracle::{AnalysisOracle, OracleError, ScorePayload, ScoreRequest};
use crate::store::{MemoryStore, RecruitStore, StoreError};

/// Source handle pointing at a path that does not exist.
pub fn missing_source(name: &str) -> SourceHandle {
    SourceHandle {
        name: name.to_string(),
        size_bytes: 2048,
        mime_type: "application/pdf".to_string(),
        path: PathBuf::from(format!("/nonexistent/scorer-tests/{name}")),
    }
}

pub fn payload(name: &str, role: &str, score: f64, analysis: &str) -> ScorePayload {
    ScorePayload {
        candidate_name: Some(name.to_string()),
        current_role: Some(role.to_string()),
        match_score: Some(score),
        analysis: Some(analysis.to_string()),
    }
}

/// One observed `score_resume` call.
#[derive(Debug, Clone)]
pub struct ScoreCall {
    pub display_name: String,
    pub job_text: String,
    pub content: EncodedContent,
    /// Batch statuses at the moment of the call, when a batch is observed.
    pub statuses: Vec<ItemStatus>,
}

#[derive(Default)]
pub struct ScriptedOracle {
    scores: Mutex<HashMap<String, VecDeque<Result<ScorePayload, OracleError>>>>,
    extraction: Mutex<Option<Result<String, OracleError>>>,
    calls: Mutex<Vec<ScoreCall>>,
    observed: Mutex<Option<BatchHandle>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for the file with this display name.
    pub fn with_score(self, display_name: &str, response: Result<ScorePayload, OracleError>) -> Self {
        if let Ok(mut scores) = self.scores.lock() {
            scores
                .entry(display_name.to_string())
                .or_default()
                .push_back(response);
        }
        self
    }

    pub fn with_extraction(self, response: Result<String, OracleError>) -> Self {
        if let Ok(mut slot) = self.extraction.lock() {
            *slot = Some(response);
        }
        self
    }

    /// Records batch statuses on every scoring call.
    pub fn observe(&self, batch: &BatchHandle) {
        if let Ok(mut slot) = self.observed.lock() {
            *slot = Some(batch.clone());
        }
    }

    pub fn calls(&self) -> Vec<ScoreCall> {
        self.calls.lock().map(|c| (*c).clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AnalysisOracle for ScriptedOracle {
    async fn score_resume(&self, request: ScoreRequest<'_>) -> Result<ScorePayload, OracleError> {
        let statuses = self
            .observed
            .lock()
            .ok()
            .and_then(|p| (*p).clone())
            .map(|batch| batch.snapshot().iter().map(|i| i.status()).collect())
            .unwrap_or_default();

        if let Ok(mut calls) = self.calls.lock() {
            calls.push(ScoreCall {
                display_name: request.display_name.to_string(),
                job_text: request.job_text.to_string(),
                content: request.content.clone(),
                statuses,
            });
        }

        // Yield so the call is a real suspension point.
        tokio::task::yield_now().await;

        let scripted = match self.scores.lock() {
            Ok(mut scores) => scores
                .get_mut(request.display_name)
                .and_then(|queue| queue.pop_front()),
            Err(_) => None,
        };
        scripted.unwrap_or_else(|| Ok(payload("Default Candidate", "Engineer", 50.0, "Scripted")))
    }

    async fn extract_job_description(
        &self,
        _document: &EncodedContent,
    ) -> Result<String, OracleError> {
        self.extraction
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .unwrap_or(Err(OracleError::EmptyText))
    }
}

#[derive(Debug, Clone, Default)]
pub struct StoreFaults {
    pub fail_job_inserts: bool,
    /// Candidate inserts for this source file name fail.
    pub fail_candidate_for: Option<String>,
}

/// `MemoryStore` with injectable write failures.
pub struct TestStore {
    pub inner: MemoryStore,
    faults: StoreFaults,
}

impl TestStore {
    pub fn new(faults: StoreFaults) -> Self {
        Self {
            inner: MemoryStore::new(),
            faults,
        }
    }
}

#[async_trait]
impl RecruitStore for TestStore {
    async fn find_jobs(&self) -> Result<Vec<JobRow>, StoreError> {
        self.inner.find_jobs().await
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<JobRow>, StoreError> {
        self.inner.get_job(id).await
    }

    async fn insert_job(&self, job: NewJob) -> Result<JobRow, StoreError> {
        if self.faults.fail_job_inserts {
            return Err(StoreError::Unavailable("job insert refused".to_string()));
        }
        self.inner.insert_job(job).await
    }

    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<CandidateRow, StoreError> {
        if self.faults.fail_candidate_for.as_deref() == Some(candidate.source_file_name.as_str()) {
            return Err(StoreError::Unavailable(
                "candidate insert refused".to_string(),
            ));
        }
        self.inner.insert_candidate(candidate).await
    }

    async fn candidates_for_job(&self, job_id: Uuid) -> Result<Vec<CandidateRow>, StoreError> {
        self.inner.candidates_for_job(job_id).await
    }
}
