//! Job-Description Resolver: produces the text a batch is scored against and makes
//! sure a persisted job record exists for it.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::models::job::NewJob;
use crate::scoring::encoder::EncodedContent;
use crate::scoring::oracle::{bounded, AnalysisOracle, OracleError};
use crate::store::{RecruitStore, StoreError};

/// Upper bound on the heuristic title taken from free text.
pub const MAX_TITLE_CHARS: usize = 50;
const FALLBACK_TITLE: &str = "New Position";

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("job {0} not found")]
    JobNotFound(Uuid),

    #[error("job description extraction failed: {0}")]
    Extraction(#[source] OracleError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Where the job description comes from.
#[derive(Debug, Clone)]
pub enum JobSelection {
    Existing(Uuid),
    Manual(String),
    Document(EncodedContent),
}

/// The scoring target for a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobDescription {
    pub source_text: String,
    /// Persisted job record, or `None` for ad hoc text not yet materialized.
    pub origin: Option<Uuid>,
}

impl JobDescription {
    pub fn manual(text: impl Into<String>) -> Self {
        Self {
            source_text: text.into(),
            origin: None,
        }
    }

    pub fn has_text(&self) -> bool {
        !self.source_text.trim().is_empty()
    }
}

/// Resolves a selection into a job description. Either fully succeeds or returns an
/// error; nothing is persisted here.
pub async fn resolve_job(
    selection: JobSelection,
    store: &dyn RecruitStore,
    oracle: &dyn AnalysisOracle,
    oracle_timeout: Option<Duration>,
) -> Result<JobDescription, ResolveError> {
    match selection {
        JobSelection::Existing(id) => {
            let job = store
                .get_job(id)
                .await?
                .ok_or(ResolveError::JobNotFound(id))?;
            Ok(JobDescription {
                source_text: job.description,
                origin: Some(job.id),
            })
        }
        JobSelection::Manual(text) => Ok(JobDescription::manual(text)),
        JobSelection::Document(document) => {
            let text = bounded(oracle_timeout, oracle.extract_job_description(&document))
                .await
                .map_err(ResolveError::Extraction)?;
            if text.trim().is_empty() {
                return Err(ResolveError::Extraction(OracleError::EmptyText));
            }
            Ok(JobDescription::manual(text))
        }
    }
}

/// Persists a job record for ad hoc text. Jobs that already have an origin, or that
/// have no text, are returned unchanged.
pub async fn materialize_job(
    store: &dyn RecruitStore,
    job: JobDescription,
) -> Result<JobDescription, StoreError> {
    if job.origin.is_some() || !job.has_text() {
        return Ok(job);
    }

    let title = heuristic_title(&job.source_text);
    let row = store
        .insert_job(NewJob {
            id: Uuid::new_v4(),
            title,
            department: "General".to_string(),
            location: "Remote".to_string(),
            employment_type: "Full-time".to_string(),
            status: "Active".to_string(),
            description: job.source_text.clone(),
            skills: vec![],
        })
        .await?;

    info!("Materialized job {} ({:?})", row.id, row.title);

    Ok(JobDescription {
        source_text: job.source_text,
        origin: Some(row.id),
    })
}

/// First line of the text, trimmed and cut to `MAX_TITLE_CHARS` characters.
pub fn heuristic_title(text: &str) -> String {
    let first_line = text.trim_start().lines().next().unwrap_or("").trim();
    let title: String = first_line.chars().take(MAX_TITLE_CHARS).collect();
    let title = title.trim_end();
    if title.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        title.to_string()
    }
}
