use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CandidateRow {
    pub id: Uuid,
    pub name: String,
    pub role_guess: String,
    pub match_score: i64,
    pub analysis_note: Option<String>,
    pub job_id: Uuid,
    /// Base64 resume bytes; empty when the file could not be read.
    #[serde(skip_serializing)]
    pub resume_base64: String,
    pub resume_mime_type: String,
    pub source_file_name: String,
    pub pipeline_status: String,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a scored candidate. Written once, never updated by the pipeline.
#[derive(Debug, Clone)]
pub struct NewCandidate {
    pub id: Uuid,
    pub name: String,
    pub role_guess: String,
    pub match_score: i64,
    pub analysis_note: Option<String>,
    pub job_id: Uuid,
    pub resume_base64: String,
    pub resume_mime_type: String,
    pub source_file_name: String,
    pub pipeline_status: String,
}
