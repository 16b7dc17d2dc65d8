use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::candidate::{CandidateRow, NewCandidate};
use crate::models::job::{JobRow, NewJob};
use crate::store::{RecruitStore, StoreError};

/// PostgreSQL-backed store. Tables are created by the embedded migrations in `db`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecruitStore for PgStore {
    async fn find_jobs(&self) -> Result<Vec<JobRow>, StoreError> {
        Ok(
            sqlx::query_as::<_, JobRow>("SELECT * FROM jobs ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<JobRow>, StoreError> {
        Ok(
            sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn insert_job(&self, job: NewJob) -> Result<JobRow, StoreError> {
        Ok(sqlx::query_as::<_, JobRow>(
            r#"
            INSERT INTO jobs
                (id, title, department, location, employment_type, status, description, skills)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(job.id)
        .bind(&job.title)
        .bind(&job.department)
        .bind(&job.location)
        .bind(&job.employment_type)
        .bind(&job.status)
        .bind(&job.description)
        .bind(&job.skills)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<CandidateRow, StoreError> {
        Ok(sqlx::query_as::<_, CandidateRow>(
            r#"
            INSERT INTO candidates
                (id, name, role_guess, match_score, analysis_note, job_id,
                 resume_base64, resume_mime_type, source_file_name, pipeline_status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(candidate.id)
        .bind(&candidate.name)
        .bind(&candidate.role_guess)
        .bind(candidate.match_score)
        .bind(&candidate.analysis_note)
        .bind(candidate.job_id)
        .bind(&candidate.resume_base64)
        .bind(&candidate.resume_mime_type)
        .bind(&candidate.source_file_name)
        .bind(&candidate.pipeline_status)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn candidates_for_job(&self, job_id: Uuid) -> Result<Vec<CandidateRow>, StoreError> {
        Ok(sqlx::query_as::<_, CandidateRow>(
            "SELECT * FROM candidates WHERE job_id = $1 ORDER BY match_score DESC, created_at ASC",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?)
    }
}
