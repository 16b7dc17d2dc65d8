//! Persistent store for job and candidate records.
//!
//! The pipeline only needs simple CRUD, so the store is a trait carried in
//! `AppState` as `Arc<dyn RecruitStore>`. `PgStore` is the production back-end;
//! `MemoryStore` backs local runs without `DATABASE_URL` and the test suite.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::candidate::{CandidateRow, NewCandidate};
use crate::models::job::{JobRow, NewJob};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait RecruitStore: Send + Sync {
    /// All job records, newest first.
    async fn find_jobs(&self) -> Result<Vec<JobRow>, StoreError>;

    async fn get_job(&self, id: Uuid) -> Result<Option<JobRow>, StoreError>;

    async fn insert_job(&self, job: NewJob) -> Result<JobRow, StoreError>;

    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<CandidateRow, StoreError>;

    /// Candidates scored against a job, highest score first.
    async fn candidates_for_job(&self, job_id: Uuid) -> Result<Vec<CandidateRow>, StoreError>;
}
