use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub title: String,
    pub department: String,
    pub location: String,
    pub employment_type: String,
    pub status: String,
    pub description: String,
    pub skills: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a job record; the store assigns `created_at`.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub id: Uuid,
    pub title: String,
    pub department: String,
    pub location: String,
    pub employment_type: String,
    pub status: String,
    pub description: String,
    pub skills: Vec<String>,
}
