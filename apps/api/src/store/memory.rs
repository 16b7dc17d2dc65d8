use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::candidate::{CandidateRow, NewCandidate};
use crate::models::job::{JobRow, NewJob};
use crate::store::{RecruitStore, StoreError};

/// Process-local store. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    jobs: RwLock<Vec<JobRow>>,
    candidates: RwLock<Vec<CandidateRow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn job_count(&self) -> usize {
        self.jobs.read().await.len()
    }

    #[cfg(test)]
    pub async fn all_candidates(&self) -> Vec<CandidateRow> {
        self.candidates.read().await.clone()
    }
}

#[async_trait]
impl RecruitStore for MemoryStore {
    async fn find_jobs(&self) -> Result<Vec<JobRow>, StoreError> {
        let mut jobs = self.jobs.read().await.clone();
        jobs.reverse();
        Ok(jobs)
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<JobRow>, StoreError> {
        Ok(self.jobs.read().await.iter().find(|j| j.id == id).cloned())
    }

    async fn insert_job(&self, job: NewJob) -> Result<JobRow, StoreError> {
        let row = JobRow {
            id: job.id,
            title: job.title,
            department: job.department,
            location: job.location,
            employment_type: job.employment_type,
            status: job.status,
            description: job.description,
            skills: job.skills,
            created_at: Utc::now(),
        };
        self.jobs.write().await.push(row.clone());
        Ok(row)
    }

    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<CandidateRow, StoreError> {
        let row = CandidateRow {
            id: candidate.id,
            name: candidate.name,
            role_guess: candidate.role_guess,
            match_score: candidate.match_score,
            analysis_note: candidate.analysis_note,
            job_id: candidate.job_id,
            resume_base64: candidate.resume_base64,
            resume_mime_type: candidate.resume_mime_type,
            source_file_name: candidate.source_file_name,
            pipeline_status: candidate.pipeline_status,
            created_at: Utc::now(),
        };
        self.candidates.write().await.push(row.clone());
        Ok(row)
    }

    async fn candidates_for_job(&self, job_id: Uuid) -> Result<Vec<CandidateRow>, StoreError> {
        let mut rows: Vec<CandidateRow> = self
            .candidates
            .read()
            .await
            .iter()
            .filter(|c| c.job_id == job_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order among equal scores.
        rows.sort_by(|a, b| b.match_score.cmp(&a.match_score));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_job(title: &str) -> NewJob {
        NewJob {
            id: Uuid::new_v4(),
            title: title.to_string(),
            department: "General".to_string(),
            location: "Remote".to_string(),
            employment_type: "Full-time".to_string(),
            status: "Active".to_string(),
            description: format!("{title}\nDetails"),
            skills: vec![],
        }
    }

    fn new_candidate(job_id: Uuid, name: &str, score: i64) -> NewCandidate {
        NewCandidate {
            id: Uuid::new_v4(),
            name: name.to_string(),
            role_guess: "Engineer".to_string(),
            match_score: score,
            analysis_note: None,
            job_id,
            resume_base64: String::new(),
            resume_mime_type: "application/pdf".to_string(),
            source_file_name: format!("{name}.pdf"),
            pipeline_status: "New".to_string(),
        }
    }

    #[tokio::test]
    async fn test_find_jobs_returns_newest_first() {
        let store = MemoryStore::new();
        store.insert_job(new_job("First")).await.unwrap();
        store.insert_job(new_job("Second")).await.unwrap();

        let jobs = store.find_jobs().await.unwrap();
        assert_eq!(jobs[0].title, "Second");
        assert_eq!(jobs[1].title, "First");
    }

    #[tokio::test]
    async fn test_get_job_by_id() {
        let store = MemoryStore::new();
        let job = store.insert_job(new_job("Backend")).await.unwrap();

        assert_eq!(store.get_job(job.id).await.unwrap().unwrap().title, "Backend");
        assert!(store.get_job(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_candidates_for_job_sorted_by_score() {
        let store = MemoryStore::new();
        let job = store.insert_job(new_job("Backend")).await.unwrap();
        let other = store.insert_job(new_job("Frontend")).await.unwrap();

        store.insert_candidate(new_candidate(job.id, "low", 40)).await.unwrap();
        store.insert_candidate(new_candidate(job.id, "high", 90)).await.unwrap();
        store.insert_candidate(new_candidate(other.id, "elsewhere", 99)).await.unwrap();

        let rows = store.candidates_for_job(job.id).await.unwrap();
        let names: Vec<_> = rows.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["high", "low"]);
    }
}
