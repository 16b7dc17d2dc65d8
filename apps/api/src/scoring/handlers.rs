use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use chrono::{DateTime, Utc};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::candidate::CandidateRow;
use crate::models::job::JobRow;
use crate::scoring::batch::{BatchHandle, BatchItem};
use crate::scoring::encoder::EncodedContent;
use crate::scoring::intake::{intake, resolve_mime, spool_files, IncomingFile};
use crate::scoring::jd_format::{parse_sections, JdSection};
use crate::scoring::orchestrator::{preconditions_hold, release_spool};
use crate::scoring::projection::{project, RankOrder, ResultView};
use crate::scoring::resolver::{resolve_job, JobDescription, JobSelection};
use crate::state::AppState;

const FILES_FIELD: &str = "files";
const DOCUMENT_FIELD: &str = "document";
const HEARTBEAT: Duration = Duration::from_secs(15);

// ─── Jobs ───────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct JobDetailResponse {
    pub job: JobRow,
    pub sections: Vec<JdSection>,
    pub candidates: Vec<CandidateRow>,
}

#[derive(Serialize)]
pub struct ExtractResponse {
    pub text: String,
    pub sections: Vec<JdSection>,
}

/// GET /api/v1/jobs
pub async fn handle_list_jobs(
    State(state): State<AppState>,
) -> Result<Json<Vec<JobRow>>, AppError> {
    Ok(Json(state.store.find_jobs().await?))
}

/// GET /api/v1/jobs/:id
pub async fn handle_get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobDetailResponse>, AppError> {
    let job = state
        .store
        .get_job(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job {id} not found")))?;
    let candidates = state.store.candidates_for_job(id).await?;

    Ok(Json(JobDetailResponse {
        sections: parse_sections(&job.description),
        job,
        candidates,
    }))
}

/// POST /api/v1/jobs/extract
/// Nothing is persisted; the caller submits the text with a run.
pub async fn handle_extract_job(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ExtractResponse>, AppError> {
    let document = read_files(multipart, DOCUMENT_FIELD)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Validation(format!("missing '{DOCUMENT_FIELD}' field")))?;

    let content = EncodedContent::from_bytes(
        &document.bytes,
        &resolve_mime(&document.name, document.mime_type.as_deref()),
    );
    let job = resolve_job(
        JobSelection::Document(content),
        state.store.as_ref(),
        state.oracle.as_ref(),
        state.orchestrator.oracle_timeout(),
    )
    .await?;

    info!("Extracted job description from {}", document.name);

    Ok(Json(ExtractResponse {
        sections: parse_sections(&job.source_text),
        text: job.source_text,
    }))
}

// ─── Batches ────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct BatchResponse {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub running: bool,
    pub job: Option<JobDescription>,
    pub items: Vec<BatchItem>,
    pub results: ResultView,
}

impl BatchResponse {
    fn from_handle(batch: &BatchHandle) -> Self {
        let items = batch.snapshot();
        Self {
            id: batch.id(),
            created_at: batch.created_at(),
            running: batch.is_running(),
            job: batch.job(),
            results: project(&items, RankOrder::Submission),
            items,
        }
    }
}

#[derive(Deserialize)]
pub struct RunRequest {
    pub job_id: Option<Uuid>,
    pub jd_text: Option<String>,
}

#[derive(Serialize)]
pub struct RunAccepted {
    pub batch_id: Uuid,
    pub job: JobDescription,
}

#[derive(Deserialize)]
pub struct ResultsQuery {
    #[serde(default)]
    pub order: RankOrder,
}

/// POST /api/v1/batches
pub async fn handle_create_batch(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<BatchResponse>), AppError> {
    let files = read_files(multipart, FILES_FIELD).await?;
    let handles = spool_files(&state.config.upload_dir, files).await?;

    let batch = BatchHandle::new(intake(handles));
    state.batches.insert(batch.clone()).await;
    info!("Created batch {} with {} files", batch.id(), batch.len());

    Ok((StatusCode::CREATED, Json(BatchResponse::from_handle(&batch))))
}

/// GET /api/v1/batches/:id
pub async fn handle_get_batch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BatchResponse>, AppError> {
    let batch = find_batch(&state, id).await?;
    Ok(Json(BatchResponse::from_handle(&batch)))
}

/// POST /api/v1/batches/:id/files
pub async fn handle_add_files(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<BatchResponse>, AppError> {
    let batch = find_batch(&state, id).await?;
    if batch.is_running() {
        return Err(AppError::Conflict(format!(
            "batch {id} has a scoring run in progress"
        )));
    }

    let files = read_files(multipart, FILES_FIELD).await?;
    let handles = spool_files(&state.config.upload_dir, files).await?;
    batch.add_items(intake(handles))?;

    Ok(Json(BatchResponse::from_handle(&batch)))
}

/// DELETE /api/v1/batches/:id/files/:item_id
pub async fn handle_remove_file(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    let batch = find_batch(&state, id).await?;
    let removed = batch
        .remove_item(item_id)?
        .ok_or_else(|| AppError::NotFound(format!("Item {item_id} not found in batch {id}")))?;

    release_spool(removed.source()).await;

    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/batches/:id
/// Forgets the batch and deletes its remaining spooled files. Candidate records stay.
pub async fn handle_delete_batch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let batch = state
        .batches
        .remove(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Batch {id} not found")))?;

    for item in batch.snapshot() {
        release_spool(item.source()).await;
    }
    info!("Deleted batch {id}");

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/batches/:id/run
/// Resolves the job description, materializes it, and starts scoring in the
/// background. Progress is observed through the snapshot, results and events routes.
pub async fn handle_run_batch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<RunRequest>,
) -> Result<(StatusCode, Json<RunAccepted>), AppError> {
    let batch = find_batch(&state, id).await?;

    let selection = match (req.job_id, req.jd_text) {
        (Some(_), Some(_)) => {
            return Err(AppError::Validation(
                "provide either job_id or jd_text, not both".to_string(),
            ))
        }
        (Some(job_id), None) => JobSelection::Existing(job_id),
        (None, Some(text)) => JobSelection::Manual(text),
        (None, None) => {
            return Err(AppError::UnprocessableEntity(
                "a job description is required".to_string(),
            ))
        }
    };

    let job = resolve_job(
        selection,
        state.store.as_ref(),
        state.oracle.as_ref(),
        state.orchestrator.oracle_timeout(),
    )
    .await?;

    if !job.has_text() {
        return Err(AppError::UnprocessableEntity(
            "job description text is empty".to_string(),
        ));
    }
    if !preconditions_hold(&batch, &job) {
        return Err(AppError::UnprocessableEntity(format!(
            "batch {id} has no files to score"
        )));
    }

    let (job, _run) = state
        .orchestrator
        .clone()
        .spawn_batch(batch, job)
        .await?
        .ok_or_else(|| {
            AppError::UnprocessableEntity(format!("batch {id} has no files to score"))
        })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(RunAccepted { batch_id: id, job }),
    ))
}

/// GET /api/v1/batches/:id/results
pub async fn handle_get_results(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<ResultsQuery>,
) -> Result<Json<ResultView>, AppError> {
    let batch = find_batch(&state, id).await?;
    Ok(Json(project(&batch.snapshot(), params.order)))
}

#[derive(Serialize)]
struct BatchEvent {
    running: bool,
    results: ResultView,
}

/// GET /api/v1/batches/:id/events
/// Emits a `batch` event with the current projection, then one per mutation.
pub async fn handle_batch_events(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<ResultsQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let batch = find_batch(&state, id).await?;
    let mut rx = batch.subscribe();
    info!("SSE client subscribed to batch {id}");

    let stream = async_stream::stream! {
        loop {
            let results = project(&rx.borrow_and_update(), params.order);
            let event = BatchEvent {
                running: batch.is_running(),
                results,
            };
            match serde_json::to_string(&event) {
                Ok(json) => yield Ok(Event::default().event("batch").data(json)),
                Err(e) => warn!("SSE: failed to serialize batch {id}: {e}"),
            }

            if rx.changed().await.is_err() {
                debug!("SSE: batch {id} closed");
                break;
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(HEARTBEAT).text("heartbeat")))
}

// ─── Helpers ────────────────────────────────────────────────────────────────

async fn find_batch(state: &AppState, id: Uuid) -> Result<BatchHandle, AppError> {
    state
        .batches
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Batch {id} not found")))
}

/// Collects every file part named `field`, in order. Other parts are ignored.
async fn read_files(mut multipart: Multipart, field: &str) -> Result<Vec<IncomingFile>, AppError> {
    let mut files = Vec::new();
    while let Some(part) = multipart.next_field().await? {
        if part.name() != Some(field) {
            continue;
        }
        let name = part
            .file_name()
            .map(str::to_string)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("upload-{}", files.len() + 1));
        let mime_type = part.content_type().map(str::to_string);
        let bytes = part.bytes().await?;
        files.push(IncomingFile {
            name,
            mime_type,
            bytes,
        });
    }
    Ok(files)
}
