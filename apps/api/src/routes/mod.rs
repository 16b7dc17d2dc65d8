pub mod health;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::scoring::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Jobs
        .route("/api/v1/jobs", get(handlers::handle_list_jobs))
        .route("/api/v1/jobs/extract", post(handlers::handle_extract_job))
        .route("/api/v1/jobs/:id", get(handlers::handle_get_job))
        // Scoring batches
        .route("/api/v1/batches", post(handlers::handle_create_batch))
        .route(
            "/api/v1/batches/:id",
            get(handlers::handle_get_batch).delete(handlers::handle_delete_batch),
        )
        .route("/api/v1/batches/:id/files", post(handlers::handle_add_files))
        .route(
            "/api/v1/batches/:id/files/:item_id",
            delete(handlers::handle_remove_file),
        )
        .route("/api/v1/batches/:id/run", post(handlers::handle_run_batch))
        .route(
            "/api/v1/batches/:id/results",
            get(handlers::handle_get_results),
        )
        .route(
            "/api/v1/batches/:id/events",
            get(handlers::handle_batch_events),
        )
        .with_state(state)
}
