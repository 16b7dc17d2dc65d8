mod config;
mod db;
mod errors;
mod llm_client;
mod models;
mod routes;
mod scoring;
mod state;
mod store;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::scoring::oracle::LlmOracle;
use crate::state::AppState;
use crate::store::{MemoryStore, PgStore, RecruitStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Scorer API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize the candidate/job store
    let store: Arc<dyn RecruitStore> = match &config.database_url {
        Some(url) => Arc::new(PgStore::new(create_pool(url).await?)),
        None => {
            warn!("DATABASE_URL not set; using in-memory store, records are lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    // Initialize LLM client and the oracle on top of it
    let llm = LlmClient::new(config.anthropic_api_key.clone(), config.oracle_timeout);
    info!("LLM client initialized (model: {})", llm_client::MODEL);
    let oracle = Arc::new(LlmOracle::new(llm));

    match config.oracle_timeout {
        Some(t) => info!("Oracle calls time out after {t:?}"),
        None => info!("Oracle calls have no timeout"),
    }

    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("failed to create {}", config.upload_dir.display()))?;
    info!("Spooling uploads to {}", config.upload_dir.display());

    let state = AppState::new(store, oracle, config.clone());

    // Build router
    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()), // TODO: restrict allowed origins once the recruiter UI has a fixed host
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
