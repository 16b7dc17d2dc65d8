use std::sync::Arc;

use crate::config::Config;
use crate::scoring::batch::BatchRegistry;
use crate::scoring::oracle::AnalysisOracle;
use crate::scoring::orchestrator::Orchestrator;
use crate::store::RecruitStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecruitStore>,
    /// Pluggable analysis oracle. Default: `LlmOracle` over the Claude API.
    pub oracle: Arc<dyn AnalysisOracle>,
    pub orchestrator: Arc<Orchestrator>,
    /// Batches created by this process. Not persisted.
    pub batches: BatchRegistry,
    pub config: Config,
}

impl AppState {
    pub fn new(
        store: Arc<dyn RecruitStore>,
        oracle: Arc<dyn AnalysisOracle>,
        config: Config,
    ) -> Self {
        let orchestrator = Arc::new(Orchestrator::new(
            oracle.clone(),
            store.clone(),
            config.oracle_timeout,
        ));
        Self {
            store,
            oracle,
            orchestrator,
            batches: BatchRegistry::new(),
            config,
        }
    }
}
