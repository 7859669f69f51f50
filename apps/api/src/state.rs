use std::sync::Arc;

use tokio::sync::Mutex;

use crate::llm_client::CompletionService;
use crate::pipeline::{PipelineConfig, RunControl};
use crate::tokens::TokenEstimator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub llm: Arc<dyn CompletionService>,
    pub estimator: Arc<dyn TokenEstimator>,
    pub pipeline: PipelineConfig,
    /// Held for the whole of a run; only one run may pace the service at a time.
    pub run_gate: Arc<Mutex<()>>,
    pub control: RunControl,
}

impl AppState {
    pub fn new(
        llm: Arc<dyn CompletionService>,
        estimator: Arc<dyn TokenEstimator>,
        pipeline: PipelineConfig,
    ) -> Self {
        Self {
            llm,
            estimator,
            pipeline,
            run_gate: Arc::new(Mutex::new(())),
            control: RunControl::new(),
        }
    }
}
