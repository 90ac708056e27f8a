//! Shared application state for the HTTP handlers

use std::sync::Arc;

use crate::error::ErrorBoundary;
use crate::metrics::PredictionMetrics;
use crate::orchestrator::PredictionOrchestrator;

/// State shared across all request handlers
pub struct AppState {
    pub orchestrator: Arc<PredictionOrchestrator>,
    pub metrics: Arc<PredictionMetrics>,
    pub boundary: ErrorBoundary,
    /// Reported by the readiness probe.
    pub model_description: String,
}

impl AppState {
    pub fn new(
        orchestrator: Arc<PredictionOrchestrator>,
        metrics: Arc<PredictionMetrics>,
        model_description: String,
    ) -> Self {
        Self {
            orchestrator,
            boundary: ErrorBoundary::new(Arc::clone(&metrics)),
            metrics,
            model_description,
        }
    }
}
