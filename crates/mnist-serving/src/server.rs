//! Axum-based HTTP serving server.
//!
//! [`ServingServer`] loads the model, wires the engine, orchestrator,
//! metrics and error boundary into shared state, and serves the router.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/v1/predict` | Classify one image (`image` part). |
//! | `POST` | `/api/v1/predict-batch` | Classify up to 50 images (`images` parts). |
//! | `GET`  | `/metrics` | Prometheus text exposition. |
//! | `GET`  | `/health` | Liveness check. |
//! | `GET`  | `/ready` | Readiness check with the model description. |

use std::sync::Arc;

use axum::{Router, extract::DefaultBodyLimit};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::classifier::ClassifierHandle;
use crate::config::ServingConfig;
use crate::engine::InferenceEngine;
use crate::error::ServeError;
use crate::handlers::{
    health_router, method_not_allowed, metrics_router, not_found, predict_router,
};
use crate::metrics::PredictionMetrics;
use crate::orchestrator::PredictionOrchestrator;
use crate::preprocess::Preprocessor;
use crate::state::AppState;

pub struct ServingServer {
    config: ServingConfig,
    state: Arc<AppState>,
}

impl ServingServer {
    /// Load the configured model and build the shared state.
    ///
    /// Fails before any router exists if the artifact is missing or corrupt.
    pub fn bootstrap(config: ServingConfig) -> Result<Self, ServeError> {
        config.validate()?;
        let classifier = ClassifierHandle::load(&config.model_path)?;
        Ok(Self::with_classifier(config, classifier))
    }

    /// Build around an already-loaded classifier.
    pub fn with_classifier(config: ServingConfig, classifier: ClassifierHandle) -> Self {
        let model_description = classifier.describe();
        let metrics = Arc::new(PredictionMetrics::new());
        let engine = Arc::new(InferenceEngine::new(Preprocessor::new(), classifier));
        let orchestrator = Arc::new(PredictionOrchestrator::new(
            engine,
            Arc::clone(&metrics),
            config.batch_policy(),
        ));
        let state = Arc::new(AppState::new(orchestrator, metrics, model_description));
        Self { config, state }
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    pub fn build_app(&self) -> Router {
        Router::new()
            .merge(predict_router())
            .merge(metrics_router())
            .merge(health_router())
            .method_not_allowed_fallback(method_not_allowed)
            .fallback(not_found)
            .layer(DefaultBodyLimit::max(self.config.max_upload_bytes))
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::clone(&self.state))
    }

    /// Bind to the configured address and serve until Ctrl-C.
    pub async fn start(self) -> Result<(), ServeError> {
        let app = self.build_app();
        let addr = self.config.bind_address();
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!(
            addr = %addr,
            model = %self.state.model_description,
            max_batch_size = self.config.max_batch_size,
            "digit classifier service listening"
        );
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        info!("server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
