//! HTTP inference service for a handwritten-digit classifier.
//!
//! | Layer | Module |
//! |-------|--------|
//! | Model artifact and trait seam | [`classifier`], [`network`] |
//! | Image decoding to a 1x28x28 tensor | [`preprocess`] |
//! | Preprocess + classify + rank | [`engine`] |
//! | Accuracy over a labelled directory | [`evaluation`] |
//! | Validation, batch fan-out, metrics | [`orchestrator`] |
//! | Counters and latency histogram | [`metrics`] |
//! | Error taxonomy and HTTP mapping | [`error`] |
//! | Axum wiring | [`server`], [`handlers`] |
//!
//! # Quick start
//!
//! ```rust,no_run
//! use mnist_serving::config::ServingConfig;
//! use mnist_serving::server::ServingServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServingConfig::load(None)?;
//!     ServingServer::bootstrap(config)?.start().await?;
//!     Ok(())
//! }
//! ```

pub mod classifier;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluation;
pub mod handlers;
pub mod metrics;
pub mod network;
pub mod orchestrator;
pub mod preprocess;
pub mod server;
pub mod state;
pub mod telemetry;

pub use classifier::{Classifier, ClassifierHandle};
pub use engine::{InferenceEngine, PredictionResult};
pub use error::{ServeError, ServingError};
pub use orchestrator::{BatchPolicy, PredictionOrchestrator, PredictionRequest};
pub use server::ServingServer;
