//! Request handlers for the serving API

pub mod health;
pub mod metrics;
pub mod predict;

pub use health::health_router;
pub use metrics::metrics_router;
pub use predict::{method_not_allowed, not_found, predict_router};
