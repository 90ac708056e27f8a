//! Error taxonomy and the HTTP error boundary.
//!
//! Orchestrator and handlers return [`ServingError`]. The
//! [`ErrorBoundary`] maps each kind to a status code and a client-safe
//! message through one explicit table ([`ErrorBoundary::classify`]), logs
//! it, bumps the error counter for server faults, and produces an
//! [`ApiError`] body.

use std::sync::Arc;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::classifier::LoadError;
use crate::engine::ProcessingError;
use crate::metrics::{ErrorReason, PredictionMetrics};

/// Failures visible to API clients.
#[derive(Debug, Error)]
pub enum ServingError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("processing failed")]
    Processing(#[from] ProcessingError),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

pub type ServingResult<T> = Result<T, ServingError>;

/// Process-level failures while bootstrapping the service.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("model could not be loaded")]
    Load(#[from] LoadError),

    #[error("configuration error")]
    Config(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

/// Uniform error payload returned for every failed request.
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub timestamp: DateTime<Utc>,
    pub status: u16,
    pub error: String,
    pub message: String,
    pub path: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// Result of the classification table for one error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub status: StatusCode,
    pub message: String,
    /// Counter bumped for server-side faults.
    pub reason: Option<ErrorReason>,
}

impl Classification {
    pub fn is_server_fault(&self) -> bool {
        self.status.is_server_error()
    }
}

const PROCESSING_MESSAGE: &str = "Error while processing the request with the model.";
const UNEXPECTED_MESSAGE: &str = "An unexpected internal server error occurred.";
const TOO_LARGE_MESSAGE: &str = "File size exceeds the configured limit.";
const NOT_FOUND_MESSAGE: &str = "The requested resource was not found.";

#[derive(Debug, Clone)]
pub struct ErrorBoundary {
    metrics: Arc<PredictionMetrics>,
}

impl ErrorBoundary {
    pub fn new(metrics: Arc<PredictionMetrics>) -> Self {
        Self { metrics }
    }

    /// Map an error kind to its status, client message and counter reason.
    pub fn classify(err: &ServingError) -> Classification {
        let (status, message, reason) = match err {
            ServingError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            ServingError::PayloadTooLarge(_) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                TOO_LARGE_MESSAGE.to_string(),
                None,
            ),
            ServingError::NotFound(_) => {
                (StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE.to_string(), None)
            }
            ServingError::MethodNotAllowed(method) => (
                StatusCode::METHOD_NOT_ALLOWED,
                format!("Request method '{method}' is not supported."),
                None,
            ),
            ServingError::Processing(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                PROCESSING_MESSAGE.to_string(),
                Some(ErrorReason::ProcessingFailure),
            ),
            ServingError::Unexpected(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                UNEXPECTED_MESSAGE.to_string(),
                Some(ErrorReason::UnexpectedFailure),
            ),
        };
        Classification {
            status,
            message,
            reason,
        }
    }

    /// Classify, log, count and render `err` for a request to `path`.
    pub fn handle(&self, err: ServingError, path: &str) -> ApiError {
        let classification = Self::classify(&err);

        if let Some(reason) = classification.reason {
            self.metrics.increment_error(reason);
        }

        if classification.is_server_fault() {
            error!(
                path = %path,
                status = classification.status.as_u16(),
                client_message = %classification.message,
                cause = %error_chain(&err),
                "request failed with server error"
            );
        } else {
            warn!(
                path = %path,
                status = classification.status.as_u16(),
                client_message = %classification.message,
                detail = %err,
                "request rejected"
            );
        }

        ApiError {
            timestamp: Utc::now(),
            status: classification.status.as_u16(),
            error: classification
                .status
                .canonical_reason()
                .unwrap_or("Unknown")
                .to_string(),
            message: classification.message,
            path: path.to_string(),
        }
    }

    pub fn respond(&self, err: ServingError, path: &str) -> Response {
        self.handle(err, path).into_response()
    }
}

/// `err: source: source...` rendered on one line.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
