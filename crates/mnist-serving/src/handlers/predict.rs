//! Prediction endpoints
//!
//! POST /api/v1/predict        - multipart field `image`, one file
//! POST /api/v1/predict-batch  - multipart field `images`, 1..=50 files

use std::sync::Arc;

use axum::{
    Json,
    extract::{
        OriginalUri, State,
        multipart::{Field, Multipart, MultipartError, MultipartRejection},
    },
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::PredictionResult;
use crate::error::{ServingError, ServingResult};
use crate::orchestrator::PredictionRequest;
use crate::state::AppState;

pub const SINGLE_FIELD: &str = "image";
pub const BATCH_FIELD: &str = "images";

/// Wire shape of one prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionResponse {
    #[serde(rename = "predictedDigit")]
    pub predicted_digit: u8,
}

impl From<&PredictionResult> for PredictionResponse {
    fn from(result: &PredictionResult) -> Self {
        Self {
            predicted_digit: result.predicted_label(),
        }
    }
}

/// POST /api/v1/predict
pub async fn predict(
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let outcome = async {
        let mut files = read_parts(multipart?, SINGLE_FIELD).await?;
        if files.is_empty() {
            return Err(missing_part(SINGLE_FIELD));
        }
        let request = files.swap_remove(0);
        state.orchestrator.predict_single(request).await
    }
    .await;

    match outcome {
        Ok(result) => Json(PredictionResponse::from(&result)).into_response(),
        Err(err) => state.boundary.respond(err, uri.path()),
    }
}

/// POST /api/v1/predict-batch
pub async fn predict_batch(
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let outcome = async {
        let files = read_parts(multipart?, BATCH_FIELD).await?;
        state.orchestrator.predict_batch(files).await
    }
    .await;

    match outcome {
        Ok(results) => {
            let body: Vec<PredictionResponse> =
                results.iter().map(PredictionResponse::from).collect();
            Json(body).into_response()
        }
        Err(err) => state.boundary.respond(err, uri.path()),
    }
}

/// Any unmatched route.
pub async fn not_found(
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
) -> Response {
    let path = uri.path().to_string();
    state
        .boundary
        .respond(ServingError::NotFound(path.clone()), &path)
}

/// Known route, unsupported method.
pub async fn method_not_allowed(
    State(state): State<Arc<AppState>>,
    method: Method,
    OriginalUri(uri): OriginalUri,
) -> Response {
    state
        .boundary
        .respond(ServingError::MethodNotAllowed(method.to_string()), uri.path())
}

pub fn predict_router() -> axum::Router<Arc<AppState>> {
    use axum::routing::post;
    axum::Router::new()
        .route("/api/v1/predict", post(predict))
        .route("/api/v1/predict-batch", post(predict_batch))
}

/// Collect every part named `name`, in submission order.
async fn read_parts(mut multipart: Multipart, name: &str) -> ServingResult<Vec<PredictionRequest>> {
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(from_multipart_error)? {
        if field.name() != Some(name) {
            debug!(part = ?field.name(), "ignoring unexpected multipart part");
            continue;
        }
        files.push(read_field(field).await?);
    }
    Ok(files)
}

async fn read_field(field: Field<'_>) -> ServingResult<PredictionRequest> {
    let content_type = field.content_type().map(str::to_string);
    let file_name = field.file_name().map(str::to_string);
    let content = field.bytes().await.map_err(from_multipart_error)?;

    let request = PredictionRequest::new(content, content_type);
    Ok(match file_name {
        Some(file_name) => request.with_file_name(file_name),
        None => request,
    })
}

fn missing_part(name: &str) -> ServingError {
    ServingError::InvalidInput(format!("Required request part '{name}' is not present."))
}

fn from_multipart_error(err: MultipartError) -> ServingError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServingError::PayloadTooLarge(err.body_text())
    } else {
        ServingError::InvalidInput(format!("Malformed multipart request: {}", err.body_text()))
    }
}

impl From<MultipartRejection> for ServingError {
    fn from(rejection: MultipartRejection) -> Self {
        ServingError::InvalidInput(format!(
            "Current request is not a multipart request: {}",
            rejection.body_text()
        ))
    }
}
