//! Prediction orchestration: validation, single prediction, batch fan-out.
//!
//! Batches are processed as index-tagged tasks on a bounded worker pool.
//! Each task writes into its own output slot, so the response preserves
//! submission order whatever order the tasks finish in. The first failing
//! item aborts the whole batch; there is no partial-success payload.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::engine::{InferenceEngine, PredictionResult};
use crate::error::{ServingError, ServingResult};
use crate::metrics::PredictionMetrics;

pub const DEFAULT_MAX_BATCH_SIZE: usize = 50;

/// One uploaded image.
#[derive(Debug, Clone)]
pub struct PredictionRequest {
    content: Bytes,
    content_type: Option<String>,
    file_name: Option<String>,
}

impl PredictionRequest {
    pub fn new(content: impl Into<Bytes>, content_type: Option<String>) -> Self {
        Self {
            content: content.into(),
            content_type,
            file_name: None,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn display_name(&self) -> &str {
        self.file_name.as_deref().unwrap_or("<unnamed>")
    }

    /// Content must be non-empty and declared as `image/*`.
    pub fn validate(&self) -> ServingResult<()> {
        if self.content.is_empty() {
            return Err(ServingError::InvalidInput(
                "Image file is missing or empty.".to_string(),
            ));
        }
        match self.content_type.as_deref() {
            Some(ct) if ct.starts_with("image/") => Ok(()),
            other => Err(ServingError::InvalidInput(format!(
                "Invalid file type '{}': an image is required.",
                other.unwrap_or("unknown")
            ))),
        }
    }
}

/// Limits applied to batch calls.
#[derive(Debug, Clone, Copy)]
pub struct BatchPolicy {
    pub max_batch_size: usize,
    /// Items of all concurrent batches in flight at once.
    pub max_parallelism: usize,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_parallelism: std::thread::available_parallelism().map_or(4, |n| n.get()),
        }
    }
}

impl BatchPolicy {
    pub fn validate(&self, len: usize) -> ServingResult<()> {
        if len == 0 {
            return Err(ServingError::InvalidInput(
                "No files provided for batch processing.".to_string(),
            ));
        }
        if len > self.max_batch_size {
            warn!(
                received = len,
                limit = self.max_batch_size,
                "batch size limit exceeded"
            );
            return Err(ServingError::InvalidInput(format!(
                "Maximum batch size is {} images.",
                self.max_batch_size
            )));
        }
        Ok(())
    }
}

pub struct PredictionOrchestrator {
    engine: Arc<InferenceEngine>,
    metrics: Arc<PredictionMetrics>,
    policy: BatchPolicy,
    workers: Arc<Semaphore>,
}

impl PredictionOrchestrator {
    pub fn new(
        engine: Arc<InferenceEngine>,
        metrics: Arc<PredictionMetrics>,
        policy: BatchPolicy,
    ) -> Self {
        let workers = Arc::new(Semaphore::new(policy.max_parallelism.max(1)));
        Self {
            engine,
            metrics,
            policy,
            workers,
        }
    }

    /// Classify one image.
    ///
    /// The request counter is bumped before validation; the latency sample
    /// only covers requests that reached the engine.
    pub async fn predict_single(&self, request: PredictionRequest) -> ServingResult<PredictionResult> {
        self.metrics.increment_requests(1);
        request.validate()?;

        info!(
            file = request.display_name(),
            bytes = request.content().len(),
            "single prediction requested"
        );

        let started = Instant::now();
        let outcome = run_inference(Arc::clone(&self.engine), request.content().clone()).await;
        self.metrics.record_latency(started.elapsed());

        let result = outcome?;
        self.metrics.increment_class_label(result.predicted_label());
        info!(
            file = request.display_name(),
            digit = result.predicted_label(),
            "prediction completed"
        );
        Ok(result)
    }

    /// Classify a batch; `output[i]` belongs to `requests[i]`.
    pub async fn predict_batch(
        &self,
        requests: Vec<PredictionRequest>,
    ) -> ServingResult<Vec<PredictionResult>> {
        self.metrics.increment_requests(requests.len() as u64);
        self.policy.validate(requests.len())?;
        for request in &requests {
            request.validate()?;
        }

        info!(batch_size = requests.len(), "batch prediction requested");

        let started = Instant::now();
        let outcome = self.fan_out(requests).await;
        self.metrics.record_latency(started.elapsed());

        let results = outcome?;
        for result in &results {
            self.metrics.increment_class_label(result.predicted_label());
        }
        info!(batch_size = results.len(), "batch prediction completed");
        Ok(results)
    }

    async fn fan_out(&self, requests: Vec<PredictionRequest>) -> ServingResult<Vec<PredictionResult>> {
        let total = requests.len();
        let mut tasks = JoinSet::new();

        for (index, request) in requests.into_iter().enumerate() {
            let engine = Arc::clone(&self.engine);
            let workers = Arc::clone(&self.workers);
            tasks.spawn(async move {
                let outcome = match workers.acquire_owned().await {
                    Ok(_permit) => run_inference(engine, request.content().clone()).await,
                    Err(_) => Err(ServingError::Unexpected(
                        "batch worker pool is closed".to_string(),
                    )),
                };
                (index, request.file_name, outcome)
            });
        }

        let mut slots: Vec<Option<PredictionResult>> = (0..total).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            let (index, file_name, outcome) = joined
                .map_err(|e| ServingError::Unexpected(format!("batch task failed: {e}")))?;
            match outcome {
                Ok(result) => {
                    debug!(index, digit = result.predicted_label(), "batch item classified");
                    slots[index] = Some(result);
                }
                Err(err) => {
                    warn!(
                        index,
                        file = file_name.as_deref().unwrap_or("<unnamed>"),
                        "batch item failed, aborting remaining items"
                    );
                    tasks.abort_all();
                    return Err(err);
                }
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| {
                    ServingError::Unexpected(format!("batch item {index} produced no result"))
                })
            })
            .collect()
    }
}

/// Run the CPU-bound engine on the blocking pool.
async fn run_inference(engine: Arc<InferenceEngine>, content: Bytes) -> ServingResult<PredictionResult> {
    tokio::task::spawn_blocking(move || engine.predict_one(&content))
        .await
        .map_err(|e| ServingError::Unexpected(format!("inference task failed: {e}")))?
        .map_err(ServingError::from)
}
