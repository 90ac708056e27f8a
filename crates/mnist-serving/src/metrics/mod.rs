//! Prediction metrics recorder.
//!
//! One [`PredictionMetrics`] is constructed at startup and shared by
//! reference with the orchestrator and the error boundary. Every field is an
//! atomic, so concurrent requests never serialize on a metrics lock and no
//! recording operation can fail.

mod exposition;
mod timer;

pub use exposition::{CONTENT_TYPE, render};
pub use timer::LatencyTimer;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::classifier::NUM_CLASSES;

/// Quantiles published for the latency timer.
pub const PUBLISHED_QUANTILES: [f64; 3] = [0.5, 0.95, 0.99];

/// Closed set of error-counter reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorReason {
    ProcessingFailure,
    UnexpectedFailure,
}

impl ErrorReason {
    pub const ALL: [ErrorReason; 2] = [Self::ProcessingFailure, Self::UnexpectedFailure];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProcessingFailure => "processing_failure",
            Self::UnexpectedFailure => "unexpected_failure",
        }
    }

    fn index(self) -> usize {
        match self {
            Self::ProcessingFailure => 0,
            Self::UnexpectedFailure => 1,
        }
    }
}

#[derive(Debug)]
pub struct PredictionMetrics {
    total_requests: AtomicU64,
    latency: LatencyTimer,
    class_distribution: [AtomicU64; NUM_CLASSES],
    errors: [AtomicU64; 2],
}

impl Default for PredictionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PredictionMetrics {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            latency: LatencyTimer::new(),
            class_distribution: std::array::from_fn(|_| AtomicU64::new(0)),
            errors: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    /// Count `n` submitted prediction items (attempts, not successes).
    pub fn increment_requests(&self, n: u64) {
        self.total_requests.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_latency(&self, duration: Duration) {
        self.latency.record(duration);
    }

    /// Labels outside `0..10` are ignored.
    pub fn increment_class_label(&self, label: u8) {
        if let Some(counter) = self.class_distribution.get(usize::from(label)) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn increment_error(&self, reason: ErrorReason) {
        self.errors[reason.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn latency(&self) -> &LatencyTimer {
        &self.latency
    }

    pub fn class_count(&self, label: u8) -> u64 {
        self.class_distribution
            .get(usize::from(label))
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    pub fn error_count(&self, reason: ErrorReason) -> u64 {
        self.errors[reason.index()].load(Ordering::Relaxed)
    }

    /// Point-in-time copy of every series.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests(),
            latency_count: self.latency.count(),
            latency_sum_seconds: self.latency.sum().as_secs_f64(),
            latency_quantiles: PUBLISHED_QUANTILES
                .iter()
                .map(|&q| (q, self.latency.quantile(q).map(|d| d.as_secs_f64())))
                .collect(),
            class_distribution: (0..NUM_CLASSES as u8)
                .map(|label| (label, self.class_count(label)))
                .collect(),
            errors: ErrorReason::ALL
                .iter()
                .map(|&reason| (reason.as_str(), self.error_count(reason)))
                .collect(),
        }
    }
}

/// Plain-data view of [`PredictionMetrics`] used for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub latency_count: u64,
    pub latency_sum_seconds: f64,
    pub latency_quantiles: Vec<(f64, Option<f64>)>,
    pub class_distribution: Vec<(u8, u64)>,
    pub errors: Vec<(&'static str, u64)>,
}
