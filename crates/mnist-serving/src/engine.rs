//! Inference engine: preprocessing + classifier + result assembly.

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::classifier::{ClassifierHandle, InferError, NUM_CLASSES};
use crate::preprocess::{DecodeError, Preprocessor};

/// Allowed deviation of the score sum from 1.
pub const DISTRIBUTION_TOLERANCE: f64 = 1e-3;

/// Decoding or inference failed on otherwise well-formed input.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("preprocessing failed")]
    Decode(#[from] DecodeError),

    #[error("inference failed")]
    Inference(#[from] InferError),

    #[error("classifier returned {actual} scores, expected {NUM_CLASSES} finite values")]
    OutputShape { actual: usize },

    #[error("classifier scores are not a probability distribution (sum {sum})")]
    NotADistribution { sum: f64 },
}

/// One class and its probability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LabelProbability {
    pub label: u8,
    pub probability: f64,
}

/// Outcome of classifying one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    predicted_label: u8,
    /// Sorted by probability descending, ties by ascending label.
    probabilities: Vec<LabelProbability>,
}

impl PredictionResult {
    /// Build a result from a raw probability vector indexed by label.
    pub fn from_scores(scores: &[f64]) -> Result<Self, ProcessingError> {
        if scores.len() != NUM_CLASSES || scores.iter().any(|p| !p.is_finite()) {
            return Err(ProcessingError::OutputShape {
                actual: scores.len(),
            });
        }
        let sum: f64 = scores.iter().sum();
        if scores.iter().any(|p| *p < 0.0) || (sum - 1.0).abs() > DISTRIBUTION_TOLERANCE {
            return Err(ProcessingError::NotADistribution { sum });
        }

        let mut probabilities: Vec<LabelProbability> = scores
            .iter()
            .enumerate()
            .map(|(label, &probability)| LabelProbability {
                label: label as u8,
                probability,
            })
            .collect();

        // Stable sort keeps ascending label order among equal probabilities.
        probabilities.sort_by(|a, b| {
            b.probability
                .partial_cmp(&a.probability)
                .unwrap_or(Ordering::Equal)
        });

        // First entry is the argmax with the lowest label on ties.
        let predicted_label = probabilities[0].label;

        Ok(Self {
            predicted_label,
            probabilities,
        })
    }

    pub fn predicted_label(&self) -> u8 {
        self.predicted_label
    }

    pub fn probabilities(&self) -> &[LabelProbability] {
        &self.probabilities
    }

    pub fn probability_of(&self, label: u8) -> Option<f64> {
        self.probabilities
            .iter()
            .find(|entry| entry.label == label)
            .map(|entry| entry.probability)
    }

    pub fn top_k(&self, k: usize) -> &[LabelProbability] {
        &self.probabilities[..k.min(self.probabilities.len())]
    }
}

impl fmt::Display for PredictionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Predicted digit: {}", self.predicted_label)?;
        writeln!(f, "Top-5 distribution:")?;
        for entry in self.top_k(5) {
            writeln!(f, "  digit {}: {:>7.2}%", entry.label, entry.probability * 100.0)?;
        }
        Ok(())
    }
}

/// Composes the preprocessing pipeline and the loaded classifier.
#[derive(Debug, Clone)]
pub struct InferenceEngine {
    preprocessor: Preprocessor,
    classifier: ClassifierHandle,
}

impl InferenceEngine {
    pub fn new(preprocessor: Preprocessor, classifier: ClassifierHandle) -> Self {
        Self {
            preprocessor,
            classifier,
        }
    }

    /// Classify one encoded image. CPU-bound; call from a blocking context.
    pub fn predict_one(&self, bytes: &[u8]) -> Result<PredictionResult, ProcessingError> {
        let tensor = self.preprocessor.preprocess(bytes)?;
        let scores = self.classifier.infer(&tensor)?;
        PredictionResult::from_scores(&scores)
    }
}
