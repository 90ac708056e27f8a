//! Offline accuracy check over a labelled image directory.
//!
//! The directory holds one sub-directory per digit, named `0` to `9`, each
//! containing encoded images of that digit. Other entries are ignored.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::classifier::NUM_CLASSES;
use crate::engine::InferenceEngine;

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("failed to walk {}", dir.display())]
    Walk {
        dir: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("no labelled images found under {}", dir.display())]
    NoSamples { dir: PathBuf },
}

/// One image file and the digit its directory names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelledImage {
    pub path: PathBuf,
    pub label: u8,
}

/// Collect `<dir>/<digit>/*` files in a stable order.
pub fn discover(dir: &Path) -> Result<Vec<LabelledImage>, EvaluationError> {
    let mut samples = Vec::new();
    for entry in walkdir::WalkDir::new(dir)
        .min_depth(2)
        .max_depth(2)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|source| EvaluationError::Walk {
            dir: dir.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let label = entry
            .path()
            .parent()
            .and_then(Path::file_name)
            .and_then(|name| name.to_str())
            .and_then(|name| name.parse::<u8>().ok())
            .filter(|label| usize::from(*label) < NUM_CLASSES);
        if let Some(label) = label {
            samples.push(LabelledImage {
                path: entry.into_path(),
                label,
            });
        }
    }

    if samples.is_empty() {
        return Err(EvaluationError::NoSamples {
            dir: dir.to_path_buf(),
        });
    }
    Ok(samples)
}

/// Rows are actual labels, columns are predicted labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfusionMatrix {
    counts: [[u64; NUM_CLASSES]; NUM_CLASSES],
}

impl ConfusionMatrix {
    pub fn record(&mut self, actual: u8, predicted: u8) {
        let (a, p) = (usize::from(actual), usize::from(predicted));
        if a < NUM_CLASSES && p < NUM_CLASSES {
            self.counts[a][p] += 1;
        }
    }

    pub fn count(&self, actual: u8, predicted: u8) -> u64 {
        self.counts
            .get(usize::from(actual))
            .and_then(|row| row.get(usize::from(predicted)))
            .copied()
            .unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    pub fn correct(&self) -> u64 {
        (0..NUM_CLASSES).map(|i| self.counts[i][i]).sum()
    }

    pub fn accuracy(&self) -> Option<f64> {
        let total = self.total();
        (total > 0).then(|| self.correct() as f64 / total as f64)
    }

    /// `None` when the label was never predicted.
    pub fn precision(&self, label: u8) -> Option<f64> {
        let l = usize::from(label);
        let predicted: u64 = self.counts.iter().map(|row| row[l]).sum();
        (predicted > 0).then(|| self.counts[l][l] as f64 / predicted as f64)
    }

    /// `None` when the label never occurred.
    pub fn recall(&self, label: u8) -> Option<f64> {
        let l = usize::from(label);
        let actual: u64 = self.counts[l].iter().sum();
        (actual > 0).then(|| self.counts[l][l] as f64 / actual as f64)
    }

    fn macro_average(&self, metric: impl Fn(u8) -> Option<f64>) -> Option<f64> {
        let values: Vec<f64> = (0..NUM_CLASSES as u8).filter_map(metric).collect();
        (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub matrix: ConfusionMatrix,
    /// Files that could not be read or classified.
    pub failures: Vec<PathBuf>,
}

/// Classify every sample. CPU-bound; call from a blocking context.
pub fn evaluate(engine: &InferenceEngine, samples: &[LabelledImage]) -> Evaluation {
    let mut evaluation = Evaluation::default();
    for sample in samples {
        let outcome = std::fs::read(&sample.path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| engine.predict_one(&bytes).map_err(|e| e.to_string()));
        match outcome {
            Ok(result) => evaluation
                .matrix
                .record(sample.label, result.predicted_label()),
            Err(reason) => {
                warn!(path = %sample.path.display(), reason = %reason, "skipping sample");
                evaluation.failures.push(sample.path.clone());
            }
        }
    }
    info!(
        evaluated = evaluation.matrix.total(),
        failed = evaluation.failures.len(),
        "evaluation finished"
    );
    evaluation
}

fn ratio(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.4}"))
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.matrix;
        writeln!(f, "Examples evaluated: {} ({} failed)", m.total(), self.failures.len())?;
        writeln!(f, "Accuracy:        {}", ratio(m.accuracy()))?;
        writeln!(f, "Macro precision: {}", ratio(m.macro_average(|l| m.precision(l))))?;
        writeln!(f, "Macro recall:    {}", ratio(m.macro_average(|l| m.recall(l))))?;
        writeln!(f)?;
        writeln!(f, "Confusion matrix (rows: actual, columns: predicted)")?;
        write!(f, "     ")?;
        for predicted in 0..NUM_CLASSES {
            write!(f, "{predicted:>6}")?;
        }
        writeln!(f)?;
        for (actual, row) in m.counts.iter().enumerate() {
            write!(f, "{actual:>3} |")?;
            for count in row {
                write!(f, "{count:>6}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
