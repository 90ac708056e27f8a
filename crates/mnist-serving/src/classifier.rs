//! Classifier contract and the immutable handle shared by all workers.
//!
//! A [`ClassifierHandle`] can only be obtained from a successful load (or
//! from an already-built model), so "serving with an unloaded model" is not
//! a representable state. The model sits behind an `Arc` and is never
//! mutated after construction; readers need no locking.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info};

use crate::network::DenseNetwork;
use crate::preprocess::Tensor;

/// Number of output classes (digits 0-9).
pub const NUM_CLASSES: usize = 10;

/// Startup failure while loading the model artifact. Always fatal.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("model file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("model file {} is corrupt: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
}

/// Failure inside a forward pass.
#[derive(Debug, Error)]
pub enum InferError {
    #[error("input has {actual} values, model expects {expected}")]
    InputShape { expected: usize, actual: usize },

    #[error("model produced a non-finite activation")]
    NonFinite,
}

/// Opaque classification capability: tensor in, probability vector out.
///
/// Implementations must be reentrant; `classify` takes `&self` and is called
/// from many blocking-pool threads at once.
pub trait Classifier: Send + Sync {
    /// Return one probability per class, already softmax-normalized.
    fn classify(&self, tensor: &Tensor) -> Result<Vec<f64>, InferError>;

    /// Short human-readable description for logs and readiness output.
    fn describe(&self) -> String {
        "classifier".to_string()
    }
}

/// Safely published, read-only reference to the loaded model.
#[derive(Clone)]
pub struct ClassifierHandle {
    model: Arc<dyn Classifier>,
}

impl fmt::Debug for ClassifierHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifierHandle")
            .field("model", &self.model.describe())
            .finish()
    }
}

impl ClassifierHandle {
    /// Load a [`DenseNetwork`] artifact from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading model");

        if !path.is_file() {
            error!(path = %path.display(), "model file not found");
            return Err(LoadError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let network = DenseNetwork::from_file(path).inspect_err(|e| {
            error!(path = %path.display(), error = %e, "failed to load model");
        })?;

        let handle = Self::from_classifier(Arc::new(network));
        info!(model = %handle.describe(), "model loaded");
        Ok(handle)
    }

    /// Wrap an already-constructed model.
    pub fn from_classifier(model: Arc<dyn Classifier>) -> Self {
        Self { model }
    }

    pub fn infer(&self, tensor: &Tensor) -> Result<Vec<f64>, InferError> {
        self.model.classify(tensor)
    }

    pub fn describe(&self) -> String {
        self.model.describe()
    }
}
