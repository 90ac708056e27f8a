//! Dense feed-forward network stored as a JSON artifact.
//!
//! ```json
//! { "layers": [ { "weights": [[...], ...], "bias": [...], "activation": "relu" },
//!               { "weights": [[...], ...], "bias": [...], "activation": "softmax" } ] }
//! ```
//!
//! `weights` is row-major with one row per output unit. The artifact is
//! validated completely at load time so the forward pass never sees a
//! malformed shape.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::classifier::{Classifier, InferError, LoadError, NUM_CLASSES};
use crate::preprocess::{TENSOR_LEN, Tensor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Identity,
    Relu,
    Softmax,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
    pub activation: Activation,
}

impl DenseLayer {
    /// Number of inputs this layer consumes.
    pub fn input_width(&self) -> usize {
        self.weights.first().map_or(0, Vec::len)
    }

    /// Number of outputs this layer produces.
    pub fn output_width(&self) -> usize {
        self.weights.len()
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        let mut out: Vec<f64> = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| {
                row.iter()
                    .zip(input)
                    .map(|(w, x)| f64::from(*w) * x)
                    .sum::<f64>()
                    + f64::from(*b)
            })
            .collect();

        match self.activation {
            Activation::Identity => {}
            Activation::Relu => out.iter_mut().for_each(|v| *v = v.max(0.0)),
            Activation::Softmax => softmax_in_place(&mut out),
        }
        out
    }
}

/// Model: stack of fully-connected layers, 784 inputs → 10 probabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseNetwork {
    layers: Vec<DenseLayer>,
}

impl DenseNetwork {
    /// Build and validate a network from layers.
    pub fn new(layers: Vec<DenseLayer>) -> Result<Self, String> {
        let network = Self { layers };
        network.validate()?;
        Ok(network)
    }

    /// Read and validate a JSON artifact.
    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        let corrupt = |reason: String| LoadError::Corrupt {
            path: path.to_path_buf(),
            reason,
        };

        let bytes = std::fs::read(path).map_err(|e| corrupt(format!("read failed: {e}")))?;
        let network: DenseNetwork = serde_json::from_slice(&bytes)
            .map_err(|e| corrupt(format!("deserialization failed: {e}")))?;
        network.validate().map_err(corrupt)?;
        Ok(network)
    }

    pub fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    fn validate(&self) -> Result<(), String> {
        let Some(last) = self.layers.last() else {
            return Err("network has no layers".to_string());
        };

        let mut expected_input = TENSOR_LEN;
        for (idx, layer) in self.layers.iter().enumerate() {
            if layer.output_width() == 0 {
                return Err(format!("layer {idx} has no output units"));
            }
            if layer.bias.len() != layer.output_width() {
                return Err(format!(
                    "layer {idx} has {} biases for {} units",
                    layer.bias.len(),
                    layer.output_width()
                ));
            }
            if layer.weights.iter().any(|row| row.len() != expected_input) {
                return Err(format!(
                    "layer {idx} rows must all have {expected_input} weights"
                ));
            }
            let all_finite = layer
                .weights
                .iter()
                .flatten()
                .chain(&layer.bias)
                .all(|v| v.is_finite());
            if !all_finite {
                return Err(format!("layer {idx} contains non-finite parameters"));
            }
            expected_input = layer.output_width();
        }

        if last.output_width() != NUM_CLASSES {
            return Err(format!(
                "final layer has {} outputs, expected {NUM_CLASSES}",
                last.output_width()
            ));
        }
        if last.activation != Activation::Softmax {
            return Err("final layer must use softmax activation".to_string());
        }
        Ok(())
    }
}

impl Classifier for DenseNetwork {
    fn classify(&self, tensor: &Tensor) -> Result<Vec<f64>, InferError> {
        let values = tensor.values();
        if values.len() != TENSOR_LEN {
            return Err(InferError::InputShape {
                expected: TENSOR_LEN,
                actual: values.len(),
            });
        }

        let mut activations: Vec<f64> = values.iter().map(|v| f64::from(*v)).collect();
        for layer in &self.layers {
            activations = layer.forward(&activations);
        }

        if activations.iter().any(|v| !v.is_finite()) {
            return Err(InferError::NonFinite);
        }
        Ok(activations)
    }

    fn describe(&self) -> String {
        let widths: Vec<String> = std::iter::once(TENSOR_LEN)
            .chain(self.layers.iter().map(DenseLayer::output_width))
            .map(|w| w.to_string())
            .collect();
        format!("dense network, {} layers ({})", self.layers.len(), widths.join("-"))
    }
}

fn softmax_in_place(values: &mut [f64]) {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for v in values.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    for v in values.iter_mut() {
        *v /= sum;
    }
}
