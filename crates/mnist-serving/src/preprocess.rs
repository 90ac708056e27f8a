//! Image preprocessing: raw upload bytes → normalized 28×28×1 tensor.

use image::imageops::FilterType;
use thiserror::Error;

/// Tensor height in pixels.
pub const HEIGHT: usize = 28;
/// Tensor width in pixels.
pub const WIDTH: usize = 28;
/// Number of colour channels (grayscale).
pub const CHANNELS: usize = 1;
/// Number of scalar values in one tensor.
pub const TENSOR_LEN: usize = HEIGHT * WIDTH * CHANNELS;

/// Errors raised while turning bytes into a tensor.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("bytes are not a readable image")]
    Unreadable(#[from] image::ImageError),

    #[error("decoded image has zero size ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
}

/// Fixed-shape single-channel image tensor, row-major, values in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    values: Vec<f32>,
}

impl Tensor {
    /// Build a tensor from exactly [`TENSOR_LEN`] values.
    ///
    /// Returns `None` when the length does not match the fixed shape.
    pub fn from_values(values: Vec<f32>) -> Option<Self> {
        (values.len() == TENSOR_LEN).then_some(Self { values })
    }

    /// Tensor with every value set to `value`.
    pub fn filled(value: f32) -> Self {
        Self {
            values: vec![value; TENSOR_LEN],
        }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn shape(&self) -> [usize; 3] {
        [HEIGHT, WIDTH, CHANNELS]
    }

    pub fn mean(&self) -> f32 {
        self.values.iter().sum::<f32>() / TENSOR_LEN as f32
    }
}

/// Stateless decode → grayscale → resize → scale pipeline.
///
/// Holds no mutable state, so a single instance is shared by every worker.
#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
    filter: FilterType,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self {
            filter: FilterType::Triangle,
        }
    }
}

impl Preprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `bytes` (format sniffed from content) into a normalized tensor.
    pub fn preprocess(&self, bytes: &[u8]) -> Result<Tensor, DecodeError> {
        let decoded = image::load_from_memory(bytes)?;
        if decoded.width() == 0 || decoded.height() == 0 {
            return Err(DecodeError::EmptyImage {
                width: decoded.width(),
                height: decoded.height(),
            });
        }

        let gray = decoded
            .resize_exact(WIDTH as u32, HEIGHT as u32, self.filter)
            .to_luma8();

        let values = gray
            .pixels()
            .map(|pixel| f32::from(pixel[0]) / 255.0)
            .collect();

        Ok(Tensor { values })
    }
}
