#![allow(dead_code)]

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, header};
use axum::response::Response;
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use mnist_serving::classifier::{Classifier, ClassifierHandle, InferError, NUM_CLASSES};
use mnist_serving::config::ServingConfig;
use mnist_serving::preprocess::{TENSOR_LEN, Tensor};
use mnist_serving::server::ServingServer;
use mnist_serving::state::AppState;
use rand::Rng;
use tower::ServiceExt;

pub const BOUNDARY: &str = "mnist-serving-test-boundary";

/// Predicts `round(mean * 9)`: a uniform image of level `v` maps to digit
/// `round(v / 255 * 9)`.
#[derive(Default)]
pub struct IntensityClassifier {
    pub calls: AtomicUsize,
    pub jitter: bool,
}

impl IntensityClassifier {
    pub fn with_jitter() -> Self {
        Self {
            jitter: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Classifier for IntensityClassifier {
    fn classify(&self, tensor: &Tensor) -> Result<Vec<f64>, InferError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.jitter {
            let millis = rand::thread_rng().gen_range(0..15);
            std::thread::sleep(Duration::from_millis(millis));
        }
        let digit = ((tensor.mean() * 9.0).round() as usize).min(NUM_CLASSES - 1);
        let mut scores = vec![0.01; NUM_CLASSES];
        scores[digit] = 0.91;
        Ok(scores)
    }

    fn describe(&self) -> String {
        "intensity test classifier".to_string()
    }
}

/// Panics on every call, like a model with a broken forward pass.
pub struct PanickingClassifier;

impl Classifier for PanickingClassifier {
    fn classify(&self, _tensor: &Tensor) -> Result<Vec<f64>, InferError> {
        panic!("forward pass blew up");
    }
}

/// Grey level that [`IntensityClassifier`] maps to `digit`.
pub fn level_for(digit: u8) -> u8 {
    (f32::from(digit) / 9.0 * 255.0).round() as u8
}

pub fn encode_png(img: GrayImage) -> Vec<u8> {
    let mut buf = std::io::Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

pub fn uniform_png(level: u8) -> Vec<u8> {
    encode_png(GrayImage::from_pixel(28, 28, Luma([level])))
}

/// White "7" on black: a top bar and a diagonal down to the bottom left.
pub fn seven_glyph() -> GrayImage {
    let mut img = GrayImage::new(28, 28);
    for y in 4..7 {
        for x in 6..23 {
            img.put_pixel(x, y, Luma([255]));
        }
    }
    for step in 0..18u32 {
        let y = 7 + step;
        let x = 21 - step / 2;
        img.put_pixel(x, y, Luma([255]));
        img.put_pixel(x - 1, y, Luma([255]));
    }
    img
}

/// White vertical stroke.
pub fn one_glyph() -> GrayImage {
    let mut img = GrayImage::new(28, 28);
    for y in 4..25 {
        for x in 13..16 {
            img.put_pixel(x, y, Luma([255]));
        }
    }
    img
}

fn template_row(glyph: &GrayImage) -> Vec<f32> {
    glyph
        .pixels()
        .map(|p| if p.0[0] > 127 { 1.0 } else { -1.0 })
        .collect()
}

/// Single softmax layer scoring the "1" and "7" glyph templates.
pub fn template_model_json() -> String {
    let mut weights = vec![vec![0.0f32; TENSOR_LEN]; NUM_CLASSES];
    weights[1] = template_row(&one_glyph());
    weights[7] = template_row(&seven_glyph());
    serde_json::json!({
        "layers": [{
            "weights": weights,
            "bias": vec![0.0f32; NUM_CLASSES],
            "activation": "softmax",
        }]
    })
    .to_string()
}

pub fn template_model_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(template_model_json().as_bytes()).unwrap();
    file
}

pub fn test_config() -> ServingConfig {
    ServingConfig {
        batch_parallelism: 4,
        ..Default::default()
    }
}

pub fn app_with(classifier: Arc<dyn Classifier>, config: ServingConfig) -> (Router, Arc<AppState>) {
    let server = ServingServer::with_classifier(config, ClassifierHandle::from_classifier(classifier));
    (server.build_app(), Arc::clone(server.state()))
}

pub fn app(classifier: Arc<dyn Classifier>) -> (Router, Arc<AppState>) {
    app_with(classifier, test_config())
}

/// Hand-built `multipart/form-data` body.
#[derive(Default)]
pub struct MultipartBody {
    bytes: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, content: &[u8]) -> Self {
        self.bytes.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.bytes.extend_from_slice(content);
        self.bytes.extend_from_slice(b"\r\n");
        self
    }

    pub fn png(self, name: &str, file_name: &str, content: &[u8]) -> Self {
        self.file(name, file_name, "image/png", content)
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.bytes.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.bytes
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.bytes
    }
}

pub fn multipart_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.expect("request success")
}

pub async fn json_body(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn text_body(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
