mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::DateTime;
use common::*;
use mnist_serving::config::ServingConfig;
use mnist_serving::metrics::ErrorReason;
use mnist_serving::server::ServingServer;

#[tokio::test]
async fn canonical_seven_is_classified_by_a_loaded_model() {
    let model = template_model_file();
    let config = ServingConfig {
        model_path: model.path().to_path_buf(),
        ..test_config()
    };
    let server = ServingServer::bootstrap(config).expect("model loads");
    let app = server.build_app();

    let body = MultipartBody::new()
        .png("image", "seven.png", &encode_png(seven_glyph()))
        .finish();
    let response = send(app, multipart_request("/api/v1/predict", body)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, serde_json::json!({ "predictedDigit": 7 }));
    assert_eq!(server.state().metrics.total_requests(), 1);
    assert_eq!(server.state().metrics.class_count(7), 1);
}

#[tokio::test]
async fn uniform_image_maps_to_its_intensity_digit() {
    let (app, state) = app(Arc::new(IntensityClassifier::default()));
    let body = MultipartBody::new()
        .png("image", "grey.png", &uniform_png(198))
        .finish();

    let response = send(app, multipart_request("/api/v1/predict", body)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["predictedDigit"], 7);
    assert_eq!(state.metrics.latency().count(), 1);
}

#[tokio::test]
async fn missing_image_part_names_the_part() {
    let classifier = Arc::new(IntensityClassifier::default());
    let (app, state) = app(classifier.clone());
    let body = MultipartBody::new().text("comment", "no file here").finish();

    let response = send(app, multipart_request("/api/v1/predict", body)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["status"], 400);
    assert_eq!(json["error"], "Bad Request");
    assert_eq!(json["message"], "Required request part 'image' is not present.");
    assert_eq!(json["path"], "/api/v1/predict");
    assert!(DateTime::parse_from_rfc3339(json["timestamp"].as_str().unwrap()).is_ok());
    assert_eq!(classifier.calls(), 0);
    assert_eq!(state.metrics.latency().count(), 0);
}

#[tokio::test]
async fn empty_image_part_is_rejected() {
    let classifier = Arc::new(IntensityClassifier::default());
    let (app, _) = app(classifier.clone());
    let body = MultipartBody::new().png("image", "empty.png", &[]).finish();

    let response = send(app, multipart_request("/api/v1/predict", body)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["message"], "Image file is missing or empty.");
    assert_eq!(classifier.calls(), 0);
}

#[tokio::test]
async fn non_image_content_type_is_rejected_before_inference() {
    let classifier = Arc::new(IntensityClassifier::default());
    let (app, state) = app(classifier.clone());
    let body = MultipartBody::new()
        .file("image", "notes.txt", "text/plain", b"definitely not pixels")
        .finish();

    let response = send(app, multipart_request("/api/v1/predict", body)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let message = json_body(response).await["message"].as_str().unwrap().to_string();
    assert!(message.contains("text/plain"), "{message}");
    assert_eq!(classifier.calls(), 0);
    assert_eq!(state.metrics.total_requests(), 1);
}

#[tokio::test]
async fn undecodable_image_is_a_processing_failure() {
    let (app, state) = app(Arc::new(IntensityClassifier::default()));
    let body = MultipartBody::new()
        .png("image", "broken.png", b"\x89PNG but not really")
        .finish();

    let response = send(app, multipart_request("/api/v1/predict", body)).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = json_body(response).await;
    assert_eq!(json["message"], "Error while processing the request with the model.");
    assert_eq!(
        state
            .metrics
            .error_count(ErrorReason::ProcessingFailure),
        1
    );
    assert_eq!(state.metrics.latency().count(), 1);
    assert_eq!((0..10).map(|d| state.metrics.class_count(d)).sum::<u64>(), 0);
}

#[tokio::test]
async fn non_multipart_request_is_a_bad_request() {
    let (app, _) = app(Arc::new(IntensityClassifier::default()));
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/predict")
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap();

    let response = send(app, request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_over_the_limit_is_payload_too_large() {
    let config = ServingConfig {
        max_upload_bytes: 1024,
        ..test_config()
    };
    let classifier = Arc::new(IntensityClassifier::default());
    let (app, _) = app_with(classifier.clone(), config);
    let body = MultipartBody::new()
        .png("image", "huge.png", &vec![0u8; 8 * 1024])
        .finish();

    let response = send(app, multipart_request("/api/v1/predict", body)).await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let json = json_body(response).await;
    assert_eq!(json["status"], 413);
    assert_eq!(json["message"], "File size exceeds the configured limit.");
    assert_eq!(classifier.calls(), 0);
}

#[tokio::test]
async fn unknown_route_returns_not_found_body() {
    let (app, _) = app(Arc::new(IntensityClassifier::default()));
    let request = Request::builder()
        .uri("/api/v2/nothing")
        .body(Body::empty())
        .unwrap();

    let response = send(app, request).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = json_body(response).await;
    assert_eq!(json["status"], 404);
    assert_eq!(json["error"], "Not Found");
    assert_eq!(json["message"], "The requested resource was not found.");
    assert_eq!(json["path"], "/api/v2/nothing");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_singles_keep_counters_exact() {
    const N: usize = 64;
    let (app, state) = app(Arc::new(IntensityClassifier::with_jitter()));

    let mut handles = Vec::with_capacity(N);
    for i in 0..N {
        let app = app.clone();
        let digit = (i % 10) as u8;
        handles.push(tokio::spawn(async move {
            let body = MultipartBody::new()
                .png("image", "d.png", &uniform_png(level_for(digit)))
                .finish();
            let response = send(app, multipart_request("/api/v1/predict", body)).await;
            (digit, json_body(response).await)
        }));
    }

    for handle in handles {
        let (digit, json) = handle.await.unwrap();
        assert_eq!(json["predictedDigit"], u64::from(digit));
    }

    let metrics = &state.metrics;
    assert_eq!(metrics.total_requests(), N as u64);
    assert_eq!(metrics.latency().count(), N as u64);
    assert_eq!((0..10).map(|d| metrics.class_count(d)).sum::<u64>(), N as u64);
    for digit in 0..10u8 {
        let expected = (0..N).filter(|i| i % 10 == usize::from(digit)).count() as u64;
        assert_eq!(metrics.class_count(digit), expected, "digit {digit}");
    }
}

#[tokio::test]
async fn panicking_classifier_is_an_unexpected_failure() {
    let (app, state) = app(Arc::new(PanickingClassifier));
    let body = MultipartBody::new()
        .png("image", "seven.png", &uniform_png(level_for(7)))
        .finish();

    let response = send(app.clone(), multipart_request("/api/v1/predict", body)).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = json_body(response).await;
    assert_eq!(json["message"], "An unexpected internal server error occurred.");
    assert!(!json["message"].as_str().unwrap().contains("blew up"));
    assert_eq!(state.metrics.error_count(ErrorReason::UnexpectedFailure), 1);
    assert_eq!(state.metrics.error_count(ErrorReason::ProcessingFailure), 0);

    let text = text_body(send(app, Request::builder().uri("/metrics").body(Body::empty()).unwrap()).await).await;
    assert!(text.contains("predictions_errors_total{reason=\"unexpected_failure\"} 1\n"));
}

#[tokio::test]
async fn wrong_method_on_known_route_gets_error_body() {
    let (app, _) = app(Arc::new(IntensityClassifier::default()));
    let request = Request::builder()
        .method("GET")
        .uri("/api/v1/predict")
        .body(Body::empty())
        .unwrap();

    let response = send(app, request).await;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    let json = json_body(response).await;
    assert_eq!(json["status"], 405);
    assert_eq!(json["error"], "Method Not Allowed");
    assert_eq!(json["message"], "Request method 'GET' is not supported.");
    assert_eq!(json["path"], "/api/v1/predict");
    assert!(DateTime::parse_from_rfc3339(json["timestamp"].as_str().unwrap()).is_ok());
}
