//! HTTP tests for `POST /api/generate`, the health check and static serving.

mod helpers;

use axum::http::StatusCode;
use serde_json::Value;

use helpers::{
    PLACEHOLDER_URL, StubBehavior, child_photo_form, photo_part, setup_with_stub,
    setup_without_credentials,
};

const MIB: usize = 1024 * 1024;

#[tokio::test]
async fn health_check_reports_ok() {
    let app = setup_without_credentials().await;
    let response = app.server.get("/").await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>(), serde_json::json!({ "status": "ok" }));
}

#[tokio::test]
async fn without_credentials_returns_mock_mode() {
    let app = setup_without_credentials().await;
    let response = app
        .server
        .post("/api/generate")
        .multipart(child_photo_form("a.png", "image/png", vec![1u8; 10]))
        .await;

    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["status"], "mock_mode");
    assert_eq!(body["image_url"], PLACEHOLDER_URL);
    assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
    assert!(app.temp_files().is_empty());
}

#[tokio::test]
async fn placeholder_url_is_served() {
    let app = setup_without_credentials().await;
    let response = app.server.get("/static/mock_placeholder.png").await;

    response.assert_status_ok();
    assert!(response.as_bytes().starts_with(b"\x89PNG"));
}

#[tokio::test]
async fn disallowed_type_is_rejected_before_storage() {
    let app = setup_with_stub(StubBehavior::Output(b"x".to_vec()), true).await;
    let response = app
        .server
        .post("/api/generate")
        .multipart(child_photo_form("notes.txt", "text/plain", b"hello".to_vec()))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let detail = response.json::<Value>()["detail"].as_str().unwrap().to_string();
    assert!(detail.contains("image/jpeg, image/png, image/webp"));
    assert!(app.temp_files().is_empty());
    assert!(app.stub_calls().is_empty());
}

#[tokio::test]
async fn oversized_photo_is_rejected_before_storage() {
    let app = setup_with_stub(StubBehavior::Output(b"x".to_vec()), true).await;
    let response = app
        .server
        .post("/api/generate")
        .multipart(child_photo_form("big.jpg", "image/jpeg", vec![0u8; 6 * MIB]))
        .await;

    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(
        response.json::<Value>()["detail"],
        "File too large. Maximum size is 5.0MB"
    );
    assert!(app.temp_files().is_empty());
    assert!(app.stub_calls().is_empty());
}

#[tokio::test]
async fn oversized_template_is_rejected_before_storage() {
    let app = setup_with_stub(StubBehavior::Output(b"x".to_vec()), true).await;
    let form = child_photo_form("a.png", "image/png", vec![1u8; 10]).add_part(
        "template_image",
        photo_part("pose.png", "image/png", vec![0u8; 5 * MIB + 1]),
    );
    let response = app.server.post("/api/generate").multipart(form).await;

    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(
        response.json::<Value>()["detail"],
        "Template file too large. Maximum size is 5.0MB"
    );
    assert!(app.temp_files().is_empty());
}

#[tokio::test]
async fn photo_over_the_body_limit_is_too_large() {
    let app = setup_with_stub(StubBehavior::Output(b"x".to_vec()), true).await;
    let response = app
        .server
        .post("/api/generate")
        .multipart(child_photo_form("huge.jpg", "image/jpeg", vec![0u8; 12 * MIB]))
        .await;

    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(
        response.json::<Value>()["detail"],
        "File too large. Maximum size is 5.0MB"
    );
    assert!(app.temp_files().is_empty());
    assert!(app.stub_calls().is_empty());
}

#[tokio::test]
async fn two_oversized_files_over_the_body_limit_are_too_large() {
    let app = setup_with_stub(StubBehavior::Output(b"x".to_vec()), true).await;
    let form = child_photo_form("a.jpg", "image/jpeg", vec![0u8; 6 * MIB]).add_part(
        "template_image",
        photo_part("pose.jpg", "image/jpeg", vec![0u8; 6 * MIB]),
    );
    let response = app.server.post("/api/generate").multipart(form).await;

    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    let detail = response.json::<Value>()["detail"].as_str().unwrap().to_string();
    assert!(detail.contains("too large. Maximum size is 5.0MB"));
    assert!(app.temp_files().is_empty());
    assert!(app.stub_calls().is_empty());
}

#[tokio::test]
async fn missing_child_photo_is_unprocessable() {
    let app = setup_without_credentials().await;
    let form = axum_test::multipart::MultipartForm::new().add_text("note", "no photo");
    let response = app.server.post("/api/generate").multipart(form).await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn published_url_serves_provider_output() {
    let output = b"\x89PNG stylized result".to_vec();
    let app = setup_with_stub(StubBehavior::Output(output.clone()), true).await;
    let response = app
        .server
        .post("/api/generate")
        .multipart(child_photo_form("a.png", "image/png", vec![1u8; 10]))
        .await;

    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "Image generated successfully");

    let url = body["image_url"].as_str().unwrap();
    assert_eq!(std::fs::read(app.static_path(url)).unwrap(), output);

    let path = url.strip_prefix(helpers::BASE_URL).unwrap();
    let served = app.server.get(path).await;
    served.assert_status_ok();
    assert_eq!(served.as_bytes().as_ref(), output.as_slice());

    assert!(app.temp_files().is_empty());
}

#[tokio::test]
async fn default_pose_is_used_without_template() {
    let app = setup_with_stub(StubBehavior::Output(b"x".to_vec()), true).await;
    app.server
        .post("/api/generate")
        .multipart(child_photo_form("a.png", "image/png", vec![1u8; 10]))
        .await
        .assert_status_ok();

    let calls = app.stub_calls();
    assert_eq!(calls.len(), 1);
    let expected = std::fs::canonicalize(&app.config.default_pose_path).unwrap();
    assert_eq!(calls[0].1, expected);
}

#[tokio::test]
async fn missing_default_pose_returns_mock_mode() {
    let app = setup_with_stub(StubBehavior::Output(b"x".to_vec()), false).await;
    let response = app
        .server
        .post("/api/generate")
        .multipart(child_photo_form("a.png", "image/png", vec![1u8; 10]))
        .await;

    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["status"], "mock_mode");
    assert_eq!(body["image_url"], PLACEHOLDER_URL);
    assert!(app.stub_calls().is_empty());
    assert!(app.temp_files().is_empty());
}

#[tokio::test]
async fn empty_provider_output_returns_mock_mode() {
    let app = setup_with_stub(StubBehavior::NoResult, true).await;
    let response = app
        .server
        .post("/api/generate")
        .multipart(child_photo_form("a.png", "image/png", vec![1u8; 10]))
        .await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "mock_mode");
    assert!(app.temp_files().is_empty());
}

#[tokio::test]
async fn provider_failure_is_internal_error_and_cleans_up() {
    let app = setup_with_stub(StubBehavior::Unavailable("space is sleeping"), true).await;
    let form = child_photo_form("a.png", "image/png", vec![1u8; 10]).add_part(
        "template_image",
        photo_part("pose.jpg", "image/jpeg", vec![2u8; 10]),
    );
    let response = app.server.post("/api/generate").multipart(form).await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let detail = response.json::<Value>()["detail"].as_str().unwrap().to_string();
    assert!(detail.contains("space is sleeping"));

    let calls = app.stub_calls();
    assert_eq!(calls.len(), 1);
    assert!(!calls[0].0.exists());
    assert!(!calls[0].1.exists());
    assert!(app.temp_files().is_empty());
}

#[tokio::test]
async fn concurrent_identical_names_do_not_collide() {
    let app = setup_with_stub(StubBehavior::Output(b"result".to_vec()), true).await;

    let first = async {
        app.server
            .post("/api/generate")
            .multipart(child_photo_form("a.png", "image/png", vec![1u8; 10]))
            .await
    };
    let second = async {
        app.server
            .post("/api/generate")
            .multipart(child_photo_form("a.png", "image/png", vec![2u8; 10]))
            .await
    };
    let (first, second) = tokio::join!(first, second);

    first.assert_status_ok();
    second.assert_status_ok();
    let first_url = first.json::<Value>()["image_url"].as_str().unwrap().to_string();
    let second_url = second.json::<Value>()["image_url"].as_str().unwrap().to_string();
    assert_ne!(first_url, second_url);
    assert!(app.static_path(&first_url).exists());
    assert!(app.static_path(&second_url).exists());

    let calls = app.stub_calls();
    assert_eq!(calls.len(), 2);
    assert_ne!(calls[0].0, calls[1].0);
    assert!(app.temp_files().is_empty());
}
