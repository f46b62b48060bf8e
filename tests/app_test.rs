#![cfg(feature = "web")]

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use eventeye::app::{AppState, router};
use eventeye::config::AppConfig;
use eventeye::offline::OfflineManager;
use eventeye::store::MemoryStore;
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const ADMIN: &str = "admin@eventeye.local";

fn app() -> (TempDir, AppState, Router) {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig {
        data_dir: dir.path().to_path_buf(),
        ..AppConfig::default()
    };
    let state = AppState::new(
        config,
        Arc::new(MemoryStore::new()),
        Arc::new(OfflineManager::in_memory(None)),
        reqwest::Client::new(),
    )
    .unwrap();
    state.users.init().unwrap();
    state.users.ensure_admin(ADMIN, "secret").unwrap();
    let app = router(state.clone());
    (dir, state, app)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn json_body(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn admin_cookie(app: &Router) -> String {
    let request = Request::builder()
        .method("POST")
        .uri("/login")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("email=admin%40eventeye.local&password=secret"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()[header::LOCATION], "/dashboard");
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

#[tokio::test]
async fn public_pages_render() {
    let (_dir, _state, app) = app();
    for page in ["/", "/fill-form", "/login", "/signup", "/forgot-password", "/reset-password"] {
        assert_eq!(send(&app, get(page)).await.0, StatusCode::OK, "{page}");
    }

    let (status, body) = send(&app, get("/about")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body).unwrap().contains("About EventEye"));
    assert_eq!(send(&app, get("/nope")).await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn templates_and_languages_are_listed() {
    let (_dir, _state, app) = app();
    let (_, templates) = json_body(&app, get("/api/templates")).await;
    assert_eq!(templates["templates"].as_array().unwrap().len(), 7);
    assert_eq!(templates["templates"][2]["primary"], "#6ee7b7");

    let (_, languages) = json_body(&app, get("/api/languages")).await;
    assert_eq!(languages["languages"][1]["code"], "hi");
}

#[tokio::test]
async fn name_validation_endpoint() {
    let (_dir, _state, app) = app();
    let (status, body) =
        json_body(&app, post_json("/api/validate-name", json!({ "name": "asha  rao" }), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["suggestion"], "Asha Rao");
    assert_eq!(body["issues"][0], "consecutive_spaces");
}

#[tokio::test]
async fn admin_routes_need_an_admin_session() {
    let (_dir, _state, app) = app();
    let (status, body) = json_body(&app, get("/api/events/hack/participants")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "error");

    let response = app.clone().oneshot(get("/dashboard")).await.unwrap();
    assert!(response.status().is_redirection());
    assert_eq!(response.headers()[header::LOCATION], "/login");
}

#[tokio::test]
async fn admin_saves_and_lists_participants() {
    let (_dir, state, app) = app();
    let cookie = admin_cookie(&app).await;

    let (status, saved) = json_body(
        &app,
        post_json(
            "/api/events/hack/participants",
            json!([{ "name": "Asha Rao", "email": "asha@example.com" }]),
            Some(&cookie),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["participants"][0]["id"], "email:asha@example_com");
    assert_eq!(saved["result"]["outcome"], "written");

    let request = Request::builder()
        .uri("/api/events/hack/participants")
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let (status, listed) = json_body(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["participants"].as_array().unwrap().len(), 1);
    assert_eq!(listed["cached"], false);

    let actions = state.offline.user_actions(ADMIN, 10);
    assert_eq!(actions[0].action, "save_participants");
}

#[tokio::test]
async fn preview_returns_certificate_and_qr() {
    let (_dir, _state, app) = app();
    let (status, body) = json_body(
        &app,
        post_json(
            "/api/certificates/preview",
            json!({ "participant": { "name": "Asha Rao" }, "templateId": 3, "language": "hi" }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = body["certificateId"].as_str().unwrap();
    assert!(id.starts_with("CERT-"));
    assert_eq!(body["qrPayload"]["certificateId"], id);
    assert_eq!(body["templateName"], "Emerald Forest");
    assert!(body["dataUrl"].as_str().unwrap().starts_with("data:application/pdf;base64,"));
    assert!(body["qrDataUrl"].as_str().unwrap().starts_with("data:image/png;base64,"));
}

#[tokio::test]
async fn generated_certificate_can_be_verified() {
    let (_dir, _state, app) = app();
    let cookie = admin_cookie(&app).await;

    let (status, generated) = json_body(
        &app,
        post_json(
            "/api/certificates/generate",
            json!({ "participant": { "id": "p1", "name": "Asha Rao" }, "event": { "id": "hack" } }),
            Some(&cookie),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(generated["storage"]["success"], true);
    let id = generated["certificateId"].as_str().unwrap();

    let (status, verified) = json_body(&app, get(&format!("/api/verify/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verified["valid"], true);
    assert_eq!(verified["certificate"]["participantName"], "Asha Rao");
    assert_eq!(verified["certificate"]["eventId"], "hack");

    let (status, _) = json_body(&app, get("/api/verify/CERT-000000")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn registration_requires_name_and_email() {
    let (_dir, _state, app) = app();
    let (status, _) = json_body(
        &app,
        post_json("/api/registrations", json!({ "name": "", "email": "" }), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = json_body(
        &app,
        post_json(
            "/api/registrations",
            json!({ "name": "Asha Rao", "email": "asha@example.com", "college": "IIT" }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn bulk_send_without_emailjs_is_unavailable() {
    let (_dir, _state, app) = app();
    let cookie = admin_cookie(&app).await;
    let (status, body) = json_body(
        &app,
        post_json("/api/email/bulk", json!({ "eventId": "hack" }), Some(&cookie)),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["message"], "EmailJS is not configured");
}
