// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use common::FakeRuntime;
use courier_core::application::progress::ProgressTracker;
use courier_core::application::transfer_service::{StandardTransferService, TransferSettings};
use courier_core::presentation::api::{app, REGISTRY_AUTH_HEADER};
use std::sync::Arc;
use tower::ServiceExt;

fn router(fake: &Arc<FakeRuntime>) -> Router {
    let service = StandardTransferService::new(fake.clone(), ProgressTracker::detached(), TransferSettings::default());
    app(Arc::new(service))
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, String) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let fake = FakeRuntime::new();
    let (status, body) = send(router(&fake), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"status":"ok"}"#);
}

#[tokio::test]
async fn test_progress_empty_when_idle() {
    let fake = FakeRuntime::new();
    let (status, body) = send(router(&fake), get("/progress")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "{}");
}

#[tokio::test]
async fn test_list_volumes_json_shape() {
    let fake = FakeRuntime::new();
    fake.with_volume("db", "local").with_container("web", "db", true);
    fake.state.lock().unwrap().probe_output = "2048\t/var/lib/docker/volumes/db\n".into();

    let (status, body) = send(router(&fake), get("/volumes")).await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["db"]["Driver"], "local");
    assert_eq!(json["db"]["Size"], 2_048_000);
    assert_eq!(json["db"]["SizeHuman"], "2.0 MB");
    assert_eq!(json["db"]["Containers"][0], "web");
}

#[tokio::test]
async fn test_export_without_file_name_is_bad_request() {
    let fake = FakeRuntime::new();
    fake.with_volume("db", "local");

    let (status, body) = send(router(&fake), get("/volumes/db/export?path=/backups")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "fileName is required");
    assert!(fake.events().is_empty());
}

#[tokio::test]
async fn test_export_ok() {
    let fake = FakeRuntime::new();
    fake.with_volume("db", "local");

    let (status, _) = send(
        router(&fake),
        get("/volumes/db/export?path=/backups&fileName=db.tar.gz"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fake.data_workers()[0].spec.binds[1], "/backups:/vackup");
}

#[tokio::test]
async fn test_worker_failure_is_internal_error_with_output() {
    let fake = FakeRuntime::new();
    fake.with_volume("db", "local");
    {
        let mut state = fake.state.lock().unwrap();
        state.worker_exit_code = 1;
        state.worker_output = "gzip: stdin: not in gzip format\n".into();
    }

    let (status, body) = send(router(&fake), get("/volumes/db/import?path=/backups/db.tar.gz")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.starts_with("worker exited with status code 1"));
    assert!(body.contains("gzip: stdin: not in gzip format"));
}

#[tokio::test]
async fn test_push_unauthorized_is_401() {
    let fake = FakeRuntime::new();
    fake.with_volume("db", "local");
    fake.state.lock().unwrap().push_log =
        vec![r#"{"error":"unauthorized: authentication required"}"#.into()];

    let request = Request::builder()
        .method(Method::POST)
        .uri("/volumes/db/push")
        .header("content-type", "application/json")
        .header(REGISTRY_AUTH_HEADER, "e30=")
        .body(Body::from(r#"{"reference":"registry.example.com/db:latest"}"#))
        .unwrap();

    let (status, body) = send(router(&fake), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("unauthorized"));
}

#[tokio::test]
async fn test_pull_created() {
    let fake = FakeRuntime::new();
    fake.with_volume("db", "local");

    let (status, _) = send(
        router(&fake),
        post_json("/volumes/db/pull", r#"{"reference":"registry.example.com/db:latest"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_push_malformed_body_is_bad_request() {
    let fake = FakeRuntime::new();
    fake.with_volume("db", "local");

    let (status, body) = send(router(&fake), post_json("/volumes/db/push", "{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.starts_with("invalid request body"));
    assert!(fake.events().is_empty());
}

#[tokio::test]
async fn test_pull_missing_body_is_bad_request() {
    let fake = FakeRuntime::new();
    fake.with_volume("db", "local");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/volumes/db/pull")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(router(&fake), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.starts_with("invalid request body"));
    assert!(fake.events().is_empty());
}

#[tokio::test]
async fn test_clone_created() {
    let fake = FakeRuntime::new();
    fake.with_volume("db", "local");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/volumes/db/clone?destVolume=db-copy")
        .body(Body::empty())
        .unwrap();

    let (status, _) = send(router(&fake), request).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(fake.state.lock().unwrap().volumes.contains_key("db-copy"));
}

#[tokio::test]
async fn test_delete_no_content() {
    let fake = FakeRuntime::new();
    fake.with_volume("db", "local");

    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/volumes/db")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(router(&fake), request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_containers_for_volume() {
    let fake = FakeRuntime::new();
    fake.with_container("web", "db", false);

    let (status, body) = send(router(&fake), get("/volumes/db/container")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"["web"]"#);
}

#[tokio::test]
async fn test_invalid_volume_name_is_bad_request() {
    let fake = FakeRuntime::new();

    let (status, _) = send(router(&fake), get("/volumes/bad%20name/size")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
