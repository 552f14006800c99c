#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{attrs, harness, POOL};
use quotagate_gateway::router::build_router;

fn app() -> Router {
    let h = harness();
    h.dir.insert_user(
        POOL,
        "alice",
        attrs(&[
            ("sub", "sub-alice"),
            ("custom:total_files_uploaded", "25"),
            ("custom:max_files_allowed", "25"),
        ]),
    );
    build_router(h.state)
}

fn post(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap()
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), 1 << 20).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, body)
}

#[tokio::test]
async fn healthz() {
    let (status, body) = send(app(), Request::get("/healthz").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".into()));
}

#[tokio::test]
async fn invalid_json_is_bad_request() {
    let (status, body) = send(app(), post("/upload-quota", "{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_INPUT");
    assert_eq!(body["message"], "Invalid JSON in request body.");
}

#[tokio::test]
async fn empty_body_reports_missing_sub() {
    let (status, body) = send(app(), post("/upload-quota", "")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Missing required field: sub");
}

#[tokio::test]
async fn check_returns_usage() {
    let req = post("/upload-quota", json!({ "sub": "sub-alice", "mode": "check" }).to_string());
    let (status, body) = send(app(), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["currentUsage"], 25);
    assert_eq!(body["maxFilesAllowed"], 25);
    assert_eq!(body["maxSizeAllowedMB"], 25);
    assert!(body.get("newCount").is_none());
}

#[tokio::test]
async fn refused_increment_carries_current_usage() {
    let req = post(
        "/upload-quota",
        json!({ "sub": "sub-alice", "mode": "increment", "conversionType": "pdf" }).to_string(),
    );
    let (status, body) = send(app(), req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "QUOTA_EXCEEDED");
    assert_eq!(body["message"], "You have already reached the limit of 25 PDF uploads.");
    assert_eq!(body["currentUsage"], 25);
    assert_eq!(body["maxFilesAllowed"], 25);
}

#[tokio::test]
async fn unknown_user_is_not_found() {
    let req = post("/upload-quota", json!({ "sub": "ghost", "mode": "check" }).to_string());
    let (status, body) = send(app(), req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NOT_FOUND");
}

#[tokio::test]
async fn trigger_rejection_maps_to_client_error() {
    let req = post(
        "/v1/triggers",
        json!({
            "triggerSource": "PreSignUp_SignUp",
            "userPoolId": POOL,
            "userName": "x",
            "request": { "userAttributes": { "email": "x@other.edu" } },
            "response": {}
        })
        .to_string(),
    );
    let (status, body) = send(app(), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "REGISTRATION_REJECTED");
}

#[tokio::test]
async fn group_sync_route() {
    let req = post("/v1/group-sync", json!({ "group": "AdminUsers" }).to_string());
    let (status, body) = send(app(), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "update_all");
    assert_eq!(body["total_users_processed"], 0);
}

#[tokio::test]
async fn cors_preflight() {
    let req = Request::builder()
        .method(Method::OPTIONS)
        .uri("/upload-quota")
        .header(header::ORIGIN, "https://app.example.org")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();
    let res = app().oneshot(req).await.unwrap();
    assert!(res.status().is_success());
    assert_eq!(res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    let methods = res.headers()[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
    assert!(methods.contains("POST"));
}
