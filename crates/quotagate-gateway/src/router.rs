//! Axum router wiring.
//!
//! Browser-facing routes get permissive CORS (`POST, OPTIONS`;
//! `Content-Type, Authorization`); preflight requests are answered by the layer.

use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{app_state::AppState, ops, transport};

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/upload-quota", post(transport::http::upload_quota))
        .route("/update-first-sign-in", post(transport::http::update_first_sign_in))
        .route("/v1/group-sync", post(transport::http::group_sync))
        .route("/v1/triggers", post(transport::http::lifecycle_trigger))
        .layer(cors)
        .route("/healthz", get(ops::healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
