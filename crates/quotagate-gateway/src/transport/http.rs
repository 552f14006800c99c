//! axum adapters for the handlers.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use quotagate_core::error::QuotaGateError;

use crate::app_state::AppState;
use crate::dispatch::LifecycleEvent;
use crate::handlers::{group_sync, profile, quota};

/// Error rendered at the HTTP boundary: `{error, message, ...details}`.
#[derive(Debug)]
pub struct ApiError {
    pub error: QuotaGateError,
    pub details: Option<Value>,
}

impl From<QuotaGateError> for ApiError {
    fn from(error: QuotaGateError) -> Self {
        Self { error, details: None }
    }
}

impl From<quota::QuotaFailure> for ApiError {
    fn from(f: quota::QuotaFailure) -> Self {
        Self {
            error: f.error,
            details: f.current.and_then(|c| serde_json::to_value(c).ok()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.error.client_code();
        let status = StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut body = json!({
            "error": code.as_str(),
            "message": self.error.to_string(),
        });
        if let (Some(Value::Object(extra)), Some(obj)) = (self.details, body.as_object_mut()) {
            for (k, v) in extra {
                obj.entry(k).or_insert(v);
            }
        }

        if status.is_server_error() {
            tracing::error!(code = code.as_str(), error = %self.error, "request failed");
        } else {
            tracing::info!(code = code.as_str(), error = %self.error, "request rejected");
        }
        (status, Json(body)).into_response()
    }
}

/// Decode a JSON body. An empty body is treated as `{}`.
pub fn decode_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, QuotaGateError> {
    let body = if body.iter().all(u8::is_ascii_whitespace) { &b"{}"[..] } else { body };
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(error = %e, "invalid request body");
        QuotaGateError::InvalidInput("Invalid JSON in request body.".into())
    })
}

pub async fn upload_quota(State(state): State<AppState>, body: Bytes) -> Result<Json<quota::QuotaResponse>, ApiError> {
    let req: quota::QuotaApiRequest = decode_json(&body)?;
    Ok(Json(quota::check_or_increment_quota(&state, req).await?))
}

pub async fn update_first_sign_in(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<profile::ProfileUpdateReply>, ApiError> {
    let req: profile::ProfileUpdateRequest = decode_json(&body)?;
    Ok(Json(profile::update_first_sign_in(&state, req).await?))
}

pub async fn group_sync(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<group_sync::GroupSyncReply>, ApiError> {
    let body: Value = decode_json(&body)?;
    Ok(Json(group_sync::handle_group_sync(&state, body).await?))
}

pub async fn lifecycle_trigger(State(state): State<AppState>, body: Bytes) -> Result<Json<LifecycleEvent>, ApiError> {
    let event: LifecycleEvent = serde_json::from_slice(&body)
        .map_err(|e| QuotaGateError::InvalidInput(format!("invalid lifecycle event: {e}")))?;
    tracing::info!(trigger_source = %event.trigger_source, user = %event.user_name, "lifecycle trigger");
    let out = state.dispatcher().dispatch(&state, event).await?;
    Ok(Json(out))
}
