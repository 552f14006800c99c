//! Upload quota check / increment.

use serde::{Deserialize, Serialize};

use quotagate_core::error::QuotaGateError;
use quotagate_core::quota::{check_or_increment, QuotaOutcome, QuotaRequest, UserQuotaState};

use crate::app_state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaApiRequest {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub conversion_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_count: Option<u32>,
    pub current_usage: u32,
    pub max_files_allowed: u32,
    pub max_pages_allowed: u32,
    #[serde(rename = "maxSizeAllowedMB")]
    pub max_size_allowed_mb: u32,
    #[serde(rename = "pdf2pdfCount")]
    pub pdf2pdf_count: u32,
    #[serde(rename = "pdf2htmlCount")]
    pub pdf2html_count: u32,
}

impl QuotaResponse {
    fn snapshot(s: &UserQuotaState) -> Self {
        Self {
            message: None,
            new_count: None,
            current_usage: s.current_count,
            max_files_allowed: s.max_files_allowed,
            max_pages_allowed: s.max_pages_allowed,
            max_size_allowed_mb: s.max_size_allowed_mb,
            pdf2pdf_count: s.pdf_count,
            pdf2html_count: s.html_count,
        }
    }

    fn incremented(s: &UserQuotaState) -> Self {
        Self {
            message: Some(format!("Upload allowed. New count = {}.", s.current_count)),
            new_count: Some(s.current_count),
            ..Self::snapshot(s)
        }
    }
}

/// Failure of a quota request. A refused increment carries the unchanged usage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaFailure {
    pub error: QuotaGateError,
    pub current: Option<QuotaResponse>,
}

impl From<QuotaGateError> for QuotaFailure {
    fn from(error: QuotaGateError) -> Self {
        Self { error, current: None }
    }
}

enum Decision {
    Applied(QuotaOutcome),
    Refused(UserQuotaState, QuotaGateError),
}

pub async fn check_or_increment_quota(
    state: &AppState,
    req: QuotaApiRequest,
) -> Result<QuotaResponse, QuotaFailure> {
    let sub = req
        .sub
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| QuotaGateError::InvalidInput("Missing required field: sub".into()))?;
    let request = QuotaRequest::parse(req.mode.as_deref(), req.conversion_type.as_deref())?;

    let dir = state.directory();
    let pool = state.pool_id();
    let defaults = &state.cfg().quota.defaults;

    // Each attempt re-reads the user, so a retried increment is decided
    // against fresh counters.
    let decision = state
        .retry()
        .run("check_or_increment_quota", move || async move {
            let user = dir.get_user(pool, sub).await?;
            let current = UserQuotaState::from_attributes(&user.attributes, defaults);
            let outcome = match check_or_increment(&current, request) {
                Ok(o) => o,
                Err(e @ QuotaGateError::QuotaExceeded { .. }) => return Ok(Decision::Refused(current, e)),
                Err(e) => return Err(e),
            };
            if outcome.incremented {
                dir.update_user_attributes(pool, &user.username, &outcome.state.counter_attributes())
                    .await?;
            }
            Ok::<_, QuotaGateError>(Decision::Applied(outcome))
        })
        .await?;

    match decision {
        Decision::Refused(current, error) => {
            tracing::info!(
                sub,
                current_usage = current.current_count,
                max_files_allowed = current.max_files_allowed,
                "upload limit reached"
            );
            Err(QuotaFailure {
                error,
                current: Some(QuotaResponse::snapshot(&current)),
            })
        }
        Decision::Applied(outcome) if outcome.incremented => {
            let s = outcome.state;
            tracing::info!(
                sub,
                total_files_uploaded = s.current_count,
                pdf2pdf = s.pdf_count,
                pdf2html = s.html_count,
                "usage incremented"
            );
            Ok(QuotaResponse::incremented(&s))
        }
        Decision::Applied(outcome) => {
            let s = outcome.state;
            tracing::debug!(sub, current_usage = s.current_count, max_files_allowed = s.max_files_allowed, "quota checked");
            Ok(QuotaResponse::snapshot(&s))
        }
    }
}
