//! First-sign-in profile update.

use serde::{Deserialize, Serialize};

use quotagate_core::attributes::{Attribute, AttributeUpdate};
use quotagate_core::error::{QuotaGateError, Result};

use crate::app_state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ProfileUpdateRequest {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileUpdateReply {
    pub message: String,
}

fn present(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

pub async fn update_first_sign_in(state: &AppState, req: ProfileUpdateRequest) -> Result<ProfileUpdateReply> {
    let fields = [
        ("sub", present(&req.sub)),
        ("organization", present(&req.organization)),
        ("country", present(&req.country)),
        ("state", present(&req.state)),
        ("city", present(&req.city)),
    ];
    let missing: Vec<&str> = fields.iter().filter(|(_, v)| v.is_none()).map(|(k, _)| *k).collect();

    let [(_, Some(sub)), (_, Some(organization)), (_, Some(country)), (_, Some(region)), (_, Some(city))] = fields
    else {
        return Err(QuotaGateError::InvalidInput(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    };

    let updates = [
        AttributeUpdate::new(Attribute::Organization, organization),
        AttributeUpdate::new(Attribute::FirstSignIn, "false"),
        AttributeUpdate::new(Attribute::Country, country),
        AttributeUpdate::new(Attribute::State, region),
        AttributeUpdate::new(Attribute::City, city),
    ];

    let dir = state.directory();
    let pool = state.pool_id();
    let updates = updates.as_slice();
    state
        .retry()
        .run("update_user_attributes", move || dir.update_user_attributes(pool, sub, updates))
        .await
        .map_err(|e| match e {
            QuotaGateError::NotFound(_) => QuotaGateError::NotFound("User not found during update.".into()),
            QuotaGateError::InvalidInput(_) => QuotaGateError::InvalidInput("Invalid parameters provided.".into()),
            other => other,
        })?;

    tracing::info!(sub, "profile attributes updated");
    Ok(ProfileUpdateReply {
        message: "User attributes updated successfully.".into(),
    })
}
