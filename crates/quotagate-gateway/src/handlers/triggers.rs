//! Lifecycle trigger handlers (pre-sign-up, post-confirmation, pre-authentication).
//!
//! Returning `Err` aborts the platform's lifecycle transition.

use std::net::IpAddr;

use async_trait::async_trait;
use serde_json::Value;

use quotagate_core::error::{QuotaGateError, Result};
use quotagate_core::network;

use crate::app_state::AppState;
use crate::dispatch::{LifecycleEvent, TriggerHandler};

pub const CONFIRM_SIGN_UP: &str = "PostConfirmation_ConfirmSignUp";

/// Rejects sign-ups outside the allowed email domains.
pub struct PreSignUpHandler;

#[async_trait]
impl TriggerHandler for PreSignUpHandler {
    fn family(&self) -> &'static str {
        "PreSignUp"
    }

    async fn handle(&self, state: &AppState, mut event: LifecycleEvent) -> Result<LifecycleEvent> {
        let email = state.registration().validate_email(event.email()).map_err(|e| {
            tracing::warn!(email = event.email(), "registration rejected");
            e
        })?;
        tracing::info!(%email, "email validation passed");

        if state.cfg().registration.auto_confirm {
            event.response.insert("autoConfirmUser".into(), Value::Bool(true));
            event.response.insert("autoVerifyEmail".into(), Value::Bool(true));
        }
        Ok(event)
    }
}

/// Assigns a group and initial quota attributes on account confirmation.
pub struct PostConfirmationHandler;

#[async_trait]
impl TriggerHandler for PostConfirmationHandler {
    fn family(&self) -> &'static str {
        "PostConfirmation"
    }

    async fn handle(&self, state: &AppState, event: LifecycleEvent) -> Result<LifecycleEvent> {
        if event.trigger_source != CONFIRM_SIGN_UP {
            tracing::info!(trigger_source = %event.trigger_source, "skipping initialization");
            return Ok(event);
        }

        let email = state.registration().validate_email(event.email()).map_err(|e| {
            tracing::warn!(email = event.email(), "confirmation rejected");
            e
        })?;

        let username = event.user_name.trim();
        if username.is_empty() {
            return Err(QuotaGateError::InvalidInput("userName is required".into()));
        }
        let pool = match event.user_pool_id.trim() {
            "" => state.pool_id(),
            p => p,
        };

        let group = state.group_for(state.registration().assign(&email));
        let dir = state.directory();
        let retry = state.retry();

        retry
            .run("add_user_to_group", move || dir.add_user_to_group(pool, username, group))
            .await?;
        tracing::info!(username, group, "user added to group");

        let updates = state.policies().policy_for(group).initial_attributes();
        let updates = updates.as_slice();
        retry
            .run("update_user_attributes", move || dir.update_user_attributes(pool, username, updates))
            .await?;
        tracing::info!(username, group, "initial attributes written");

        Ok(event)
    }
}

/// Blocks sign-in from outside the allowed networks when enabled.
pub struct PreAuthenticationHandler;

#[async_trait]
impl TriggerHandler for PreAuthenticationHandler {
    fn family(&self) -> &'static str {
        "PreAuthentication"
    }

    async fn handle(&self, state: &AppState, event: LifecycleEvent) -> Result<LifecycleEvent> {
        if !state.cfg().pre_auth.enabled {
            return Ok(event);
        }

        let source_ip = event
            .request
            .user_context_data
            .as_ref()
            .and_then(|c| c.source_ip.first())
            .and_then(|s| s.trim().parse::<IpAddr>().ok());
        let Some(ip) = source_ip else {
            tracing::warn!("unable to determine source ip");
            return Err(QuotaGateError::AccessDenied(
                "Unable to verify network access. Please contact your administrator.".into(),
            ));
        };

        match network::find_match(state.ip_ranges(), ip) {
            Some(range) => {
                tracing::info!(email = event.email(), %ip, %range, "sign-in allowed");
                Ok(event)
            }
            None => {
                tracing::warn!(email = event.email(), %ip, "sign-in denied");
                Err(QuotaGateError::AccessDenied(format!(
                    "Access denied: Your IP address ({ip}) is not authorized to access this application. \
                     Please connect to your organization's VPN or network and try again."
                )))
            }
        }
    }
}
