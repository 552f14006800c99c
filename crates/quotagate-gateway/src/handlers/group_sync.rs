//! Group membership → quota attribute sync.
//!
//! Two entry shapes share one route:
//! - membership-change notifications emitted by the directory's audit trail
//!   (`AdminAddUserToGroup` / `AdminRemoveUserFromGroup`), which resolve the
//!   user's highest-precedence group;
//! - manual requests naming a group (and optionally one user), which apply
//!   that group's policy directly.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use quotagate_core::error::{QuotaGateError, Result};

use crate::app_state::AppState;
use crate::directory::DirectoryUser;

pub const EVENT_SOURCE: &str = "aws.cognito-idp";
pub const EVENT_DETAIL_TYPE: &str = "AWS API Call via CloudTrail";
pub const MEMBERSHIP_EVENTS: [&str; 2] = ["AdminAddUserToGroup", "AdminRemoveUserFromGroup"];

#[derive(Debug, Deserialize)]
pub struct MembershipChangeEvent {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(rename = "detail-type", default)]
    pub detail_type: Option<String>,
    #[serde(default)]
    pub detail: MembershipChangeDetail,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipChangeDetail {
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub request_parameters: RequestParameters,
    #[serde(default)]
    pub additional_event_data: AdditionalEventData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestParameters {
    #[serde(default)]
    pub user_pool_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdditionalEventData {
    #[serde(default)]
    pub sub: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManualSyncRequest {
    pub group: String,
    #[serde(default)]
    pub sub: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    UpdateAll,
    SingleUser,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkSyncReport {
    pub mode: SyncMode,
    pub message: String,
    pub total_users_processed: usize,
    pub successful_updates: usize,
    pub failed_updates: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum GroupSyncReply {
    Event { message: String },
    Manual(BulkSyncReport),
}

/// True when `body` carries the provenance fields of a membership-change
/// notification.
pub fn is_membership_change(body: &Value) -> bool {
    body.get("source").and_then(Value::as_str) == Some(EVENT_SOURCE)
        && body.get("detail-type").and_then(Value::as_str) == Some(EVENT_DETAIL_TYPE)
        && body.get("detail").is_some()
}

pub async fn handle_group_sync(state: &AppState, body: Value) -> Result<GroupSyncReply> {
    if is_membership_change(&body) {
        tracing::info!("membership-change notification");
        let event: MembershipChangeEvent = serde_json::from_value(body)
            .map_err(|e| QuotaGateError::InvalidInput(format!("invalid membership-change event: {e}")))?;
        return sync_from_event(state, event).await;
    }

    tracing::info!("manual group sync");
    let req: ManualSyncRequest = serde_json::from_value(body)
        .map_err(|e| QuotaGateError::InvalidInput(format!("invalid group sync request: {e}")))?;
    manual_sync(state, req).await.map(GroupSyncReply::Manual)
}

pub async fn sync_from_event(state: &AppState, event: MembershipChangeEvent) -> Result<GroupSyncReply> {
    let detail = event.detail;
    let event_name = detail.event_name.unwrap_or_default();
    let pool_id = detail.request_parameters.user_pool_id;
    let sub = detail
        .additional_event_data
        .sub
        .or(detail.request_parameters.username);

    let (Some(pool_id), Some(sub)) = (pool_id.filter(|p| !p.is_empty()), sub.filter(|s| !s.is_empty())) else {
        return Err(QuotaGateError::InvalidInput(
            "Missing userPoolId or username in event detail.".into(),
        ));
    };

    if pool_id != state.pool_id() {
        tracing::info!(%pool_id, "event for a different user pool");
        return Ok(GroupSyncReply::Event {
            message: "Event is for a different user pool; skipping.".into(),
        });
    }
    if !MEMBERSHIP_EVENTS.contains(&event_name.as_str()) {
        tracing::info!(%event_name, "not a membership change");
        return Ok(GroupSyncReply::Event {
            message: format!("Event {event_name} is not a membership change; skipping."),
        });
    }

    let group = sync_user(state, &sub).await?;
    let message = format!("[{event_name}] Succeeded updating user '{sub}' with group '{group}' attributes.");
    tracing::info!(%event_name, %sub, %group, "group attributes applied");
    Ok(GroupSyncReply::Event { message })
}

/// Re-resolve `user`'s effective policy from current memberships and write it.
/// Returns the group whose policy was applied.
pub async fn sync_user(state: &AppState, user: &str) -> Result<String> {
    let dir = state.directory();
    let pool = state.pool_id();
    let retry = state.retry();

    let found = retry
        .run("get_user", move || dir.get_user(pool, user))
        .await
        .map_err(|e| match e {
            QuotaGateError::NotFound(_) => {
                QuotaGateError::NotFound(format!("User with sub/username '{user}' not found in user pool."))
            }
            other => other,
        })?;
    let username = found.username.as_str();

    let groups = retry
        .run("list_groups_for_user", move || dir.list_groups_for_user(pool, username))
        .await?;

    let resolution = state.policies().resolve(&groups);
    if !resolution.matched {
        tracing::debug!(user, ?groups, fallback = resolution.group, "no precedence group matched");
    }

    let updates = resolution.policy.sync_attributes();
    let updates = updates.as_slice();
    retry
        .run("update_user_attributes", move || dir.update_user_attributes(pool, username, updates))
        .await?;

    Ok(resolution.group.to_string())
}

pub async fn manual_sync(state: &AppState, req: ManualSyncRequest) -> Result<BulkSyncReport> {
    let group = req.group.trim();
    if group.is_empty() {
        return Err(QuotaGateError::InvalidInput("Parameter 'group' must not be empty.".into()));
    }

    let (mode, users) = match req.sub.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(sub) => (SyncMode::SingleUser, vec![single_member(state, group, sub).await?]),
        None => (SyncMode::UpdateAll, all_members(state, group).await?),
    };

    if users.is_empty() {
        return Ok(BulkSyncReport {
            mode,
            message: format!("No users found in group '{group}' to update."),
            total_users_processed: 0,
            successful_updates: 0,
            failed_updates: Vec::new(),
        });
    }
    tracing::info!(group, users = users.len(), "applying group policy");

    let dir = state.directory();
    let pool = state.pool_id();
    let updates = state.policies().policy_for(group).sync_attributes();
    let updates = updates.as_slice();

    let mut successful = 0usize;
    let mut failed = Vec::new();
    for user in &users {
        let username = user.username.as_str();
        let res = state
            .retry()
            .run("update_user_attributes", move || dir.update_user_attributes(pool, username, updates))
            .await;
        match res {
            Ok(()) => successful += 1,
            Err(e) => {
                let id = user.sub().unwrap_or(username).to_string();
                tracing::warn!(user = %id, error = %e, "failed to update user");
                failed.push(id);
            }
        }
    }

    Ok(BulkSyncReport {
        mode,
        message: "User attribute updates completed.".into(),
        total_users_processed: users.len(),
        successful_updates: successful,
        failed_updates: failed,
    })
}

async fn single_member(state: &AppState, group: &str, sub: &str) -> Result<DirectoryUser> {
    let dir = state.directory();
    let pool = state.pool_id();

    let user = state
        .retry()
        .run("get_user", move || dir.get_user(pool, sub))
        .await
        .map_err(|e| match e {
            QuotaGateError::NotFound(_) => QuotaGateError::NotFound(format!("User with sub '{sub}' not found.")),
            other => other,
        })?;

    let username = user.username.as_str();
    let groups = state
        .retry()
        .run("list_groups_for_user", move || dir.list_groups_for_user(pool, username))
        .await?;
    if !groups.iter().any(|g| g == group) {
        return Err(QuotaGateError::InvalidInput(format!(
            "User with sub '{sub}' is not a member of group '{group}'."
        )));
    }
    Ok(user)
}

async fn all_members(state: &AppState, group: &str) -> Result<Vec<DirectoryUser>> {
    let dir = state.directory();
    let pool = state.pool_id();
    let page_size = state.cfg().directory.page_size;

    let mut users = Vec::new();
    let mut seen = HashSet::new();
    let mut next: Option<String> = None;
    loop {
        let token = next.as_deref();
        let page = state
            .retry()
            .run("list_users_in_group", move || dir.list_users_in_group(pool, group, page_size, token))
            .await?;
        users.extend(page.users);
        match page.next_token {
            Some(t) if !seen.insert(t.clone()) => {
                tracing::error!(group, token = %t, "directory repeated a pagination token");
                return Err(QuotaGateError::Unexpected(format!(
                    "Listing users of group '{group}' did not terminate."
                )));
            }
            Some(t) => next = Some(t),
            None => break,
        }
    }
    Ok(users)
}
