#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use common::{attrs, harness, seeded_directory, state_over, Harness, POOL};
use quotagate_core::attributes::{Attribute, AttributeUpdate};
use quotagate_core::error::QuotaGateError;
use quotagate_gateway::directory::{
    DirectoryError, DirectoryResult, DirectoryUser, IdentityDirectory, InMemoryDirectory, UserPage,
};
use quotagate_gateway::handlers::group_sync::{
    handle_group_sync, is_membership_change, BulkSyncReport, GroupSyncReply, SyncMode,
};

async fn member(h: &Harness, username: &str, groups: &[&str]) {
    let sub = format!("sub-{username}");
    h.dir.insert_user(POOL, username, attrs(&[("sub", sub.as_str())]));
    for g in groups {
        h.dir.add_user_to_group(POOL, username, g).await.unwrap();
    }
}

fn membership_event(event_name: &str, pool: &str, sub: &str) -> serde_json::Value {
    json!({
        "source": "aws.cognito-idp",
        "detail-type": "AWS API Call via CloudTrail",
        "detail": {
            "eventName": event_name,
            "requestParameters": { "userPoolId": pool, "groupName": "AdminUsers", "username": sub },
            "additionalEventData": { "sub": sub }
        }
    })
}

fn limits(h: &Harness, user: &str) -> (String, String, String) {
    let a = h.dir.user_attributes(POOL, user).unwrap();
    let get = |attr| a.get(attr).unwrap_or("").to_string();
    (
        get(Attribute::MaxFilesAllowed),
        get(Attribute::MaxPagesAllowed),
        get(Attribute::MaxSizeAllowedMb),
    )
}

#[test]
fn provenance_detection() {
    assert!(is_membership_change(&membership_event("AdminAddUserToGroup", POOL, "x")));
    assert!(!is_membership_change(&json!({ "group": "AdminUsers" })));
    assert!(!is_membership_change(&json!({ "source": "aws.cognito-idp", "detail": {} })));
}

#[tokio::test]
async fn membership_event_applies_highest_precedence_group() {
    let h = harness();
    member(&h, "carol", &["DefaultUsers", "AdminUsers"]).await;

    let reply = handle_group_sync(&h.state, membership_event("AdminAddUserToGroup", POOL, "sub-carol"))
        .await
        .expect("synced");
    assert_eq!(
        reply,
        GroupSyncReply::Event {
            message: "[AdminAddUserToGroup] Succeeded updating user 'sub-carol' with group 'AdminUsers' attributes."
                .into()
        }
    );
    assert_eq!(limits(&h, "carol"), ("100".into(), "2500".into(), "1000".into()));
}

#[tokio::test]
async fn removal_falls_back_to_default_policy() {
    let h = harness();
    member(&h, "dave", &[]).await;
    h.dir
        .update_user_attributes(
            POOL,
            "dave",
            &[AttributeUpdate::new(Attribute::MaxFilesAllowed, 100)],
        )
        .await
        .unwrap();

    handle_group_sync(&h.state, membership_event("AdminRemoveUserFromGroup", POOL, "sub-dave"))
        .await
        .expect("synced");
    assert_eq!(limits(&h, "dave"), ("25".into(), "25".into(), "25".into()));
}

#[tokio::test]
async fn event_guards() {
    let h = harness();
    member(&h, "erin", &["AdminUsers"]).await;

    let other_pool = handle_group_sync(&h.state, membership_event("AdminAddUserToGroup", "pool-2", "sub-erin"))
        .await
        .expect("skipped");
    assert!(matches!(other_pool, GroupSyncReply::Event { .. }));

    handle_group_sync(&h.state, membership_event("CreateGroup", POOL, "sub-erin"))
        .await
        .expect("skipped");
    assert_eq!(h.dir.attribute_writes(POOL, "erin"), 0);

    let err = handle_group_sync(&h.state, membership_event("AdminAddUserToGroup", POOL, ""))
        .await
        .expect_err("missing sub");
    assert_eq!(
        err,
        QuotaGateError::InvalidInput("Missing userPoolId or username in event detail.".into())
    );
}

#[tokio::test]
async fn manual_update_all_pages_through_members() {
    let h = harness();
    for name in ["u1", "u2", "u3", "u4", "u5"] {
        member(&h, name, &["AdminUsers"]).await;
    }
    member(&h, "outsider", &["DefaultUsers"]).await;

    let reply = handle_group_sync(&h.state, json!({ "group": "AdminUsers" }))
        .await
        .expect("synced");
    assert_eq!(
        reply,
        GroupSyncReply::Manual(BulkSyncReport {
            mode: SyncMode::UpdateAll,
            message: "User attribute updates completed.".into(),
            total_users_processed: 5,
            successful_updates: 5,
            failed_updates: vec![],
        })
    );
    for name in ["u1", "u2", "u3", "u4", "u5"] {
        assert_eq!(limits(&h, name).0, "100");
    }
    assert_eq!(h.dir.attribute_writes(POOL, "outsider"), 0);
}

#[tokio::test]
async fn manual_single_user() {
    let h = harness();
    member(&h, "frank", &["DefaultUsers"]).await;

    let reply = handle_group_sync(&h.state, json!({ "group": "DefaultUsers", "sub": "sub-frank" }))
        .await
        .expect("synced");
    let GroupSyncReply::Manual(report) = reply else {
        panic!("expected manual report");
    };
    assert_eq!(report.mode, SyncMode::SingleUser);
    assert_eq!(report.successful_updates, 1);
    assert_eq!(limits(&h, "frank").0, "25");

    let err = handle_group_sync(&h.state, json!({ "group": "AdminUsers", "sub": "sub-frank" }))
        .await
        .expect_err("not a member");
    assert_eq!(
        err,
        QuotaGateError::InvalidInput("User with sub 'sub-frank' is not a member of group 'AdminUsers'.".into())
    );

    let err = handle_group_sync(&h.state, json!({ "group": "AdminUsers", "sub": "ghost" }))
        .await
        .expect_err("unknown");
    assert_eq!(err, QuotaGateError::NotFound("User with sub 'ghost' not found.".into()));
}

#[tokio::test]
async fn manual_empty_group_and_bad_requests() {
    let h = harness();

    let reply = handle_group_sync(&h.state, json!({ "group": "AdminUsers" }))
        .await
        .expect("empty");
    let GroupSyncReply::Manual(report) = reply else {
        panic!("expected manual report");
    };
    assert_eq!(report.message, "No users found in group 'AdminUsers' to update.");
    assert_eq!(report.total_users_processed, 0);

    let err = handle_group_sync(&h.state, json!({ "group": "Nobody" }))
        .await
        .expect_err("missing group");
    assert!(matches!(err, QuotaGateError::NotFound(_)));

    let err = handle_group_sync(&h.state, json!({ "grp": "AdminUsers" }))
        .await
        .expect_err("unknown field");
    assert!(matches!(err, QuotaGateError::InvalidInput(_)));
}

/// Backend that throttles every write for one user, and can be told to hand
/// back the same pagination token forever.
struct Misbehaving {
    inner: Arc<InMemoryDirectory>,
    throttled_user: &'static str,
    stuck_token: bool,
}

#[async_trait]
impl IdentityDirectory for Misbehaving {
    async fn get_user(&self, pool_id: &str, user: &str) -> DirectoryResult<DirectoryUser> {
        self.inner.get_user(pool_id, user).await
    }

    async fn list_users_in_group(
        &self,
        pool_id: &str,
        group: &str,
        limit: usize,
        next_token: Option<&str>,
    ) -> DirectoryResult<UserPage> {
        let mut page = self.inner.list_users_in_group(pool_id, group, limit, next_token).await?;
        if self.stuck_token {
            page.next_token = Some("0".into());
        }
        Ok(page)
    }

    async fn list_groups_for_user(&self, pool_id: &str, user: &str) -> DirectoryResult<Vec<String>> {
        self.inner.list_groups_for_user(pool_id, user).await
    }

    async fn add_user_to_group(&self, pool_id: &str, user: &str, group: &str) -> DirectoryResult<()> {
        self.inner.add_user_to_group(pool_id, user, group).await
    }

    async fn update_user_attributes(
        &self,
        pool_id: &str,
        user: &str,
        updates: &[AttributeUpdate],
    ) -> DirectoryResult<()> {
        if user == self.throttled_user {
            return Err(DirectoryError::TooManyRequests);
        }
        self.inner.update_user_attributes(pool_id, user, updates).await
    }
}

async fn admin_members(dir: &InMemoryDirectory, names: &[&str]) {
    for name in names {
        let sub = format!("sub-{name}");
        dir.insert_user(POOL, *name, attrs(&[("sub", sub.as_str())]));
        dir.add_user_to_group(POOL, name, "AdminUsers").await.unwrap();
    }
}

#[tokio::test]
async fn bulk_sync_collects_per_user_failures_after_backoff() {
    let inner = seeded_directory();
    admin_members(&inner, &["u1", "u2", "u3"]).await;
    let (state, sleeper) = state_over(Arc::new(Misbehaving {
        inner: inner.clone(),
        throttled_user: "u2",
        stuck_token: false,
    }));

    let reply = handle_group_sync(&state, json!({ "group": "AdminUsers" }))
        .await
        .expect("partial failure is not fatal");
    assert_eq!(
        reply,
        GroupSyncReply::Manual(BulkSyncReport {
            mode: SyncMode::UpdateAll,
            message: "User attribute updates completed.".into(),
            total_users_processed: 3,
            successful_updates: 2,
            failed_updates: vec!["sub-u2".into()],
        })
    );
    assert_eq!(
        sleeper.delays(),
        [1, 2, 4, 8, 16].map(Duration::from_secs).to_vec()
    );
    assert_eq!(inner.attribute_writes(POOL, "u1"), 1);
    assert_eq!(inner.attribute_writes(POOL, "u2"), 0);
    assert_eq!(inner.attribute_writes(POOL, "u3"), 1);
}

#[tokio::test]
async fn repeated_page_token_aborts_listing() {
    let inner = seeded_directory();
    admin_members(&inner, &["u1", "u2", "u3"]).await;
    let (state, _) = state_over(Arc::new(Misbehaving {
        inner: inner.clone(),
        throttled_user: "",
        stuck_token: true,
    }));

    let err = handle_group_sync(&state, json!({ "group": "AdminUsers" }))
        .await
        .expect_err("listing must terminate");
    assert!(matches!(err, QuotaGateError::Unexpected(_)));
    for name in ["u1", "u2", "u3"] {
        assert_eq!(inner.attribute_writes(POOL, name), 0);
    }
}
