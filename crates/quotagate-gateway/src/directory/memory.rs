//! In-process directory backend.
//!
//! Backs the binary in development and the integration tests. Throttling can
//! be injected to exercise the retry path.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use quotagate_core::attributes::{Attribute, AttributeUpdate, Attributes};

use super::{DirectoryError, DirectoryResult, DirectoryUser, IdentityDirectory, UserPage};
use crate::config::schema::MAX_PAGE_SIZE;

#[derive(Debug, Default)]
struct PoolState {
    users: BTreeMap<String, StoredUser>,
    groups: BTreeSet<String>,
}

impl PoolState {
    /// Username for a username or sub.
    fn resolve(&self, user: &str) -> Option<String> {
        if self.users.contains_key(user) {
            return Some(user.to_string());
        }
        self.users
            .iter()
            .find(|(_, u)| u.attributes.get(Attribute::Sub) == Some(user))
            .map(|(name, _)| name.clone())
    }
}

#[derive(Debug, Default)]
struct StoredUser {
    attributes: Attributes,
    groups: BTreeSet<String>,
    attribute_writes: u64,
}

#[derive(Default)]
pub struct InMemoryDirectory {
    pools: DashMap<String, PoolState>,
    throttle_remaining: AtomicU32,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_pool(&self, pool_id: impl Into<String>) {
        self.pools.entry(pool_id.into()).or_default();
    }

    pub fn create_group(&self, pool_id: &str, group: impl Into<String>) {
        self.pools
            .entry(pool_id.to_string())
            .or_default()
            .groups
            .insert(group.into());
    }

    /// Insert or replace a user. A missing `sub` attribute defaults to the username.
    pub fn insert_user(&self, pool_id: &str, username: impl Into<String>, mut attributes: Attributes) {
        let username = username.into();
        if attributes.get(Attribute::Sub).is_none() {
            attributes.set(Attribute::Sub.as_str(), username.clone());
        }
        self.pools.entry(pool_id.to_string()).or_default().users.insert(
            username,
            StoredUser {
                attributes,
                ..Default::default()
            },
        );
    }

    /// Make the next `n` directory calls fail with `TooManyRequests`.
    pub fn throttle_next(&self, n: u32) {
        self.throttle_remaining.store(n, Ordering::SeqCst);
    }

    pub fn user_attributes(&self, pool_id: &str, user: &str) -> Option<Attributes> {
        let pool = self.pools.get(pool_id)?;
        let name = pool.resolve(user)?;
        pool.users.get(&name).map(|u| u.attributes.clone())
    }

    pub fn user_groups(&self, pool_id: &str, user: &str) -> Option<Vec<String>> {
        let pool = self.pools.get(pool_id)?;
        let name = pool.resolve(user)?;
        pool.users.get(&name).map(|u| u.groups.iter().cloned().collect())
    }

    /// Number of successful `update_user_attributes` calls for the user.
    pub fn attribute_writes(&self, pool_id: &str, user: &str) -> u64 {
        self.pools
            .get(pool_id)
            .and_then(|pool| {
                let name = pool.resolve(user)?;
                pool.users.get(&name).map(|u| u.attribute_writes)
            })
            .unwrap_or(0)
    }

    fn take_throttle(&self) -> DirectoryResult<()> {
        let throttled = self
            .throttle_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if throttled {
            Err(DirectoryError::TooManyRequests)
        } else {
            Ok(())
        }
    }
}

fn to_user(username: &str, stored: &StoredUser) -> DirectoryUser {
    DirectoryUser {
        username: username.to_string(),
        attributes: stored.attributes.clone(),
    }
}

#[async_trait]
impl IdentityDirectory for InMemoryDirectory {
    async fn get_user(&self, pool_id: &str, user: &str) -> DirectoryResult<DirectoryUser> {
        self.take_throttle()?;
        let pool = self
            .pools
            .get(pool_id)
            .ok_or_else(|| DirectoryError::PoolNotFound(pool_id.to_string()))?;
        let name = pool
            .resolve(user)
            .ok_or_else(|| DirectoryError::UserNotFound(user.to_string()))?;
        pool.users
            .get(&name)
            .map(|u| to_user(&name, u))
            .ok_or_else(|| DirectoryError::UserNotFound(user.to_string()))
    }

    async fn list_users_in_group(
        &self,
        pool_id: &str,
        group: &str,
        limit: usize,
        next_token: Option<&str>,
    ) -> DirectoryResult<UserPage> {
        self.take_throttle()?;
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(DirectoryError::InvalidParameter(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        let pool = self
            .pools
            .get(pool_id)
            .ok_or_else(|| DirectoryError::PoolNotFound(pool_id.to_string()))?;
        if !pool.groups.contains(group) {
            return Err(DirectoryError::GroupNotFound(group.to_string()));
        }

        let offset = match next_token {
            Some(t) => t
                .parse::<usize>()
                .map_err(|_| DirectoryError::InvalidParameter(format!("invalid next token: {t}")))?,
            None => 0,
        };

        let members: Vec<(&String, &StoredUser)> = pool
            .users
            .iter()
            .filter(|(_, u)| u.groups.contains(group))
            .collect();

        let users = members
            .iter()
            .skip(offset)
            .take(limit)
            .map(|(name, u)| to_user(name, u))
            .collect();
        let end = offset.saturating_add(limit);
        let next_token = (end < members.len()).then(|| end.to_string());

        Ok(UserPage { users, next_token })
    }

    async fn list_groups_for_user(&self, pool_id: &str, user: &str) -> DirectoryResult<Vec<String>> {
        self.take_throttle()?;
        let pool = self
            .pools
            .get(pool_id)
            .ok_or_else(|| DirectoryError::PoolNotFound(pool_id.to_string()))?;
        let name = pool
            .resolve(user)
            .ok_or_else(|| DirectoryError::UserNotFound(user.to_string()))?;
        Ok(pool
            .users
            .get(&name)
            .map(|u| u.groups.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn add_user_to_group(&self, pool_id: &str, user: &str, group: &str) -> DirectoryResult<()> {
        self.take_throttle()?;
        let mut pool = self
            .pools
            .get_mut(pool_id)
            .ok_or_else(|| DirectoryError::PoolNotFound(pool_id.to_string()))?;
        if !pool.groups.contains(group) {
            return Err(DirectoryError::GroupNotFound(group.to_string()));
        }
        let name = pool
            .resolve(user)
            .ok_or_else(|| DirectoryError::UserNotFound(user.to_string()))?;
        if let Some(u) = pool.users.get_mut(&name) {
            u.groups.insert(group.to_string());
        }
        Ok(())
    }

    async fn update_user_attributes(
        &self,
        pool_id: &str,
        user: &str,
        updates: &[AttributeUpdate],
    ) -> DirectoryResult<()> {
        self.take_throttle()?;
        if let Some(bad) = updates.iter().find(|u| u.name.trim().is_empty() || u.name == Attribute::Sub.as_str()) {
            return Err(DirectoryError::InvalidParameter(format!(
                "attribute cannot be updated: {:?}",
                bad.name
            )));
        }
        let mut pool = self
            .pools
            .get_mut(pool_id)
            .ok_or_else(|| DirectoryError::PoolNotFound(pool_id.to_string()))?;
        let name = pool
            .resolve(user)
            .ok_or_else(|| DirectoryError::UserNotFound(user.to_string()))?;
        if let Some(u) = pool.users.get_mut(&name) {
            u.attributes.apply(updates);
            u.attribute_writes += 1;
        }
        Ok(())
    }
}
