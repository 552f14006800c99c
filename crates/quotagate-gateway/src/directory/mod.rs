//! Identity directory seam.
//!
//! Handlers only talk to the directory through [`IdentityDirectory`]. All
//! attribute values cross this boundary as text.

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use quotagate_core::attributes::{Attribute, AttributeUpdate, Attributes};
use quotagate_core::error::QuotaGateError;

pub use memory::InMemoryDirectory;

/// Errors reported by a directory backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("user pool not found: {0}")]
    PoolNotFound(String),
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("group not found: {0}")]
    GroupNotFound(String),
    #[error("too many requests")]
    TooManyRequests,
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("directory service error: {0}")]
    Service(String),
}

impl From<DirectoryError> for QuotaGateError {
    fn from(e: DirectoryError) -> Self {
        match e {
            DirectoryError::PoolNotFound(_)
            | DirectoryError::UserNotFound(_)
            | DirectoryError::GroupNotFound(_) => QuotaGateError::NotFound(e.to_string()),
            DirectoryError::TooManyRequests => QuotaGateError::Throttled(e.to_string()),
            DirectoryError::InvalidParameter(_) => QuotaGateError::InvalidInput(e.to_string()),
            DirectoryError::Service(_) => QuotaGateError::Unexpected(e.to_string()),
        }
    }
}

pub type DirectoryResult<T> = std::result::Result<T, DirectoryError>;

/// A user as returned by the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryUser {
    pub username: String,
    pub attributes: Attributes,
}

impl DirectoryUser {
    pub fn sub(&self) -> Option<&str> {
        self.attributes.get(Attribute::Sub)
    }
}

/// One page of a paginated listing.
#[derive(Debug, Clone, Default)]
pub struct UserPage {
    pub users: Vec<DirectoryUser>,
    pub next_token: Option<String>,
}

/// Operations consumed from the external identity directory.
///
/// `user` accepts either the username or the `sub` alias.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn get_user(&self, pool_id: &str, user: &str) -> DirectoryResult<DirectoryUser>;

    async fn list_users_in_group(
        &self,
        pool_id: &str,
        group: &str,
        limit: usize,
        next_token: Option<&str>,
    ) -> DirectoryResult<UserPage>;

    async fn list_groups_for_user(&self, pool_id: &str, user: &str) -> DirectoryResult<Vec<String>>;

    async fn add_user_to_group(&self, pool_id: &str, user: &str, group: &str) -> DirectoryResult<()>;

    /// Applies every update or none of them.
    async fn update_user_attributes(
        &self,
        pool_id: &str,
        user: &str,
        updates: &[AttributeUpdate],
    ) -> DirectoryResult<()>;
}
