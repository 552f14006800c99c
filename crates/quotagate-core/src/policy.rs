//! Group precedence resolution and attribute policy mapping.
//!
//! A user may belong to any number of groups. Exactly one policy applies: the
//! one of the first precedence entry the user is a member of, or the fallback
//! when none match. Policies are never merged.

use crate::attributes::{Attribute, AttributeUpdate};
use crate::error::{QuotaGateError, Result};

/// Quota limits (and optional initial usage counter) applied to a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub max_files_allowed: u32,
    pub max_pages_allowed: u32,
    pub max_size_allowed_mb: u32,
    /// When set, group sync also resets `total_files_uploaded` to this value.
    pub initial_files_uploaded: Option<u32>,
}

impl Policy {
    pub fn new(max_files_allowed: u32, max_pages_allowed: u32, max_size_allowed_mb: u32) -> Self {
        Self {
            max_files_allowed,
            max_pages_allowed,
            max_size_allowed_mb,
            initial_files_uploaded: None,
        }
    }

    pub fn with_initial_files_uploaded(mut self, n: u32) -> Self {
        self.initial_files_uploaded = Some(n);
        self
    }

    pub fn validate(&self, group: &str) -> Result<()> {
        if self.max_files_allowed == 0 || self.max_pages_allowed == 0 || self.max_size_allowed_mb == 0 {
            return Err(QuotaGateError::InvalidInput(format!(
                "policy for group {group} must have positive limits"
            )));
        }
        Ok(())
    }

    /// Attribute set written on group sync.
    pub fn sync_attributes(&self) -> Vec<AttributeUpdate> {
        let mut out = vec![
            AttributeUpdate::new(Attribute::MaxFilesAllowed, self.max_files_allowed),
            AttributeUpdate::new(Attribute::MaxPagesAllowed, self.max_pages_allowed),
            AttributeUpdate::new(Attribute::MaxSizeAllowedMb, self.max_size_allowed_mb),
        ];
        if let Some(n) = self.initial_files_uploaded {
            out.push(AttributeUpdate::new(Attribute::TotalFilesUploaded, n));
        }
        out
    }

    /// Attribute set written when an account is first confirmed.
    pub fn initial_attributes(&self) -> Vec<AttributeUpdate> {
        vec![
            AttributeUpdate::new(Attribute::FirstSignIn, "true"),
            AttributeUpdate::new(
                Attribute::TotalFilesUploaded,
                self.initial_files_uploaded.unwrap_or(0),
            ),
            AttributeUpdate::new(Attribute::MaxFilesAllowed, self.max_files_allowed),
            AttributeUpdate::new(Attribute::MaxPagesAllowed, self.max_pages_allowed),
            AttributeUpdate::new(Attribute::MaxSizeAllowedMb, self.max_size_allowed_mb),
        ]
    }
}

/// A named group and its policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupPolicy {
    pub group: String,
    pub policy: Policy,
}

/// Outcome of [`PolicyTable::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution<'a> {
    /// Winning group, or the fallback group when nothing matched.
    pub group: &'a str,
    pub policy: &'a Policy,
    /// False when the fallback was used.
    pub matched: bool,
}

/// Precedence-ordered policies plus the fallback.
/// Construct once at startup, then share via Arc.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    precedence: Vec<GroupPolicy>,
    fallback: GroupPolicy,
}

impl PolicyTable {
    /// `precedence` is highest first. Duplicate group names keep their first
    /// position.
    pub fn new(precedence: Vec<GroupPolicy>, fallback: GroupPolicy) -> Result<Self> {
        fallback.policy.validate(&fallback.group)?;
        for gp in &precedence {
            gp.policy.validate(&gp.group)?;
        }
        let mut deduped: Vec<GroupPolicy> = Vec::with_capacity(precedence.len());
        for gp in precedence {
            if !deduped.iter().any(|d| d.group == gp.group) {
                deduped.push(gp);
            }
        }
        Ok(Self {
            precedence: deduped,
            fallback,
        })
    }

    /// Highest-precedence group the user belongs to, or the fallback.
    pub fn resolve<S: AsRef<str>>(&self, memberships: &[S]) -> Resolution<'_> {
        for gp in &self.precedence {
            if memberships.iter().any(|m| m.as_ref() == gp.group) {
                return Resolution {
                    group: &gp.group,
                    policy: &gp.policy,
                    matched: true,
                };
            }
        }
        Resolution {
            group: &self.fallback.group,
            policy: &self.fallback.policy,
            matched: false,
        }
    }

    /// Policy configured for `group`, falling back when it has none.
    pub fn policy_for(&self, group: &str) -> &Policy {
        if group == self.fallback.group {
            return &self.fallback.policy;
        }
        self.precedence
            .iter()
            .find(|gp| gp.group == group)
            .map(|gp| &gp.policy)
            .unwrap_or(&self.fallback.policy)
    }

    pub fn fallback(&self) -> &GroupPolicy {
        &self.fallback
    }

    pub fn precedence(&self) -> impl Iterator<Item = &str> {
        self.precedence.iter().map(|gp| gp.group.as_str())
    }
}
