use std::collections::BTreeMap;

use serde::Deserialize;
use quotagate_core::error::{QuotaGateError, Result};
use quotagate_core::network;
use quotagate_core::policy::Policy;
use quotagate_core::quota::QuotaDefaults;

/// Largest page the directory serves for list-users-in-group.
pub const MAX_PAGE_SIZE: usize = 60;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub version: u32,

    #[serde(default)]
    pub gateway: GatewaySection,

    pub directory: DirectorySection,

    pub groups: GroupsSection,

    #[serde(default)]
    pub registration: RegistrationSection,

    #[serde(default)]
    pub retry: RetrySection,

    #[serde(default)]
    pub quota: QuotaSection,

    #[serde(default)]
    pub pre_auth: PreAuthSection,
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(QuotaGateError::InvalidInput(format!(
                "unsupported config version: {}",
                self.version
            )));
        }

        self.directory.validate()?;
        self.groups.validate()?;
        self.retry.validate()?;
        self.pre_auth.validate()?;

        Ok(())
    }

    /// Environment overrides, applied before validation.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("USER_POOL_ID") {
            self.directory.user_pool_id = v;
        }
        if let Some(v) = lookup("DEFAULT_GROUP_NAME") {
            self.groups.default_group = v;
        }
        if let Some(v) = lookup("ADMIN_GROUP_NAME") {
            self.groups.admin_group = v;
        }
        if let Some(v) = lookup("QUOTAGATE_LISTEN") {
            self.gateway.listen = v;
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewaySection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectorySection {
    #[serde(default)]
    pub user_pool_id: String,

    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl DirectorySection {
    pub fn validate(&self) -> Result<()> {
        if self.user_pool_id.trim().is_empty() {
            return Err(QuotaGateError::InvalidInput(
                "directory.user_pool_id must be set (or USER_POOL_ID)".into(),
            ));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(QuotaGateError::InvalidInput(format!(
                "directory.page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(())
    }
}

fn default_page_size() -> usize {
    MAX_PAGE_SIZE
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupsSection {
    #[serde(default = "default_default_group")]
    pub default_group: String,

    #[serde(default = "default_admin_group")]
    pub admin_group: String,

    /// Highest first. Empty means `[admin_group, default_group]`.
    #[serde(default)]
    pub precedence: Vec<String>,

    pub policies: BTreeMap<String, PolicyConfig>,
}

impl GroupsSection {
    pub fn validate(&self) -> Result<()> {
        for (name, group) in [("default_group", &self.default_group), ("admin_group", &self.admin_group)] {
            if group.trim().is_empty() {
                return Err(QuotaGateError::InvalidInput(format!("groups.{name} must not be empty")));
            }
            if !self.policies.contains_key(group) {
                return Err(QuotaGateError::InvalidInput(format!(
                    "groups.policies has no entry for {name} {group}"
                )));
            }
        }
        for group in &self.precedence {
            if !self.policies.contains_key(group) {
                return Err(QuotaGateError::InvalidInput(format!(
                    "groups.precedence references group without policy: {group}"
                )));
            }
        }
        for (group, p) in &self.policies {
            p.to_policy().validate(group)?;
        }
        Ok(())
    }

    pub fn effective_precedence(&self) -> Vec<String> {
        if self.precedence.is_empty() {
            vec![self.admin_group.clone(), self.default_group.clone()]
        } else {
            self.precedence.clone()
        }
    }
}

fn default_default_group() -> String {
    "DefaultUsers".into()
}
fn default_admin_group() -> String {
    "AdminUsers".into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    pub max_files_allowed: u32,
    pub max_pages_allowed: u32,
    #[serde(alias = "max_size_allowed_MB")]
    pub max_size_allowed_mb: u32,
    /// Reset usage to this value whenever group sync applies the policy.
    #[serde(default)]
    pub initial_files_uploaded: Option<u32>,
}

impl PolicyConfig {
    pub fn to_policy(&self) -> Policy {
        Policy {
            max_files_allowed: self.max_files_allowed,
            max_pages_allowed: self.max_pages_allowed,
            max_size_allowed_mb: self.max_size_allowed_mb,
            initial_files_uploaded: self.initial_files_uploaded,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistrationSection {
    /// Empty admits every address.
    #[serde(default)]
    pub allowed_email_suffixes: Vec<String>,

    #[serde(default)]
    pub admin_emails: Vec<String>,

    #[serde(default)]
    pub admin_email_suffixes: Vec<String>,

    #[serde(default = "default_true")]
    pub auto_confirm: bool,
}

impl Default for RegistrationSection {
    fn default() -> Self {
        Self {
            allowed_email_suffixes: Vec::new(),
            admin_emails: Vec::new(),
            admin_email_suffixes: Vec::new(),
            auto_confirm: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySection {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: u32,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl RetrySection {
    pub fn validate(&self) -> Result<()> {
        if self.max_retries > 10 {
            return Err(QuotaGateError::InvalidInput(
                "retry.max_retries must be at most 10".into(),
            ));
        }
        if !(1..=60_000).contains(&self.base_delay_ms) {
            return Err(QuotaGateError::InvalidInput(
                "retry.base_delay_ms must be between 1 and 60000".into(),
            ));
        }
        if !(1..=10).contains(&self.multiplier) {
            return Err(QuotaGateError::InvalidInput(
                "retry.multiplier must be between 1 and 10".into(),
            ));
        }
        Ok(())
    }
}

fn default_max_retries() -> u32 {
    5
}
fn default_base_delay_ms() -> u64 {
    1000
}
fn default_multiplier() -> u32 {
    2
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuotaSection {
    #[serde(default)]
    pub defaults: QuotaDefaults,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PreAuthSection {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub allowed_ip_ranges: Vec<String>,
}

impl PreAuthSection {
    pub fn validate(&self) -> Result<()> {
        network::compile_ranges(&self.allowed_ip_ranges)?;
        if self.enabled && self.allowed_ip_ranges.is_empty() {
            return Err(QuotaGateError::InvalidInput(
                "pre_auth.allowed_ip_ranges must not be empty when pre_auth is enabled".into(),
            ));
        }
        Ok(())
    }
}
