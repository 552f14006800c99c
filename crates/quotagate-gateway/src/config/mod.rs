//! Gateway config loader (strict parsing + env overrides).

pub mod schema;

use std::fs;

use quotagate_core::error::{QuotaGateError, Result};

pub use schema::{
    DirectorySection, GatewayConfig, GatewaySection, GroupsSection, PolicyConfig, PreAuthSection,
    QuotaSection, RegistrationSection, RetrySection,
};

/// Default config path when `QUOTAGATE_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "quotagate.yaml";

/// Read `path`, apply process environment overrides, validate.
pub fn load_from_file(path: &str) -> Result<GatewayConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| QuotaGateError::Unexpected(format!("read config failed: {e}")))?;
    load_from_str_with(&s, |key| std::env::var(key).ok())
}

/// Parse and validate without consulting the environment.
pub fn load_from_str(s: &str) -> Result<GatewayConfig> {
    load_from_str_with(s, |_| None)
}

/// Parse, apply overrides from `lookup`, validate.
pub fn load_from_str_with<F>(s: &str, lookup: F) -> Result<GatewayConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut cfg: GatewayConfig = serde_yaml::from_str(s)
        .map_err(|e| QuotaGateError::InvalidInput(format!("invalid yaml: {e}")))?;
    cfg.apply_overrides(lookup);
    cfg.validate()?;
    Ok(cfg)
}
