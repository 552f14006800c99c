//! Identity platform lifecycle event envelope.
//!
//! Handlers mutate and return the same object, so every field we do not model
//! is kept in `extra` and written back unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use quotagate_core::attributes::{Attribute, Attributes};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleEvent {
    pub trigger_source: String,
    #[serde(default)]
    pub user_pool_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub request: EventRequest,
    #[serde(default)]
    pub response: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LifecycleEvent {
    /// `PreSignUp_SignUp` -> `PreSignUp`.
    pub fn trigger_family(&self) -> &str {
        self.trigger_source
            .split_once('_')
            .map(|(family, _)| family)
            .unwrap_or(&self.trigger_source)
    }

    pub fn email(&self) -> &str {
        self.request.user_attributes.get(Attribute::Email).unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRequest {
    #[serde(default)]
    pub user_attributes: Attributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_context_data: Option<UserContextData>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContextData {
    #[serde(default)]
    pub source_ip: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
