//! Directory attribute names and the text boundary.
//!
//! The directory stores every attribute as text. Numeric attributes are parsed
//! once here; unparsable or missing values fall back to a caller-supplied
//! default instead of failing the request.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Attributes read or written by quotagate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Sub,
    Email,
    TotalFilesUploaded,
    MaxFilesAllowed,
    MaxPagesAllowed,
    MaxSizeAllowedMb,
    Pdf2Pdf,
    Pdf2Html,
    FirstSignIn,
    Organization,
    Country,
    State,
    City,
}

impl Attribute {
    /// Name as stored in the directory.
    pub fn as_str(self) -> &'static str {
        match self {
            Attribute::Sub => "sub",
            Attribute::Email => "email",
            Attribute::TotalFilesUploaded => "custom:total_files_uploaded",
            Attribute::MaxFilesAllowed => "custom:max_files_allowed",
            Attribute::MaxPagesAllowed => "custom:max_pages_allowed",
            Attribute::MaxSizeAllowedMb => "custom:max_size_allowed_MB",
            Attribute::Pdf2Pdf => "custom:pdf2pdf",
            Attribute::Pdf2Html => "custom:pdf2html",
            Attribute::FirstSignIn => "custom:first_sign_in",
            Attribute::Organization => "custom:organization",
            Attribute::Country => "custom:country",
            Attribute::State => "custom:state",
            Attribute::City => "custom:city",
        }
    }
}

/// One name/value pair of a batched attribute write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeUpdate {
    pub name: String,
    pub value: String,
}

impl AttributeUpdate {
    pub fn new(attr: Attribute, value: impl ToString) -> Self {
        Self {
            name: attr.as_str().to_string(),
            value: value.to_string(),
        }
    }
}

/// Text attribute set of one directory user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, String>);

impl Attributes {
    pub fn get(&self, attr: Attribute) -> Option<&str> {
        self.get_raw(attr.as_str())
    }

    pub fn get_raw(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    /// Apply a batched write in order.
    pub fn apply(&mut self, updates: &[AttributeUpdate]) {
        for u in updates {
            self.0.insert(u.name.clone(), u.value.clone());
        }
    }

    /// Parse a numeric attribute, falling back to `default` when it is missing
    /// or not a non-negative integer.
    pub fn parse_u32(&self, attr: Attribute, default: u32) -> u32 {
        match self.get(attr) {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(v) => v,
                Err(_) => {
                    tracing::warn!(attribute = attr.as_str(), value = raw, default, "unparsable attribute, using default");
                    default
                }
            },
            None => default,
        }
    }
}

impl<K, V> FromIterator<(K, V)> for Attributes
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
