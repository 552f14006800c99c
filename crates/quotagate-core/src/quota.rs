//! Upload quota guard.
//!
//! `check_or_increment` is pure: it never touches the directory. Callers persist
//! [`UserQuotaState::counter_attributes`] as one batched write so the three
//! counters can never diverge.

use std::str::FromStr;

use serde::Deserialize;

use crate::attributes::{Attribute, AttributeUpdate, Attributes};
use crate::error::{QuotaGateError, Result};

/// Which conversion an increment is charged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionKind {
    Pdf,
    Html,
}

impl FromStr for ConversionKind {
    type Err = QuotaGateError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pdf" => Ok(ConversionKind::Pdf),
            "html" => Ok(ConversionKind::Html),
            _ => Err(QuotaGateError::InvalidInput(
                "Missing or invalid conversionType for increment mode. Use 'pdf' or 'html'.".into(),
            )),
        }
    }
}

/// Read-only check or a guarded increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaRequest {
    Check,
    Increment(ConversionKind),
}

impl QuotaRequest {
    /// Build from the wire `mode` / `conversionType` pair.
    pub fn parse(mode: Option<&str>, conversion_type: Option<&str>) -> Result<Self> {
        match mode {
            Some("check") => Ok(QuotaRequest::Check),
            Some("increment") => {
                let kind = conversion_type
                    .ok_or_else(|| {
                        QuotaGateError::InvalidInput(
                            "Missing or invalid conversionType for increment mode. Use 'pdf' or 'html'."
                                .into(),
                        )
                    })?
                    .parse()?;
                Ok(QuotaRequest::Increment(kind))
            }
            _ => Err(QuotaGateError::InvalidInput(
                "Missing or invalid mode. Use 'check' or 'increment'.".into(),
            )),
        }
    }
}

/// Values used when a directory attribute is missing or unparsable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuotaDefaults {
    #[serde(default)]
    pub current_count: u32,
    #[serde(default = "default_max_files_allowed")]
    pub max_files_allowed: u32,
    #[serde(default = "default_max_pages_allowed")]
    pub max_pages_allowed: u32,
    #[serde(default = "default_max_size_allowed_mb")]
    pub max_size_allowed_mb: u32,
    #[serde(default)]
    pub pdf_count: u32,
    #[serde(default)]
    pub html_count: u32,
}

impl Default for QuotaDefaults {
    fn default() -> Self {
        Self {
            current_count: 0,
            max_files_allowed: default_max_files_allowed(),
            max_pages_allowed: default_max_pages_allowed(),
            max_size_allowed_mb: default_max_size_allowed_mb(),
            pdf_count: 0,
            html_count: 0,
        }
    }
}

fn default_max_files_allowed() -> u32 {
    3
}
fn default_max_pages_allowed() -> u32 {
    10
}
fn default_max_size_allowed_mb() -> u32 {
    25
}

/// Usage counters and limits of one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserQuotaState {
    pub current_count: u32,
    pub max_files_allowed: u32,
    pub max_pages_allowed: u32,
    pub max_size_allowed_mb: u32,
    pub pdf_count: u32,
    pub html_count: u32,
}

impl UserQuotaState {
    /// Parse from directory attributes. Never fails.
    pub fn from_attributes(attrs: &Attributes, defaults: &QuotaDefaults) -> Self {
        Self {
            current_count: attrs.parse_u32(Attribute::TotalFilesUploaded, defaults.current_count),
            max_files_allowed: attrs.parse_u32(Attribute::MaxFilesAllowed, defaults.max_files_allowed),
            max_pages_allowed: attrs.parse_u32(Attribute::MaxPagesAllowed, defaults.max_pages_allowed),
            max_size_allowed_mb: attrs.parse_u32(Attribute::MaxSizeAllowedMb, defaults.max_size_allowed_mb),
            pdf_count: attrs.parse_u32(Attribute::Pdf2Pdf, defaults.pdf_count),
            html_count: attrs.parse_u32(Attribute::Pdf2Html, defaults.html_count),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.current_count >= self.max_files_allowed
    }

    /// The three counters, always written together.
    pub fn counter_attributes(&self) -> Vec<AttributeUpdate> {
        vec![
            AttributeUpdate::new(Attribute::TotalFilesUploaded, self.current_count),
            AttributeUpdate::new(Attribute::Pdf2Pdf, self.pdf_count),
            AttributeUpdate::new(Attribute::Pdf2Html, self.html_count),
        ]
    }
}

/// Result of a successful guard evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaOutcome {
    pub state: UserQuotaState,
    /// True when the counters changed and must be persisted.
    pub incremented: bool,
}

/// Evaluate a check or increment against `state`.
///
/// Increment is refused with `QuotaExceeded` iff
/// `current_count >= max_files_allowed`; `state` is never modified.
pub fn check_or_increment(state: &UserQuotaState, request: QuotaRequest) -> Result<QuotaOutcome> {
    let kind = match request {
        QuotaRequest::Check => {
            return Ok(QuotaOutcome {
                state: *state,
                incremented: false,
            })
        }
        QuotaRequest::Increment(kind) => kind,
    };

    if state.is_exhausted() {
        return Err(QuotaGateError::QuotaExceeded {
            max_files_allowed: state.max_files_allowed,
        });
    }

    let mut next = *state;
    next.current_count = state.current_count.saturating_add(1);
    match kind {
        ConversionKind::Pdf => next.pdf_count = state.pdf_count.saturating_add(1),
        ConversionKind::Html => next.html_count = state.html_count.saturating_add(1),
    }

    Ok(QuotaOutcome {
        state: next,
        incremented: true,
    })
}
