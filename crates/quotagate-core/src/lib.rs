//! quotagate core: directory-agnostic quota rules, attribute names, and errors.
//!
//! This crate holds the decision logic shared by the gateway handlers: group
//! precedence resolution, the upload quota guard, registration rules and
//! network range matching. It carries no runtime or transport dependencies.
//!
//! # Panics
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Malformed directory data falls back to documented defaults; everything
//! else surfaces as `QuotaGateError`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod attributes;
pub mod error;
pub mod network;
pub mod policy;
pub mod quota;
pub mod registration;

/// Shared result type.
pub use error::{QuotaGateError, Result};
