//! Request handlers.
//!
//! Each handler fetches state from the directory, applies one rule from
//! `quotagate-core`, and writes the result back in a single batched update.
//! Handlers are transport-agnostic; `transport::http` adapts them to axum.

pub mod group_sync;
pub mod profile;
pub mod quota;
pub mod triggers;
