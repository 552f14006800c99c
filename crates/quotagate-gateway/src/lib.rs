//! quotagate gateway library entry.
//!
//! This crate wires config, the directory seam, retry, request handlers, and
//! lifecycle trigger dispatch into an HTTP service. It is intended to be
//! consumed by the binary (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod directory;
pub mod dispatch;
pub mod handlers;
pub mod ops;
pub mod retry;
pub mod router;
pub mod transport;
