//! Transport layer (HTTP).
//!
//! Decodes request bodies once, calls the transport-agnostic handlers, and
//! renders results and errors as JSON.

pub mod http;
