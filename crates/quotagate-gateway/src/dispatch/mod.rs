//! Lifecycle trigger dispatch.
//!
//! Re-exports the dispatcher, the handler trait, and the event envelope so
//! downstream consumers can depend on this module directly.

pub mod dispatcher;
pub mod event;

pub use dispatcher::{Dispatcher, TriggerHandler};
pub use event::LifecycleEvent;
