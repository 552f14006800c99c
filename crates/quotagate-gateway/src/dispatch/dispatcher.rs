use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use quotagate_core::error::Result;

use super::event::LifecycleEvent;
use crate::app_state::AppState;

/// Handler for one trigger family (`PreSignUp`, `PostConfirmation`, ...).
#[async_trait]
pub trait TriggerHandler: Send + Sync {
    fn family(&self) -> &'static str;
    async fn handle(&self, state: &AppState, event: LifecycleEvent) -> Result<LifecycleEvent>;
}

/// Registry and dispatcher for lifecycle trigger handlers.
#[derive(Default)]
pub struct Dispatcher {
    handlers: DashMap<&'static str, Arc<dyn TriggerHandler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }

    pub fn register(&self, handler: Arc<dyn TriggerHandler>) {
        self.handlers.insert(handler.family(), handler);
    }

    pub fn registered_families(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|e| *e.key()).collect()
    }

    /// Unknown trigger families pass through unchanged.
    pub async fn dispatch(&self, state: &AppState, event: LifecycleEvent) -> Result<LifecycleEvent> {
        let handler = self
            .handlers
            .get(event.trigger_family())
            .map(|h| h.value().clone());
        match handler {
            Some(h) => h.handle(state, event).await,
            None => {
                tracing::debug!(trigger_source = %event.trigger_source, "no handler for trigger, passing through");
                Ok(event)
            }
        }
    }
}
