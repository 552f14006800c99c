#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use quotagate_core::attributes::Attributes;
use quotagate_gateway::app_state::AppState;
use quotagate_gateway::config;
use quotagate_gateway::directory::{IdentityDirectory, InMemoryDirectory};
use quotagate_gateway::retry::Sleeper;

pub const POOL: &str = "pool-1";

pub const CONFIG: &str = r#"
version: 1
directory:
  user_pool_id: "pool-1"
  page_size: 2
groups:
  policies:
    DefaultUsers: { max_files_allowed: 25, max_pages_allowed: 25, max_size_allowed_MB: 25 }
    AdminUsers: { max_files_allowed: 100, max_pages_allowed: 2500, max_size_allowed_MB: 1000 }
registration:
  allowed_email_suffixes: ["@umbc.edu"]
  admin_emails: ["champ@umbc.edu", "paluck@umbc.edu"]
"#;

/// Records requested backoff delays instead of sleeping.
#[derive(Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, d: Duration) {
        self.delays.lock().unwrap().push(d);
    }
}

pub struct Harness {
    pub state: AppState,
    pub dir: Arc<InMemoryDirectory>,
    pub sleeper: Arc<RecordingSleeper>,
}

pub fn harness() -> Harness {
    harness_with(CONFIG)
}

pub fn harness_with(yaml: &str) -> Harness {
    let cfg = config::load_from_str(yaml).expect("config");
    let dir = seeded_directory();
    let sleeper = Arc::new(RecordingSleeper::default());
    let state = AppState::with_sleeper(cfg, dir.clone(), sleeper.clone()).expect("state");
    Harness { state, dir, sleeper }
}

/// State over an arbitrary directory backend, using the default test config.
pub fn state_over(dir: Arc<dyn IdentityDirectory>) -> (AppState, Arc<RecordingSleeper>) {
    let cfg = config::load_from_str(CONFIG).expect("config");
    let sleeper = Arc::new(RecordingSleeper::default());
    let state = AppState::with_sleeper(cfg, dir, sleeper.clone()).expect("state");
    (state, sleeper)
}

pub fn seeded_directory() -> Arc<InMemoryDirectory> {
    let dir = Arc::new(InMemoryDirectory::new());
    dir.create_pool(POOL);
    dir.create_group(POOL, "DefaultUsers");
    dir.create_group(POOL, "AdminUsers");
    dir
}

pub fn attrs(pairs: &[(&str, &str)]) -> Attributes {
    pairs.iter().map(|(k, v)| (*k, *v)).collect()
}
