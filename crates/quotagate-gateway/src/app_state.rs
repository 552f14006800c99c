//! Shared application state for the quotagate gateway.
//!
//! Compiles config into runtime structures once at startup: the policy table,
//! registration rules, pre-auth ranges, and the retry policy. Startup errors
//! are returned, never panicked.

use std::sync::Arc;

use quotagate_core::error::{QuotaGateError, Result};
use quotagate_core::network::{self, IpRange};
use quotagate_core::policy::{GroupPolicy, PolicyTable};
use quotagate_core::registration::{Assignment, RegistrationRules};

use crate::config::GatewayConfig;
use crate::directory::IdentityDirectory;
use crate::dispatch::Dispatcher;
use crate::handlers::triggers::{PostConfirmationHandler, PreAuthenticationHandler, PreSignUpHandler};
use crate::retry::{Retry, RetryPolicy, Sleeper, TokioSleeper};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
    directory: Arc<dyn IdentityDirectory>,
    dispatcher: Arc<Dispatcher>,
}

struct AppStateInner {
    cfg: GatewayConfig,
    policies: PolicyTable,
    registration: RegistrationRules,
    ip_ranges: Vec<IpRange>,
    retry: Retry,
}

impl AppState {
    pub fn new(cfg: GatewayConfig, directory: Arc<dyn IdentityDirectory>) -> Result<Self> {
        Self::with_sleeper(cfg, directory, Arc::new(TokioSleeper))
    }

    /// Build state with an explicit sleep source for retry backoff.
    pub fn with_sleeper(
        cfg: GatewayConfig,
        directory: Arc<dyn IdentityDirectory>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Result<Self> {
        cfg.validate()?;

        // 1) Compile policy table
        let groups = &cfg.groups;
        let lookup = |group: &str| {
            groups
                .policies
                .get(group)
                .map(|p| GroupPolicy {
                    group: group.to_string(),
                    policy: p.to_policy(),
                })
                .ok_or_else(|| QuotaGateError::InvalidInput(format!("no policy for group {group}")))
        };
        let precedence = groups
            .effective_precedence()
            .iter()
            .map(|g| lookup(g))
            .collect::<Result<Vec<_>>>()?;
        let fallback = lookup(&groups.default_group)?;
        let policies = PolicyTable::new(precedence, fallback)?;

        // 2) Registration + network rules
        let reg = &cfg.registration;
        let registration = RegistrationRules::new(
            &reg.allowed_email_suffixes,
            &reg.admin_emails,
            &reg.admin_email_suffixes,
        );
        let ip_ranges = network::compile_ranges(&cfg.pre_auth.allowed_ip_ranges)?;

        let retry = Retry::new(RetryPolicy::from_config(&cfg.retry), sleeper);

        // 3) Register trigger handlers
        let dispatcher = Dispatcher::new();
        dispatcher.register(Arc::new(PreSignUpHandler));
        dispatcher.register(Arc::new(PostConfirmationHandler));
        dispatcher.register(Arc::new(PreAuthenticationHandler));

        tracing::info!(
            pool = %cfg.directory.user_pool_id,
            precedence = ?policies.precedence().collect::<Vec<_>>(),
            fallback = %policies.fallback().group,
            triggers = ?dispatcher.registered_families(),
            "gateway state compiled"
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                policies,
                registration,
                ip_ranges,
                retry,
            }),
            directory,
            dispatcher: Arc::new(dispatcher),
        })
    }

    pub fn cfg(&self) -> &GatewayConfig {
        &self.inner.cfg
    }

    pub fn pool_id(&self) -> &str {
        &self.inner.cfg.directory.user_pool_id
    }

    pub fn directory(&self) -> &dyn IdentityDirectory {
        self.directory.as_ref()
    }

    pub fn policies(&self) -> &PolicyTable {
        &self.inner.policies
    }

    pub fn registration(&self) -> &RegistrationRules {
        &self.inner.registration
    }

    pub fn ip_ranges(&self) -> &[IpRange] {
        &self.inner.ip_ranges
    }

    pub fn retry(&self) -> &Retry {
        &self.inner.retry
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Configured group name for a registration assignment.
    pub fn group_for(&self, assignment: Assignment) -> &str {
        match assignment {
            Assignment::Admin => &self.inner.cfg.groups.admin_group,
            Assignment::Default => &self.inner.cfg.groups.default_group,
        }
    }
}
