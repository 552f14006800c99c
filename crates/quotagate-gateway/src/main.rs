//! quotagate gateway
//!
//! - POST /upload-quota          : quota check / increment
//! - POST /update-first-sign-in  : profile attributes after first sign-in
//! - POST /v1/group-sync         : membership-change notifications + manual sync
//! - POST /v1/triggers           : identity platform lifecycle triggers
//! - GET  /healthz

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter};

use quotagate_core::error::{QuotaGateError, Result};
use quotagate_gateway::{app_state, config, directory::InMemoryDirectory, router};

#[tokio::main]
async fn main() {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, code = e.client_code().as_str(), "quotagate-gateway failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let path = std::env::var("QUOTAGATE_CONFIG").unwrap_or_else(|_| config::DEFAULT_CONFIG_PATH.to_string());
    let cfg = config::load_from_file(&path)?;
    let listen: SocketAddr = cfg
        .gateway
        .listen
        .parse()
        .map_err(|e| QuotaGateError::InvalidInput(format!("gateway.listen must be a valid SocketAddr: {e}")))?;

    // Development backend: an empty pool with the configured groups.
    let directory = InMemoryDirectory::new();
    directory.create_pool(cfg.directory.user_pool_id.clone());
    for group in cfg.groups.policies.keys() {
        directory.create_group(&cfg.directory.user_pool_id, group.clone());
    }

    let state = app_state::AppState::new(cfg, Arc::new(directory))?;
    let app = router::build_router(state);

    tracing::info!(%listen, "quotagate-gateway starting");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| QuotaGateError::Unexpected(format!("failed to bind {listen}: {e}")))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| QuotaGateError::Unexpected(format!("server failed: {e}")))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to install ctrl-c handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
