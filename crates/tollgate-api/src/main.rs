//! # tollgate-api — Binary Entry Point
//!
//! Reads configuration from the environment, loads spec-file plugins and
//! serves the gateway until Ctrl-C or SIGTERM.

use std::sync::Arc;

use anyhow::Context;
use tollgate_api::AppState;
use tollgate_core::{GatewayConfig, InMemoryMigrator, PluginRegistry};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::from_env().context("invalid gateway configuration")?;

    // Initialize structured tracing. RUST_LOG wins over the mode default.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.mode.default_log_filter()));
    if config.mode.json_logs() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    tracing::info!(config = ?config, "configuration loaded");

    let mut plugins = PluginRegistry::new();
    if let Some(dir) = &config.plugin_spec_dir {
        let loaded = plugins
            .load_spec_dir(dir)
            .with_context(|| format!("failed to load plugin specs from {}", dir.display()))?;
        tracing::info!(dir = %dir.display(), plugins = loaded, "spec-file plugins loaded");
    }

    let migrator = Arc::new(InMemoryMigrator::new(config.migration_pending));
    if config.migration_pending {
        tracing::warn!("starting with a pending migration; gated routes answer 428");
    }

    let port = config.port;
    let state = AppState::new(config, migrator, plugins);
    let app = tollgate_api::app(state).context("failed to build request pipeline")?;

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("tollgate listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("tollgate stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
