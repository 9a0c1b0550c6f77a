//! # Application State
//!
//! Shared state for the Axum application, passed to route handlers via the
//! `State` extractor. Everything here is read-mostly: the configuration and
//! plugin set are fixed at startup, and the migrator is an external
//! collaborator queried on demand. The only lock is the migration-execution
//! guard, held by at most one proceed request at a time.

use std::sync::Arc;

use tokio::sync::Mutex;
use tollgate_core::{GatewayConfig, MigrationError, MigrationState, Migrator, PluginRegistry};

use crate::gate;

/// State shared by every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Process configuration.
    pub config: Arc<GatewayConfig>,
    /// Migration status source and executor.
    pub migrator: Arc<dyn Migrator>,
    /// Plugins loaded at startup.
    pub plugins: Arc<PluginRegistry>,
    migration_guard: Arc<Mutex<()>>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("plugins", &self.plugins)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Assemble state from its collaborators.
    pub fn new(config: GatewayConfig, migrator: Arc<dyn Migrator>, plugins: PluginRegistry) -> Self {
        Self {
            config: Arc::new(config),
            migrator,
            plugins: Arc::new(plugins),
            migration_guard: Arc::new(Mutex::new(())),
        }
    }

    /// Query the migration state fresh, bounded by the configured deadline.
    pub async fn migration_state(&self) -> Result<MigrationState, MigrationError> {
        gate::query_state(self.migrator.as_ref(), self.config.migration_status_timeout).await
    }

    /// Guard serializing migration execution within this process.
    pub(crate) fn migration_guard(&self) -> &Mutex<()> {
        &self.migration_guard
    }
}
