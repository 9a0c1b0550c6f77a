//! # Migration Gate
//!
//! Two-state admission control in front of every gated route:
//!
//! ```text
//! OPEN     (CONFIRMATION_NOT_REQUIRED) → request proceeds
//! BLOCKED  (CONFIRMATION_REQUIRED)     → 428 + MIGRATION_REQUIRED_WARNING
//! ```
//!
//! The gate holds no state of its own. Every request re-queries the
//! [`Migrator`], bounded by a deadline, so a migration completed by one
//! request is visible to the very next one.
//!
//! Exemptions come from an explicit [`AllowList`] checked against the
//! normalized request path. They do not depend on where routes were
//! registered relative to the gate.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tollgate_core::{MigrationError, MigrationState, Migrator};

use crate::error::AppError;

/// Fixed operator-facing text returned with every gate rejection.
///
/// Tools match on this text; change it only together with them.
pub const MIGRATION_REQUIRED_WARNING: &str = "
New migration scripts detected. Database migration is required to launch the backend.
WARNING: Performing migration may wipe collected data for consistency and re-collecting data may be required.
To proceed, please send a request to <ui-endpoint>/api/proceed-db-migration (or <gateway-endpoint>/proceed-db-migration).
Alternatively, you may downgrade back to the previous version.
";

/// Paths that bypass the gate.
///
/// `exact` entries match one normalized path. `prefix` entries match the
/// prefix itself and anything below it on a segment boundary, so
/// `/swagger` covers `/swagger/doc.json` but not `/swaggerx`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    exact: BTreeSet<String>,
    prefixes: BTreeSet<String>,
}

impl AllowList {
    /// Empty allow-list: everything is gated.
    pub fn new() -> Self {
        Self::default()
    }

    /// Exempt one exact path.
    pub fn exact(mut self, path: &str) -> Self {
        self.exact.insert(normalize_path(path));
        self
    }

    /// Exempt a path and everything below it.
    pub fn prefix(mut self, path: &str) -> Self {
        self.prefixes.insert(normalize_path(path));
        self
    }

    /// Whether `path` bypasses the gate.
    pub fn allows(&self, path: &str) -> bool {
        let path = normalize_path(path);
        if self.exact.contains(&path) {
            return true;
        }
        self.prefixes.iter().any(|prefix| {
            path == *prefix
                || prefix == "/"
                || path
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

/// Collapse repeated slashes and drop a trailing slash (except for `/`).
pub fn normalize_path(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len() + 1);
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        normalized.push('/');
        normalized.push_str(segment);
    }
    if normalized.is_empty() {
        normalized.push('/');
    }
    normalized
}

/// Admission decision for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Path is allow-listed; the migrator was not consulted.
    Exempt,
    /// Migration state is CONFIRMATION_NOT_REQUIRED.
    Open,
    /// Migration state is CONFIRMATION_REQUIRED.
    Blocked,
}

/// The gate itself. Cheap to clone; used as middleware state.
#[derive(Clone)]
pub struct MigrationGate {
    migrator: Arc<dyn Migrator>,
    allow_list: Arc<AllowList>,
    status_timeout: Duration,
}

impl std::fmt::Debug for MigrationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationGate")
            .field("allow_list", &self.allow_list)
            .field("status_timeout", &self.status_timeout)
            .finish()
    }
}

impl MigrationGate {
    /// Build a gate over `migrator`.
    pub fn new(migrator: Arc<dyn Migrator>, allow_list: AllowList, status_timeout: Duration) -> Self {
        Self {
            migrator,
            allow_list: Arc::new(allow_list),
            status_timeout,
        }
    }

    /// The allow-list this gate checks.
    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    /// Query the migration state fresh, bounded by the status deadline.
    pub async fn current_state(&self) -> Result<MigrationState, MigrationError> {
        query_state(self.migrator.as_ref(), self.status_timeout).await
    }

    /// Decide whether a request for `path` is admitted.
    pub async fn check(&self, path: &str) -> Result<GateDecision, MigrationError> {
        if self.allow_list.allows(path) {
            return Ok(GateDecision::Exempt);
        }
        Ok(match self.current_state().await? {
            MigrationState::ConfirmationNotRequired => GateDecision::Open,
            MigrationState::ConfirmationRequired => GateDecision::Blocked,
        })
    }
}

/// Query `migrator.state()` with a deadline. A timeout is reported as
/// [`MigrationError::StatusUnavailable`].
pub async fn query_state(
    migrator: &dyn Migrator,
    timeout: Duration,
) -> Result<MigrationState, MigrationError> {
    match tokio::time::timeout(timeout, migrator.state()).await {
        Ok(result) => result,
        Err(_) => Err(MigrationError::StatusUnavailable(format!(
            "status query exceeded {}ms",
            timeout.as_millis()
        ))),
    }
}

/// Gate middleware.
///
/// Install with `axum::middleware::from_fn_with_state(gate, migration_gate_middleware)`.
/// A status source that fails or times out rejects the request with 503.
pub async fn migration_gate_middleware(
    State(gate): State<MigrationGate>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    match gate.check(&path).await {
        Ok(GateDecision::Exempt | GateDecision::Open) => next.run(request).await,
        Ok(GateDecision::Blocked) => {
            tracing::warn!(path = %path, "request rejected: database migration requires confirmation");
            AppError::GateBlocked(MIGRATION_REQUIRED_WARNING).into_response()
        }
        Err(err) => {
            tracing::error!(path = %path, error = %err, "migration status query failed");
            AppError::from(err).into_response()
        }
    }
}
