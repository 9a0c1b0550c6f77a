//! # Proceed-Migration Endpoint
//!
//! `GET /proceed-db-migration` is how an operator confirms a destructive
//! migration. It is allow-listed in the gate, so it stays reachable while
//! everything else answers 428.
//!
//! Concurrent calls are serialized by the guard on [`AppState`]; the state
//! is re-read after the guard is acquired, so a call that waited behind a
//! successful migration returns success without executing again.

use axum::extract::State;

use crate::error::{ApiSuccess, AppError, ErrorBody};
use crate::state::AppState;

/// Path of the proceed endpoint.
pub const PROCEED_PATH: &str = "/proceed-db-migration";

/// GET /proceed-db-migration — run the pending migration, if any.
#[utoipa::path(
    get,
    path = "/proceed-db-migration",
    responses(
        (status = 200, description = "No migration pending, or migration completed"),
        (status = 500, description = "Migration execution failed", body = ErrorBody),
        (status = 503, description = "Migration status unavailable", body = ErrorBody),
    ),
    tag = "migration"
)]
pub async fn proceed_db_migration(
    State(state): State<AppState>,
) -> Result<ApiSuccess<()>, AppError> {
    if !state.migration_state().await?.requires_confirmation() {
        return Ok(ApiSuccess::empty());
    }

    let _guard = state.migration_guard().lock().await;
    if !state.migration_state().await?.requires_confirmation() {
        tracing::info!("migration completed by a concurrent request");
        return Ok(ApiSuccess::empty());
    }

    tracing::info!("executing database migration");
    state
        .migrator
        .execute()
        .await
        .map_err(AppError::MigrationFailed)?;
    tracing::info!("database migration completed");

    Ok(ApiSuccess::empty())
}
