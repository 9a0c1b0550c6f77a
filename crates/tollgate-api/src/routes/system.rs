//! Liveness and version probes. Mounted outside auth and the gate.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ApiSuccess;

/// Build information returned by `GET /version`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VersionInfo {
    /// Gateway release version.
    pub version: String,
}

/// GET /ping — liveness.
#[utoipa::path(
    get,
    path = "/ping",
    responses((status = 200, description = "Process is alive")),
    tag = "system"
)]
pub async fn ping() -> ApiSuccess<()> {
    ApiSuccess::empty()
}

/// GET /health — alias of `/ping` for orchestrator probes.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Process is alive")),
    tag = "system"
)]
pub async fn health() -> ApiSuccess<()> {
    ApiSuccess::empty()
}

/// GET /version — gateway version.
#[utoipa::path(
    get,
    path = "/version",
    responses((status = 200, description = "Gateway version", body = VersionInfo)),
    tag = "system"
)]
pub async fn version() -> ApiSuccess<VersionInfo> {
    ApiSuccess::ok(VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
