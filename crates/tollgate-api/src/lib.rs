//! # tollgate-api — Request-Dispatch Gateway
//!
//! Axum service in front of a pluggable backend. It owns the ordered
//! middleware pipeline, a migration-required gate that blocks traffic until
//! an operator confirms a destructive schema migration, per-plugin API
//! documentation, and reverse-proxy aware rewriting of served documents.
//!
//! ## API Surface
//!
//! | Path                              | Module                     | Auth | Gate        |
//! |-----------------------------------|----------------------------|------|-------------|
//! | `/ping`, `/health`, `/version`    | [`routes::system`]         | no   | no          |
//! | `/proceed-db-migration`           | [`routes::migration`]      | yes  | allow-listed |
//! | `/swagger/*`                      | [`openapi`], [`rewrite`]   | yes  | allow-listed |
//! | `/plugins/swagger/{name}/*`       | [`docs`]                   | yes  | allow-listed |
//! | `/plugins` and registrar routes   | [`routes::plugins`]        | yes  | yes         |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → Auth(api key) → Auth(proxy) → MigrationGate → [Rewriter | CORS] → Handler
//! ```
//!
//! See [`pipeline`] for how the stack is assembled.

pub mod auth;
pub mod docs;
pub mod error;
pub mod gate;
pub mod middleware;
pub mod openapi;
pub mod pipeline;
pub mod rewrite;
pub mod routes;
pub mod state;

use axum::Router;

pub use error::AppError;
pub use pipeline::{Gateway, Pipeline, PipelineError};
pub use state::AppState;

/// Assemble the full application router with the default pipeline.
pub fn app(state: AppState) -> Result<Router, PipelineError> {
    Pipeline::new(state).build().map(Gateway::into_router)
}
