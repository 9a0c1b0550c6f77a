//! # tollgate-core — Collaborator Boundaries for the Gateway
//!
//! The gateway in `tollgate-api` sits in front of a pluggable backend. This
//! crate defines everything the gateway consumes from that backend, without
//! any HTTP dependency:
//!
//! - **Migration**: [`MigrationState`] and the [`Migrator`] trait: the
//!   per-request status query and the (potentially long) execution call.
//! - **Plugins**: the [`Plugin`] trait, the [`OpenApiSpec`] capability and
//!   the startup-time [`PluginRegistry`].
//! - **Configuration**: [`GatewayConfig`], [`ServerMode`] and [`parse_port`].
//! - **Errors**: one `thiserror` enum per concern in [`error`].
//!
//! ## Crate Policy
//!
//! - No dependencies on other `tollgate-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod config;
pub mod error;
pub mod migration;
pub mod plugin;

pub use config::{parse_port, GatewayConfig, ServerMode};
pub use error::{ConfigError, MigrationError, PluginError};
pub use migration::{InMemoryMigrator, MigrationState, Migrator};
pub use plugin::{OpenApiSpec, Plugin, PluginRegistry, SpecFilePlugin};
