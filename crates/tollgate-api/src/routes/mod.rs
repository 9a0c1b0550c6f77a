//! # Route Handlers
//!
//! | Module        | Routes                               | Gated |
//! |---------------|--------------------------------------|-------|
//! | [`system`]    | `/ping`, `/health`, `/version`       | no    |
//! | [`migration`] | `/proceed-db-migration`              | allow-listed |
//! | [`plugins`]   | `/plugins`                           | yes   |
//!
//! Documentation routes live in [`crate::docs`].

pub mod migration;
pub mod plugins;
pub mod system;
