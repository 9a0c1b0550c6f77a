//! # Error Types
//!
//! One `thiserror` enum per collaborator boundary. The HTTP layer maps
//! these onto status codes; nothing here knows about HTTP.

use std::path::PathBuf;

use thiserror::Error;

/// Failure reported by the migration collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MigrationError {
    /// The status source could not be queried (or did not answer in time).
    #[error("migration status unavailable: {0}")]
    StatusUnavailable(String),

    /// Migration execution ran and failed.
    #[error("migration execution failed: {0}")]
    ExecutionFailed(String),
}

/// Error building the plugin set at startup.
#[derive(Error, Debug)]
pub enum PluginError {
    /// Two plugins share a name.
    #[error("duplicate plugin name: {name}")]
    Duplicate {
        /// The conflicting name.
        name: String,
    },

    /// The plugin name cannot be used as a route segment.
    #[error("invalid plugin name {name:?}: {reason}")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A spec file could not be turned into a plugin document.
    #[error("failed to load plugin spec {}: {reason}", path.display())]
    SpecLoad {
        /// File that failed.
        path: PathBuf,
        /// Parse or shape failure.
        reason: String,
    },

    /// IO error while scanning a spec directory.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Invalid process configuration. Always fatal at startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `PORT` is not an integer port number.
    #[error("PORT [{value}] must be int: {reason}")]
    InvalidPort {
        /// The value after stripping leading colons.
        value: String,
        /// Parser message.
        reason: String,
    },

    /// `MODE` is not one of the known server modes.
    #[error("unknown MODE {0:?}; expected debug, release or test")]
    InvalidMode(String),

    /// A numeric or boolean setting failed to parse.
    #[error("invalid value {value:?} for {key}")]
    InvalidValue {
        /// Variable name.
        key: &'static str,
        /// Raw value.
        value: String,
    },
}
