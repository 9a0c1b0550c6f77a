//! # Gateway Configuration
//!
//! Read once at startup from the process environment. Every parse failure
//! is a [`ConfigError`] and aborts startup; nothing here falls back silently
//! on a malformed value.
//!
//! [`GatewayConfig::from_lookup`] takes the variable source as a closure so
//! tests pass a map instead of mutating the real environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default deadline for one migration-status query.
pub const DEFAULT_STATUS_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Default CORS preflight cache duration (120 hours).
pub const DEFAULT_CORS_MAX_AGE: Duration = Duration::from_secs(120 * 60 * 60);

/// Server run mode. Controls log format and default verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerMode {
    /// Verbose, human-readable logs including every route registration.
    #[default]
    Debug,
    /// JSON logs at `info`.
    Release,
    /// Quiet logs for test runs.
    Test,
}

impl ServerMode {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub fn default_log_filter(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "info",
            Self::Test => "warn",
        }
    }

    /// Whether logs should be emitted as JSON lines.
    pub fn json_logs(&self) -> bool {
        matches!(self, Self::Release)
    }

    /// Return the string representation of this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
            Self::Test => "test",
        }
    }
}

impl FromStr for ServerMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "debug" => Ok(Self::Debug),
            "release" => Ok(Self::Release),
            "test" => Ok(Self::Test),
            _ => Err(ConfigError::InvalidMode(s.to_string())),
        }
    }
}

/// Parse a `PORT` value. Leading `:` characters are stripped, so both
/// `8080` and `:8080` are accepted.
pub fn parse_port(raw: &str) -> Result<u16, ConfigError> {
    let value = raw.trim().trim_start_matches(':');
    value.parse::<u16>().map_err(|e| ConfigError::InvalidPort {
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Process configuration for the gateway.
///
/// Custom `Debug` redacts the API key to prevent credential leakage in logs.
#[derive(Clone)]
pub struct GatewayConfig {
    /// Run mode (`MODE`).
    pub mode: ServerMode,
    /// Listening port (`PORT`).
    pub port: u16,
    /// Key accepted by the primary bearer-key auth step (`API_KEY`).
    /// If `None`, that step never applies.
    pub api_key: Option<String>,
    /// Whether the forwarded-user fallback auth step is active
    /// (`PROXY_AUTH_ENABLED`).
    pub proxy_auth_enabled: bool,
    /// Directory of per-plugin OpenAPI documents (`PLUGIN_SPEC_DIR`).
    pub plugin_spec_dir: Option<PathBuf>,
    /// Deadline for one migration-status query
    /// (`MIGRATION_STATUS_TIMEOUT_MS`).
    pub migration_status_timeout: Duration,
    /// CORS preflight cache duration (`CORS_MAX_AGE_HOURS`).
    pub cors_max_age: Duration,
    /// Start the development migrator with a pending migration
    /// (`MIGRATION_PENDING`).
    pub migration_pending: bool,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("mode", &self.mode)
            .field("port", &self.port)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("proxy_auth_enabled", &self.proxy_auth_enabled)
            .field("plugin_spec_dir", &self.plugin_spec_dir)
            .field("migration_status_timeout", &self.migration_status_timeout)
            .field("cors_max_age", &self.cors_max_age)
            .field("migration_pending", &self.migration_pending)
            .finish()
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            mode: ServerMode::default(),
            port: DEFAULT_PORT,
            api_key: None,
            proxy_auth_enabled: false,
            plugin_spec_dir: None,
            migration_status_timeout: DEFAULT_STATUS_TIMEOUT,
            cors_max_age: DEFAULT_CORS_MAX_AGE,
            migration_pending: false,
        }
    }
}

impl GatewayConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mode = match non_empty("MODE") {
            Some(raw) => raw.parse()?,
            None => defaults.mode,
        };
        let port = match non_empty("PORT") {
            Some(raw) => parse_port(&raw)?,
            None => defaults.port,
        };
        let proxy_auth_enabled = match non_empty("PROXY_AUTH_ENABLED") {
            Some(raw) => parse_bool("PROXY_AUTH_ENABLED", &raw)?,
            None => defaults.proxy_auth_enabled,
        };
        let migration_pending = match non_empty("MIGRATION_PENDING") {
            Some(raw) => parse_bool("MIGRATION_PENDING", &raw)?,
            None => defaults.migration_pending,
        };
        let migration_status_timeout = match non_empty("MIGRATION_STATUS_TIMEOUT_MS") {
            Some(raw) => Duration::from_millis(parse_u64("MIGRATION_STATUS_TIMEOUT_MS", &raw)?),
            None => defaults.migration_status_timeout,
        };
        let cors_max_age = match non_empty("CORS_MAX_AGE_HOURS") {
            Some(raw) => Duration::from_secs(parse_u64("CORS_MAX_AGE_HOURS", &raw)? * 60 * 60),
            None => defaults.cors_max_age,
        };

        Ok(Self {
            mode,
            port,
            api_key: non_empty("API_KEY"),
            proxy_auth_enabled,
            plugin_spec_dir: non_empty("PLUGIN_SPEC_DIR").map(PathBuf::from),
            migration_status_timeout,
            cors_max_age,
            migration_pending,
        })
    }
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
        }),
    }
}

fn parse_u64(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
    })
}
