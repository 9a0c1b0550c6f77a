//! # Migration Status & Execution
//!
//! The backend decides whether pending schema migrations need operator
//! confirmation. The gateway only ever asks two questions:
//!
//! 1. "Is confirmation required right now?" Asked on every gated request,
//!    never cached.
//! 2. "Run the migration." Asked by the proceed endpoint.
//!
//! ## States
//!
//! CONFIRMATION_NOT_REQUIRED ⇄ CONFIRMATION_REQUIRED
//!
//! The only transition the gateway can cause is REQUIRED → NOT_REQUIRED, as
//! a side effect of a successful [`Migrator::execute`].

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::MigrationError;

/// Whether the backend is waiting for an operator to confirm a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationState {
    /// No destructive migration is pending; traffic flows.
    ConfirmationNotRequired,
    /// A destructive migration is pending; gated traffic is rejected.
    ConfirmationRequired,
}

impl MigrationState {
    /// Build from the backend's boolean "requires confirmation" flag.
    pub fn from_requires_confirmation(required: bool) -> Self {
        if required {
            Self::ConfirmationRequired
        } else {
            Self::ConfirmationNotRequired
        }
    }

    /// Whether gated requests must be rejected in this state.
    pub fn requires_confirmation(&self) -> bool {
        matches!(self, Self::ConfirmationRequired)
    }

    /// Return the string representation of this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfirmationNotRequired => "CONFIRMATION_NOT_REQUIRED",
            Self::ConfirmationRequired => "CONFIRMATION_REQUIRED",
        }
    }
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Migration collaborator.
///
/// Implementations own the actual migration scripts. `state` may hit a
/// database and is called once per gated request, so it should be cheap;
/// callers bound it with a deadline. `execute` may run for a long time.
/// The gateway never calls `execute` concurrently with itself.
#[async_trait]
pub trait Migrator: Send + Sync {
    /// Current migration state, read fresh.
    async fn state(&self) -> Result<MigrationState, MigrationError>;

    /// Run pending migrations. On success, subsequent [`Migrator::state`]
    /// calls report [`MigrationState::ConfirmationNotRequired`].
    async fn execute(&self) -> Result<(), MigrationError>;
}

/// In-process migrator used in development mode and in tests.
///
/// Holds a single "pending" flag. `execute` clears it, optionally after a
/// delay, unless a failure has been armed with [`InMemoryMigrator::fail_next`].
#[derive(Debug, Default)]
pub struct InMemoryMigrator {
    pending: AtomicBool,
    executions: AtomicU64,
    status_queries: AtomicU64,
    next_failure: Mutex<Option<String>>,
    status_failure: Mutex<Option<String>>,
    execution_delay: Option<Duration>,
}

impl InMemoryMigrator {
    /// Create a migrator, optionally starting with a pending migration.
    pub fn new(pending: bool) -> Self {
        Self {
            pending: AtomicBool::new(pending),
            ..Self::default()
        }
    }

    /// Make every execution sleep for `delay` before completing.
    pub fn with_execution_delay(mut self, delay: Duration) -> Self {
        self.execution_delay = Some(delay);
        self
    }

    /// Mark a migration as pending (e.g. after a version upgrade).
    pub fn set_pending(&self, pending: bool) {
        self.pending.store(pending, Ordering::SeqCst);
    }

    /// Arm a failure for the next `execute` call.
    pub fn fail_next(&self, reason: impl Into<String>) {
        *self.next_failure.lock() = Some(reason.into());
    }

    /// Make every status query fail until cleared with `None`.
    pub fn fail_status(&self, reason: Option<String>) {
        *self.status_failure.lock() = reason;
    }

    /// Number of times `execute` has been entered.
    pub fn execution_count(&self) -> u64 {
        self.executions.load(Ordering::SeqCst)
    }

    /// Number of status queries answered (including failures).
    pub fn status_query_count(&self) -> u64 {
        self.status_queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Migrator for InMemoryMigrator {
    async fn state(&self) -> Result<MigrationState, MigrationError> {
        self.status_queries.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.status_failure.lock().clone() {
            return Err(MigrationError::StatusUnavailable(reason));
        }
        Ok(MigrationState::from_requires_confirmation(
            self.pending.load(Ordering::SeqCst),
        ))
    }

    async fn execute(&self) -> Result<(), MigrationError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.execution_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = self.next_failure.lock().take() {
            return Err(MigrationError::ExecutionFailed(reason));
        }
        self.pending.store(false, Ordering::SeqCst);
        Ok(())
    }
}
