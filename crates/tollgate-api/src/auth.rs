//! # Authentication Steps
//!
//! Credential checking is owned by pluggable [`Authenticator`]s. The
//! pipeline installs one middleware step per authenticator, in order:
//! primary bearer key first, forwarded-user proxy fallback second.
//!
//! Each authenticator answers with an [`AuthOutcome`]:
//!
//! | Outcome          | Effect                                              |
//! |------------------|-----------------------------------------------------|
//! | `Authenticated`  | [`Principal`] inserted into extensions, chain continues |
//! | `Rejected`       | chain short-circuits with the 401/403 envelope      |
//! | `NotApplicable`  | chain continues to the next step                    |
//!
//! Once a step has authenticated the request, later steps are skipped.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;

use crate::error::AppError;

/// Forwarded-user header set by an authenticating reverse proxy.
pub const FORWARDED_USER_HEADER: &str = "x-forwarded-user";

/// Forwarded-email header set by an authenticating reverse proxy.
pub const FORWARDED_EMAIL_HEADER: &str = "x-forwarded-email";

/// Identity established by an auth step, available to handlers via
/// request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Caller identifier (key label or forwarded user).
    pub user: String,
    /// Name of the authenticator that accepted the request.
    pub scheme: &'static str,
}

/// Result of one authenticator.
#[derive(Debug)]
pub enum AuthOutcome {
    /// Credentials accepted.
    Authenticated(Principal),
    /// Credentials present but refused; short-circuits with this error.
    Rejected(AppError),
    /// This scheme does not apply to the request.
    NotApplicable,
}

/// A credential scheme.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Short scheme name, used in logs and in [`Principal::scheme`].
    fn name(&self) -> &'static str;

    /// Inspect the request headers.
    async fn authenticate(&self, headers: &HeaderMap) -> AuthOutcome;
}

/// Shared handle to an authenticator, used as middleware state.
pub type AuthStep = Arc<dyn Authenticator>;

// ── Bearer API key ──────────────────────────────────────────────────────────

/// Primary scheme: `Authorization: Bearer <api key>`.
///
/// Custom `Debug` redacts the key value to prevent credential leakage in logs.
#[derive(Clone)]
pub struct ApiKeyAuthenticator {
    key: String,
}

impl std::fmt::Debug for ApiKeyAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyAuthenticator")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl ApiKeyAuthenticator {
    /// Accept exactly `key`.
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// Constant-time comparison of bearer tokens.
///
/// When lengths differ, performs a dummy comparison to avoid leaking length
/// information through timing variance.
fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

#[async_trait]
impl Authenticator for ApiKeyAuthenticator {
    fn name(&self) -> &'static str {
        "api_key"
    }

    async fn authenticate(&self, headers: &HeaderMap) -> AuthOutcome {
        let Some(value) = headers.get(header::AUTHORIZATION) else {
            return AuthOutcome::NotApplicable;
        };
        let Ok(value) = value.to_str() else {
            return AuthOutcome::Rejected(AppError::Unauthorized(
                "authorization header is not valid ASCII".into(),
            ));
        };
        let Some(provided) = value.strip_prefix("Bearer ") else {
            return AuthOutcome::NotApplicable;
        };
        if constant_time_token_eq(provided.trim(), &self.key) {
            AuthOutcome::Authenticated(Principal {
                user: "api_key".into(),
                scheme: self.name(),
            })
        } else {
            AuthOutcome::Rejected(AppError::Unauthorized("invalid api key".into()))
        }
    }
}

// ── Forwarded user (authenticating proxy) ───────────────────────────────────

/// Fallback scheme: trust the forwarded-user headers of an authenticating
/// reverse proxy (oauth2-proxy style).
#[derive(Debug, Clone, Default)]
pub struct ProxyAuthenticator;

#[async_trait]
impl Authenticator for ProxyAuthenticator {
    fn name(&self) -> &'static str {
        "proxy"
    }

    async fn authenticate(&self, headers: &HeaderMap) -> AuthOutcome {
        let forwarded = headers
            .get(FORWARDED_USER_HEADER)
            .or_else(|| headers.get(FORWARDED_EMAIL_HEADER));
        let Some(value) = forwarded else {
            return AuthOutcome::NotApplicable;
        };
        match value.to_str().map(str::trim) {
            Ok(user) if !user.is_empty() => AuthOutcome::Authenticated(Principal {
                user: user.to_string(),
                scheme: self.name(),
            }),
            _ => AuthOutcome::Rejected(AppError::Forbidden(
                "forwarded user header is empty or malformed".into(),
            )),
        }
    }
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Run one authenticator as a middleware step.
///
/// Install with `axum::middleware::from_fn_with_state(step, auth_middleware)`.
pub async fn auth_middleware(
    State(step): State<AuthStep>,
    mut request: Request,
    next: Next,
) -> Response {
    if request.extensions().get::<Principal>().is_some() {
        return next.run(request).await;
    }

    match step.authenticate(request.headers()).await {
        AuthOutcome::Authenticated(principal) => {
            tracing::debug!(scheme = step.name(), user = %principal.user, "request authenticated");
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        AuthOutcome::Rejected(err) => {
            tracing::warn!(scheme = step.name(), reason = %err, "authentication failed");
            err.into_response()
        }
        AuthOutcome::NotApplicable => next.run(request).await,
    }
}
