//! # Response Rewriting
//!
//! When the UI reaches the gateway through a path-prefixing reverse proxy
//! (`/api/...`), the served API document must advertise that prefix as its
//! `basePath`, or "try it out" requests from the documentation UI miss the
//! proxy. The gateway cannot see the proxy directly; the only hint is the
//! `Referer` of the request for `.../swagger/doc.json`.
//!
//! The rewrite is a decorator over the response body: [`transform_body`]
//! buffers the inner body, runs a [`BodyTransform`] and emits the result as
//! a single chunk. Status and headers are kept; only `Content-Length` is
//! dropped because the body length changes.
//!
//! A body the transform cannot parse becomes a body-stream error, which the
//! HTTP server turns into an aborted response. Corrupted or truncated
//! documents are never emitted, and a cancelled request discards the buffer.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::header::{CONTENT_LENGTH, REFERER};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

/// Responses for paths ending in this suffix are candidates for rewriting.
pub const DOC_JSON_SUFFIX: &str = "swagger/doc.json";

/// Path prefix added by the reverse proxy in front of the gateway.
pub const PROXY_PREFIX: &str = "/api";

/// Failure while rewriting a response body.
#[derive(Error, Debug)]
pub enum RewriteError {
    /// The buffered body is not a JSON object.
    #[error("response body is not a JSON object: {0}")]
    NotJsonObject(#[from] serde_json::Error),

    /// The inner body stream failed before it was fully buffered.
    #[error("failed to buffer response body: {0}")]
    Body(#[from] axum::Error),
}

/// A whole-body transformation: buffered bytes in, replacement bytes out.
pub trait BodyTransform: Send + Sync + 'static {
    /// Produce the replacement body.
    fn transform(&self, body: Bytes) -> Result<Bytes, RewriteError>;
}

/// Overwrite the top-level `basePath` key of a JSON object document.
#[derive(Debug, Clone)]
pub struct BasePathPatch {
    base_path: String,
}

impl BasePathPatch {
    /// Patch `basePath` to `base_path`.
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }
}

impl BodyTransform for BasePathPatch {
    fn transform(&self, body: Bytes) -> Result<Bytes, RewriteError> {
        let mut document: Map<String, Value> = serde_json::from_slice(&body)?;
        document.insert("basePath".into(), Value::String(self.base_path.clone()));
        Ok(Bytes::from(serde_json::to_vec(&document)?))
    }
}

/// Replace the body of `response` with `transform` applied to it.
///
/// The inner body is only polled once the outer body is polled, so nothing
/// is buffered for a response that is never sent.
pub fn transform_body<T: BodyTransform>(response: Response, transform: Arc<T>) -> Response {
    let (mut parts, body) = response.into_parts();
    parts.headers.remove(CONTENT_LENGTH);

    let rewritten = futures::stream::once(async move {
        let result = match axum::body::to_bytes(body, usize::MAX).await {
            Ok(buffered) => transform.transform(buffered),
            Err(err) => Err(RewriteError::Body(err)),
        };
        if let Err(err) = &result {
            tracing::error!(error = %err, "response rewrite failed; aborting body");
        }
        result
    });

    Response::from_parts(parts, Body::from_stream(rewritten))
}

/// Decides when a response is rewritten and applies the `basePath` patch.
#[derive(Debug, Clone)]
pub struct ResponseRewriter {
    suffix: String,
    proxy_prefix: String,
    patch: Arc<BasePathPatch>,
}

impl Default for ResponseRewriter {
    fn default() -> Self {
        Self::new(DOC_JSON_SUFFIX, PROXY_PREFIX)
    }
}

impl ResponseRewriter {
    /// Rewrite responses for paths ending in `suffix` whose referer path
    /// starts with `proxy_prefix`; the patched `basePath` is `proxy_prefix`.
    pub fn new(suffix: impl Into<String>, proxy_prefix: impl Into<String>) -> Self {
        let proxy_prefix = proxy_prefix.into();
        Self {
            suffix: suffix.into(),
            patch: Arc::new(BasePathPatch::new(proxy_prefix.clone())),
            proxy_prefix,
        }
    }

    /// Whether a request for `path` with the given `Referer` gets rewritten.
    ///
    /// A missing, non-ASCII or unparsable referer never applies.
    pub fn applies(&self, path: &str, referer: Option<&HeaderValue>) -> bool {
        if !path.ends_with(self.suffix.as_str()) {
            return false;
        }
        referer
            .and_then(referer_path)
            .is_some_and(|p| p.starts_with(self.proxy_prefix.as_str()))
    }

    /// Apply the patch to a response already known to qualify.
    pub fn rewrite(&self, response: Response) -> Response {
        transform_body(response, Arc::clone(&self.patch))
    }
}

/// Path component of a referer. Relative references resolve against `/`.
fn referer_path(value: &HeaderValue) -> Option<String> {
    let raw = value.to_str().ok()?.trim();
    if raw.is_empty() {
        return None;
    }
    let base = Url::parse("http://localhost/").ok()?;
    let url = Url::options().base_url(Some(&base)).parse(raw).ok()?;
    Some(url.path().to_string())
}

/// Rewriter middleware.
///
/// Install with `axum::middleware::from_fn_with_state(rewriter, rewrite_middleware)`.
/// Only successful responses are rewritten; error responses pass through.
pub async fn rewrite_middleware(
    State(rewriter): State<ResponseRewriter>,
    request: Request,
    next: Next,
) -> Response {
    let applies = rewriter.applies(request.uri().path(), request.headers().get(REFERER));
    let response = next.run(request).await;
    if applies && response.status().is_success() {
        tracing::debug!("rewriting basePath for proxied documentation request");
        rewriter.rewrite(response)
    } else {
        response
    }
}
