//! # CORS Policy
//!
//! Applied to business routes only. The default policy mirrors the
//! gateway's historical behavior: any origin, credentials allowed, and a
//! long preflight cache.
//!
//! A literal `*` cannot be sent together with
//! `Access-Control-Allow-Credentials: true`, so a wildcard origin with
//! credentials is served by echoing the request `Origin` back. Browsers
//! then accept credentialed requests from every site. Deployments that
//! know their UI origin should list it explicitly.

use std::time::Duration;

use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE, ORIGIN};
use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Wildcard origin marker.
pub const ANY_ORIGIN: &str = "*";

/// Configured CORS policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsPolicy {
    /// Allowed origins; `*` allows any.
    pub origins: Vec<String>,
    /// Allowed request methods.
    pub methods: Vec<Method>,
    /// Allowed request headers.
    pub allow_headers: Vec<HeaderName>,
    /// Response headers exposed to scripts.
    pub expose_headers: Vec<HeaderName>,
    /// Whether credentialed requests are allowed.
    pub allow_credentials: bool,
    /// Preflight cache duration.
    pub max_age: Duration,
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self {
            origins: vec![ANY_ORIGIN.to_string()],
            methods: vec![
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::OPTIONS,
            ],
            allow_headers: vec![ORIGIN, CONTENT_TYPE],
            expose_headers: vec![CONTENT_LENGTH],
            allow_credentials: true,
            max_age: tollgate_core::config::DEFAULT_CORS_MAX_AGE,
        }
    }
}

impl CorsPolicy {
    /// Default policy with the given preflight cache duration.
    pub fn with_max_age(max_age: Duration) -> Self {
        Self {
            max_age,
            ..Self::default()
        }
    }

    fn allow_origin(&self) -> AllowOrigin {
        if self.origins.iter().any(|o| o == ANY_ORIGIN) {
            if self.allow_credentials {
                return AllowOrigin::mirror_request();
            }
            return AllowOrigin::any();
        }
        let origins: Vec<HeaderValue> = self
            .origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    }

    /// Build the tower-http layer for this policy.
    pub fn layer(&self) -> CorsLayer {
        CorsLayer::new()
            .allow_origin(self.allow_origin())
            .allow_methods(self.methods.clone())
            .allow_headers(self.allow_headers.clone())
            .expose_headers(self.expose_headers.clone())
            .allow_credentials(self.allow_credentials)
            .max_age(self.max_age)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn app(policy: &CorsPolicy) -> Router {
        Router::new()
            .route("/blueprints", get(|| async { "ok" }))
            .layer(policy.layer())
    }

    fn preflight(origin: &str) -> Request<Body> {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/blueprints")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "PATCH")
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn default_max_age_is_120_hours() {
        assert_eq!(CorsPolicy::default().max_age, Duration::from_secs(120 * 3600));
    }

    #[tokio::test]
    async fn wildcard_with_credentials_mirrors_origin() {
        let response = app(&CorsPolicy::default())
            .oneshot(preflight("http://ui.example:4000"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://ui.example:4000"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "432000");
    }

    #[tokio::test]
    async fn simple_request_exposes_content_length() {
        let response = app(&CorsPolicy::default())
            .oneshot(
                Request::builder()
                    .uri("/blueprints")
                    .header(header::ORIGIN, "http://ui.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let exposed = response.headers()[header::ACCESS_CONTROL_EXPOSE_HEADERS]
            .to_str()
            .unwrap()
            .to_ascii_lowercase();
        assert!(exposed.contains("content-length"));
    }

    #[tokio::test]
    async fn explicit_origin_list_rejects_others() {
        let policy = CorsPolicy {
            origins: vec!["http://ui.example".into()],
            ..CorsPolicy::default()
        };
        let response = app(&policy)
            .oneshot(preflight("http://evil.example"))
            .await
            .unwrap();
        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }
}
