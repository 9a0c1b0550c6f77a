//! End-to-end tests for the assembled pipeline.
//!
//! Every test drives the full router returned by [`Pipeline::build`] with
//! `tower::ServiceExt::oneshot`, backed by the in-memory migrator and
//! static plugin fixtures.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tollgate_api::error::ApiSuccess;
use tollgate_api::gate::MIGRATION_REQUIRED_WARNING;
use tollgate_api::pipeline::{PipelineError, RouteBuilder, RouteRegistrar};
use tollgate_api::{AppState, Gateway, Pipeline};
use tollgate_core::{GatewayConfig, InMemoryMigrator, Plugin, PluginRegistry, SpecFilePlugin};
use tower::ServiceExt;

// ── Fixtures ────────────────────────────────────────────────────────────────

/// A backend module contributing two business routes.
struct Blueprints;

impl RouteRegistrar for Blueprints {
    fn register(&self, routes: RouteBuilder) -> Result<RouteBuilder, PipelineError> {
        routes
            .route(Method::GET, "/blueprints", "list_blueprints", || async {
                ApiSuccess::ok(vec!["daily-jira"])
            })?
            .route(Method::POST, "/blueprints", "create_blueprint", || async {
                ApiSuccess::ok("created").with_status(StatusCode::CREATED)
            })
    }
}

/// A plugin without API documentation.
struct Dora;

impl Plugin for Dora {
    fn name(&self) -> &str {
        "dora"
    }
}

fn plugins() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    for name in ["jira", "github"] {
        let document = json!({
            "swagger": "2.0",
            "basePath": "/",
            "info": {"description": format!("{name} collector")},
            "paths": {}
        });
        registry
            .register(Arc::new(SpecFilePlugin::new(name, document).unwrap()))
            .unwrap();
    }
    registry.register(Arc::new(Dora)).unwrap();
    registry
}

fn gateway_with(config: GatewayConfig, migrator: Arc<InMemoryMigrator>) -> Gateway {
    let state = AppState::new(config, migrator, plugins());
    Pipeline::new(state).with_routes(Blueprints).build().unwrap()
}

fn gateway(migrator: Arc<InMemoryMigrator>) -> Gateway {
    gateway_with(GatewayConfig::default(), migrator)
}

fn with_api_key(key: &str) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.api_key = Some(key.to_string());
    config.proxy_auth_enabled = true;
    config
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Bytes) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Bytes) {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

fn json_body(bytes: &Bytes) -> Value {
    serde_json::from_slice(bytes).unwrap()
}

// ── Gate: open state ────────────────────────────────────────────────────────

#[tokio::test]
async fn open_gate_serves_every_route() {
    let gw = gateway(Arc::new(InMemoryMigrator::new(false)));
    for uri in [
        "/ping",
        "/health",
        "/version",
        "/plugins",
        "/blueprints",
        "/proceed-db-migration",
        "/swagger/doc.json",
        "/plugins/swagger/jira/doc.json",
    ] {
        let (status, _) = get(&gw.router, uri).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
    }

    let (status, _) = send(
        &gw.router,
        Request::builder()
            .method(Method::POST)
            .uri("/blueprints")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

// ── Gate: blocked state ─────────────────────────────────────────────────────

#[tokio::test]
async fn blocked_gate_rejects_business_routes_with_warning() {
    let gw = gateway(Arc::new(InMemoryMigrator::new(true)));
    for uri in ["/plugins", "/blueprints"] {
        let (status, body) = get(&gw.router, uri).await;
        assert_eq!(status, StatusCode::PRECONDITION_REQUIRED, "{uri}");
        let body = json_body(&body);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "MIGRATION_REQUIRED");
        assert_eq!(body["message"], MIGRATION_REQUIRED_WARNING);
    }
}

#[tokio::test]
async fn blocked_gate_admits_allow_listed_routes() {
    let migrator = Arc::new(InMemoryMigrator::new(true));
    let gw = gateway(migrator.clone());
    for uri in [
        "/ping",
        "/health",
        "/version",
        "/swagger/doc.json",
        "/swagger/index.html",
        "/plugins/swagger/github/doc.json",
    ] {
        let (status, _) = get(&gw.router, uri).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
    }
    assert_eq!(migrator.execution_count(), 0);
}

#[tokio::test]
async fn version_reports_crate_version() {
    let gw = gateway(Arc::new(InMemoryMigrator::new(true)));
    let (_, body) = get(&gw.router, "/version").await;
    let body = json_body(&body);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn failing_status_source_fails_closed_but_probes_stay_up() {
    let migrator = Arc::new(InMemoryMigrator::new(false));
    migrator.fail_status(Some("database unreachable".into()));
    let gw = gateway(migrator);

    let (status, body) = get(&gw.router, "/blueprints").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(&body)["code"], "SERVICE_UNAVAILABLE");

    let (status, _) = get(&gw.router, "/ping").await;
    assert_eq!(status, StatusCode::OK);
}

// ── Proceed endpoint ────────────────────────────────────────────────────────

#[tokio::test]
async fn proceed_without_pending_migration_is_idempotent() {
    let migrator = Arc::new(InMemoryMigrator::new(false));
    let gw = gateway(migrator.clone());
    for _ in 0..3 {
        let (status, body) = get(&gw.router, "/proceed-db-migration").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&body), json!({"success": true, "data": null}));
    }
    assert_eq!(migrator.execution_count(), 0);
}

#[tokio::test]
async fn proceed_opens_the_gate() {
    let migrator = Arc::new(InMemoryMigrator::new(true));
    let gw = gateway(migrator.clone());

    let (status, _) = get(&gw.router, "/blueprints").await;
    assert_eq!(status, StatusCode::PRECONDITION_REQUIRED);

    let (status, _) = get(&gw.router, "/proceed-db-migration").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(migrator.execution_count(), 1);

    let (status, _) = get(&gw.router, "/blueprints").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn failed_proceed_keeps_the_gate_closed() {
    let migrator = Arc::new(InMemoryMigrator::new(true));
    migrator.fail_next("column already exists");
    let gw = gateway(migrator.clone());

    let (status, body) = get(&gw.router, "/proceed-db-migration").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(&body);
    assert_eq!(body["code"], "MIGRATION_FAILED");
    assert!(!body["message"].as_str().unwrap().contains("column"));

    let (status, _) = get(&gw.router, "/blueprints").await;
    assert_eq!(status, StatusCode::PRECONDITION_REQUIRED);

    let (status, _) = get(&gw.router, "/proceed-db-migration").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(migrator.execution_count(), 2);
}

#[tokio::test]
async fn racing_proceed_calls_execute_once() {
    let migrator =
        Arc::new(InMemoryMigrator::new(true).with_execution_delay(Duration::from_millis(50)));
    let gw = gateway(migrator.clone());

    let calls = (0..4).map(|_| get(&gw.router, "/proceed-db-migration"));
    let results = futures::future::join_all(calls).await;
    for (status, _) in results {
        assert_eq!(status, StatusCode::OK);
    }
    assert_eq!(migrator.execution_count(), 1);
}

// ── Documentation ───────────────────────────────────────────────────────────

#[tokio::test]
async fn plugin_docs_are_reachable_per_plugin() {
    let gw = gateway(Arc::new(InMemoryMigrator::new(false)));

    let (status, jira) = get(&gw.router, "/plugins/swagger/jira/doc.json").await;
    assert_eq!(status, StatusCode::OK);
    let (status, github) = get(&gw.router, "/plugins/swagger/github/doc.json").await;
    assert_eq!(status, StatusCode::OK);

    let jira = json_body(&jira);
    let github = json_body(&github);
    assert_eq!(jira["info"]["title"], "jira API");
    assert_eq!(github["info"]["title"], "github API");
    assert_ne!(jira, github);

    assert_eq!(gw.docs.get("jira").unwrap().instance_name, "jira");
    assert_eq!(gw.docs.get("github").unwrap().instance_name, "github");
}

#[tokio::test]
async fn bare_plugin_docs_path_serves_ui_while_blocked() {
    let gw = gateway(Arc::new(InMemoryMigrator::new(true)));
    let (status, body) = get(&gw.router, "/plugins/swagger/jira/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8_lossy(&body).contains("<title>jira API</title>"));
}

#[tokio::test]
async fn plugin_without_docs_has_no_route() {
    let gw = gateway(Arc::new(InMemoryMigrator::new(false)));
    assert!(gw.docs.get("dora").is_none());

    let (status, body) = get(&gw.router, "/plugins/swagger/dora/doc.json").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json_body(&body)["code"], "NOT_FOUND");
}

#[tokio::test]
async fn aggregate_ui_page_is_served() {
    let gw = gateway(Arc::new(InMemoryMigrator::new(false)));
    for uri in ["/swagger/", "/swagger/index.html"] {
        let (status, body) = get(&gw.router, uri).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert!(String::from_utf8_lossy(&body).contains("tollgate API"));
    }
}

// ── Response rewriting ──────────────────────────────────────────────────────

fn doc_request(referer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri("/swagger/doc.json");
    if let Some(referer) = referer {
        builder = builder.header(header::REFERER, referer);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn aggregate_doc_behind_proxy_gets_prefixed_base_path() {
    let gw = gateway(Arc::new(InMemoryMigrator::new(false)));
    let (_, direct) = send(&gw.router, doc_request(None)).await;
    let (status, proxied) = send(
        &gw.router,
        doc_request(Some("http://devlake.example/api/swagger/index.html")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let mut direct = json_body(&direct);
    let proxied = json_body(&proxied);
    assert_eq!(direct["basePath"], "/");
    assert_eq!(proxied["basePath"], "/api");

    direct["basePath"] = json!("/api");
    assert_eq!(direct, proxied);
}

#[tokio::test]
async fn aggregate_doc_without_referer_is_byte_identical() {
    let gw = gateway(Arc::new(InMemoryMigrator::new(false)));
    let expected = tollgate_api::openapi::aggregate_entry().unwrap();

    let (_, body) = send(&gw.router, doc_request(None)).await;
    assert_eq!(&body, expected.document());

    let (_, unproxied) = send(&gw.router, doc_request(Some("http://host/ui/"))).await;
    assert_eq!(&unproxied, expected.document());

    let (_, malformed) = send(&gw.router, doc_request(Some("::not a url::"))).await;
    assert_eq!(&malformed, expected.document());
}

// ── Auth ordering ───────────────────────────────────────────────────────────

#[tokio::test]
async fn probes_bypass_auth() {
    let gw = gateway_with(with_api_key("k1"), Arc::new(InMemoryMigrator::new(false)));
    let (status, _) = send(
        &gw.router,
        Request::builder()
            .uri("/ping")
            .header(header::AUTHORIZATION, "Bearer wrong")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn auth_runs_before_the_gate() {
    let gw = gateway_with(with_api_key("k1"), Arc::new(InMemoryMigrator::new(true)));
    let (status, _) = send(
        &gw.router,
        Request::builder()
            .uri("/blueprints")
            .header(header::AUTHORIZATION, "Bearer wrong")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &gw.router,
        Request::builder()
            .uri("/blueprints")
            .header(header::AUTHORIZATION, "Bearer k1")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::PRECONDITION_REQUIRED);
}

#[tokio::test]
async fn primary_rejection_is_not_rescued_by_fallback() {
    let gw = gateway_with(with_api_key("k1"), Arc::new(InMemoryMigrator::new(false)));
    let (status, _) = send(
        &gw.router,
        Request::builder()
            .uri("/blueprints")
            .header(header::AUTHORIZATION, "Bearer wrong")
            .header("x-forwarded-user", "alice")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &gw.router,
        Request::builder()
            .uri("/blueprints")
            .header("x-forwarded-user", "alice")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

// ── CORS ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn business_routes_answer_preflight() {
    let gw = gateway(Arc::new(InMemoryMigrator::new(false)));
    let response = gw
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/blueprints")
                .header(header::ORIGIN, "http://localhost:4000")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:4000"
    );
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "432000");
}

// ── Route table ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn route_table_lists_every_registration_in_order() {
    let gw = gateway(Arc::new(InMemoryMigrator::new(false)));
    let routes: Vec<(String, &str)> = gw
        .routes
        .records()
        .iter()
        .map(|r| (format!("{} {}", r.method, r.path), r.handler))
        .collect();
    assert_eq!(
        routes,
        vec![
            ("GET /ping".to_string(), "ping"),
            ("GET /health".to_string(), "health"),
            ("GET /version".to_string(), "version"),
            ("GET /proceed-db-migration".to_string(), "proceed_db_migration"),
            ("GET /swagger/".to_string(), "swagger_ui"),
            ("GET /swagger/{*file}".to_string(), "swagger_files"),
            ("GET /plugins/swagger/github/".to_string(), "plugin_swagger_ui"),
            ("GET /plugins/swagger/github/{*file}".to_string(), "plugin_swagger"),
            ("GET /plugins/swagger/jira/".to_string(), "plugin_swagger_ui"),
            ("GET /plugins/swagger/jira/{*file}".to_string(), "plugin_swagger"),
            ("GET /plugins".to_string(), "list_plugins"),
            ("GET /blueprints".to_string(), "list_blueprints"),
            ("POST /blueprints".to_string(), "create_blueprint"),
        ]
    );
}

#[tokio::test]
async fn unknown_route_is_404_envelope() {
    let gw = gateway(Arc::new(InMemoryMigrator::new(false)));
    let (status, body) = get(&gw.router, "/no/such/route").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json_body(&body)["success"], false);
}
