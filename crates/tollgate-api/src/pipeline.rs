//! # Pipeline Composition
//!
//! Builds the single dispatch [`Router`] and fixes the order of every
//! middleware step. Outermost first:
//!
//! ```text
//! TraceLayer
//!  ├─ /ping, /health, /version                         (unconditional)
//!  └─ Auth(primary) → Auth(fallback) → MigrationGate
//!      ├─ /proceed-db-migration                        (allow-listed)
//!      ├─ /swagger/*              → ResponseRewriter   (allow-listed)
//!      ├─ /plugins/swagger/{name}/*                    (allow-listed)
//!      └─ business routes         → CORS
//! ```
//!
//! Gate exemptions come from the [`AllowList`], not from where a route sits
//! in this tree. Registering an extra business route before or after the
//! built-in ones changes nothing about which paths the gate admits.
//!
//! Every route is recorded in a [`RouteTable`] with the number of handlers
//! (middleware steps plus the endpoint) that run for it, and logged at
//! debug level. A registration conflict, or a business route that would fall
//! under a gate exemption, aborts the build; nothing is served from a
//! partially built pipeline.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::handler::Handler;
use axum::http::{Method, Uri};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, on, MethodFilter};
use axum::Router;
use thiserror::Error;

use crate::auth::{auth_middleware, ApiKeyAuthenticator, AuthStep, ProxyAuthenticator};
use crate::docs::{DocError, DocRegistry, AGGREGATE_DOCS_PREFIX, PLUGIN_DOCS_PREFIX};
use crate::error::AppError;
use crate::gate::{migration_gate_middleware, AllowList, MigrationGate};
use crate::middleware::cors::CorsPolicy;
use crate::middleware::tracing_layer;
use crate::openapi;
use crate::rewrite::{rewrite_middleware, ResponseRewriter};
use crate::routes::migration::{proceed_db_migration, PROCEED_PATH};
use crate::routes::plugins::PluginRoutes;
use crate::routes::system;
use crate::state::AppState;

/// Startup failure while assembling the pipeline. Always fatal.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A documentation entry could not be built.
    #[error("documentation registration failed: {0}")]
    Docs(#[from] DocError),

    /// Two registrations claim the same method and path.
    #[error("route {method} {path} registered twice")]
    DuplicateRoute {
        /// HTTP method.
        method: Method,
        /// Route path.
        path: String,
    },

    /// A business route falls under a gate exemption, so it would stay
    /// reachable while a migration awaits confirmation.
    #[error("business route {path} is under a gate-exempt path")]
    ExemptBusinessRoute {
        /// Route path.
        path: String,
    },

    /// The method has no routing filter (extension methods such as `PURGE`).
    #[error("cannot route method {0}")]
    UnsupportedMethod(Method),
}

/// One registered route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRecord {
    /// HTTP method.
    pub method: Method,
    /// Route path as registered.
    pub path: String,
    /// Endpoint name.
    pub handler: &'static str,
    /// Middleware steps plus the endpoint that run for this route.
    pub handlers: usize,
}

/// Registered routes in registration order.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    records: Vec<RouteRecord>,
    seen: BTreeSet<(String, String)>,
}

impl RouteTable {
    fn record(
        &mut self,
        method: Method,
        path: &str,
        handler: &'static str,
        handlers: usize,
    ) -> Result<(), PipelineError> {
        if !self.seen.insert((method.to_string(), path.to_string())) {
            return Err(PipelineError::DuplicateRoute {
                method,
                path: path.to_string(),
            });
        }
        tracing::debug!(
            method = %method,
            path = %path,
            handler = handler,
            handlers = handlers,
            "route registered"
        );
        self.records.push(RouteRecord {
            method,
            path: path.to_string(),
            handler,
            handlers,
        });
        Ok(())
    }

    /// All records, in registration order.
    pub fn records(&self) -> &[RouteRecord] {
        &self.records
    }

    /// Look up one route.
    pub fn find(&self, method: &Method, path: &str) -> Option<&RouteRecord> {
        self.records
            .iter()
            .find(|r| r.method == *method && r.path == path)
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Collects business routes from [`RouteRegistrar`]s.
pub struct RouteBuilder {
    router: Router<AppState>,
    entries: Vec<(Method, String, &'static str)>,
}

impl std::fmt::Debug for RouteBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteBuilder")
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

impl Default for RouteBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteBuilder {
    /// Empty builder.
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            entries: Vec::new(),
        }
    }

    /// Route `method path` to `handler`, recorded under `name`.
    pub fn route<H, T>(
        mut self,
        method: Method,
        path: &str,
        name: &'static str,
        handler: H,
    ) -> Result<Self, PipelineError>
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        let filter = MethodFilter::try_from(method.clone())
            .map_err(|_| PipelineError::UnsupportedMethod(method.clone()))?;
        if self.entries.iter().any(|(m, p, _)| *m == method && p == path) {
            return Err(PipelineError::DuplicateRoute {
                method,
                path: path.to_string(),
            });
        }
        self.router = self.router.route(path, on(filter, handler));
        self.entries.push((method, path.to_string(), name));
        Ok(self)
    }

    /// Let `registrar` add its routes.
    pub fn register(self, registrar: &dyn RouteRegistrar) -> Result<Self, PipelineError> {
        registrar.register(self)
    }

    /// The assembled router.
    pub fn into_router(self) -> Router<AppState> {
        self.router
    }
}

/// Business-route provider. Implemented by each backend module that
/// contributes routes.
pub trait RouteRegistrar: Send + Sync {
    /// Add routes to `routes`.
    fn register(&self, routes: RouteBuilder) -> Result<RouteBuilder, PipelineError>;
}

/// Paths the gate admits while a migration awaits confirmation.
pub fn default_allow_list() -> AllowList {
    AllowList::new()
        .exact("/ping")
        .exact("/health")
        .exact("/version")
        .exact(PROCEED_PATH)
        .prefix(AGGREGATE_DOCS_PREFIX)
        .prefix(PLUGIN_DOCS_PREFIX)
}

/// The built pipeline.
#[derive(Debug)]
pub struct Gateway {
    /// Dispatch entry point.
    pub router: Router,
    /// Every registered route.
    pub routes: RouteTable,
    /// Per-plugin documents.
    pub docs: Arc<DocRegistry>,
}

impl Gateway {
    /// Drop the metadata and keep the router.
    pub fn into_router(self) -> Router {
        self.router
    }
}

/// Pipeline configuration. Consumed by [`Pipeline::build`].
pub struct Pipeline {
    state: AppState,
    authenticators: Vec<AuthStep>,
    registrars: Vec<Arc<dyn RouteRegistrar>>,
    allow_list: AllowList,
    cors: CorsPolicy,
    rewriter: ResponseRewriter,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let auth: Vec<&str> = self.authenticators.iter().map(|a| a.name()).collect();
        f.debug_struct("Pipeline")
            .field("authenticators", &auth)
            .field("registrars", &self.registrars.len())
            .field("allow_list", &self.allow_list)
            .field("cors", &self.cors)
            .field("rewriter", &self.rewriter)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Pipeline with the defaults derived from `state.config`: API-key auth
    /// when a key is set, proxy auth when enabled, the gateway's own
    /// business routes, the default allow-list and CORS policy.
    pub fn new(state: AppState) -> Self {
        let mut authenticators: Vec<AuthStep> = Vec::new();
        if let Some(key) = &state.config.api_key {
            authenticators.push(Arc::new(ApiKeyAuthenticator::new(key.clone())));
        }
        if state.config.proxy_auth_enabled {
            authenticators.push(Arc::new(ProxyAuthenticator));
        }
        let cors = CorsPolicy::with_max_age(state.config.cors_max_age);

        Self {
            state,
            authenticators,
            registrars: vec![Arc::new(PluginRoutes)],
            allow_list: default_allow_list(),
            cors,
            rewriter: ResponseRewriter::default(),
        }
    }

    /// Append an auth step. Steps run in the order they were added.
    pub fn with_authenticator(mut self, step: AuthStep) -> Self {
        self.authenticators.push(step);
        self
    }

    /// Append a business-route provider.
    pub fn with_routes(mut self, registrar: impl RouteRegistrar + 'static) -> Self {
        self.registrars.push(Arc::new(registrar));
        self
    }

    /// Replace the gate allow-list.
    pub fn with_allow_list(mut self, allow_list: AllowList) -> Self {
        self.allow_list = allow_list;
        self
    }

    /// Replace the CORS policy.
    pub fn with_cors(mut self, cors: CorsPolicy) -> Self {
        self.cors = cors;
        self
    }

    /// Replace the documentation rewriter.
    pub fn with_rewriter(mut self, rewriter: ResponseRewriter) -> Self {
        self.rewriter = rewriter;
        self
    }

    /// Assemble the router.
    pub fn build(self) -> Result<Gateway, PipelineError> {
        let Self {
            state,
            authenticators,
            registrars,
            allow_list,
            cors,
            rewriter,
        } = self;
        let mut table = RouteTable::default();

        // Handler counts include TraceLayer and the endpoint itself.
        let unconditional_steps = 2;
        let gated_steps = 1 + authenticators.len() + 1 + 1;

        // 1. Unconditional probes.
        table.record(Method::GET, "/ping", "ping", unconditional_steps)?;
        table.record(Method::GET, "/health", "health", unconditional_steps)?;
        table.record(Method::GET, "/version", "version", unconditional_steps)?;
        let unconditional = Router::<AppState>::new()
            .route("/ping", get(system::ping))
            .route("/health", get(system::health))
            .route("/version", get(system::version));

        // 3. Proceed endpoint.
        table.record(Method::GET, PROCEED_PATH, "proceed_db_migration", gated_steps)?;
        let mut gated: Router<AppState> =
            Router::new().route(PROCEED_PATH, get(proceed_db_migration));

        // 5. Documentation: aggregate behind the rewriter, then per plugin.
        let aggregate = Arc::new(openapi::aggregate_entry()?);
        let aggregate_index = format!("{AGGREGATE_DOCS_PREFIX}/");
        let aggregate_files = format!("{AGGREGATE_DOCS_PREFIX}/{{*file}}");
        table.record(Method::GET, &aggregate_index, "swagger_ui", gated_steps + 1)?;
        table.record(Method::GET, &aggregate_files, "swagger_files", gated_steps + 1)?;
        gated = gated.merge(
            Router::<AppState>::new()
                .route(&aggregate_index, Arc::clone(&aggregate).index_handler())
                .route(&aggregate_files, aggregate.handler())
                .layer(from_fn_with_state(rewriter, rewrite_middleware)),
        );

        let docs = DocRegistry::from_plugins(&state.plugins)?;
        for (path, handler) in docs.routes() {
            let name = if path.ends_with('/') {
                "plugin_swagger_ui"
            } else {
                "plugin_swagger"
            };
            table.record(Method::GET, &path, name, gated_steps)?;
            gated = gated.route(&path, handler);
        }

        // 6–7. Business routes behind CORS.
        let mut business = RouteBuilder::new();
        for registrar in &registrars {
            business = business.register(registrar.as_ref())?;
        }
        for (method, path, name) in &business.entries {
            if allow_list.allows(path) {
                return Err(PipelineError::ExemptBusinessRoute { path: path.clone() });
            }
            table.record(method.clone(), path, *name, gated_steps + 1)?;
        }
        gated = gated.merge(business.into_router().layer(cors.layer()));

        // 4. Gate, wrapping everything registered above.
        let gate = MigrationGate::new(
            Arc::clone(&state.migrator),
            allow_list,
            state.config.migration_status_timeout,
        );
        gated = gated.layer(from_fn_with_state(gate, migration_gate_middleware));

        // 2. Auth; the last layer added runs first, so add in reverse.
        for step in authenticators.into_iter().rev() {
            tracing::debug!(step = step.name(), "auth step installed");
            gated = gated.layer(from_fn_with_state(step, auth_middleware));
        }

        let router = unconditional
            .merge(gated)
            .fallback(not_found)
            .layer(tracing_layer::layer())
            .with_state(state);

        tracing::info!(routes = table.len(), docs = docs.len(), "pipeline built");
        Ok(Gateway {
            router,
            routes: table,
            docs: Arc::new(docs),
        })
    }
}

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("no route for {}", uri.path()))
}
