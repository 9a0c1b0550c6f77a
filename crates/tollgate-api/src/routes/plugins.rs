//! Plugin listing. A business route: authenticated, gated and CORS-wrapped.

use axum::extract::State;
use axum::http::Method;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::docs::PLUGIN_DOCS_PREFIX;
use crate::error::{ApiSuccess, ErrorBody};
use crate::pipeline::{PipelineError, RouteBuilder, RouteRegistrar};
use crate::state::AppState;

/// One loaded plugin.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PluginSummary {
    /// Unique plugin name.
    pub name: String,
    /// Free-text description, empty when the plugin has none.
    pub description: String,
    /// Whether the plugin exposes an API document.
    pub documented: bool,
    /// Documentation UI path, when `documented`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_url: Option<String>,
}

/// Business routes contributed by the gateway itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct PluginRoutes;

impl RouteRegistrar for PluginRoutes {
    fn register(&self, routes: RouteBuilder) -> Result<RouteBuilder, PipelineError> {
        routes.route(Method::GET, "/plugins", "list_plugins", list_plugins)
    }
}

/// GET /plugins — list loaded plugins in name order.
#[utoipa::path(
    get,
    path = "/plugins",
    responses(
        (status = 200, description = "Loaded plugins", body = Vec<PluginSummary>),
        (status = 428, description = "Database migration requires confirmation", body = ErrorBody),
    ),
    tag = "plugins"
)]
pub async fn list_plugins(State(state): State<AppState>) -> ApiSuccess<Vec<PluginSummary>> {
    let plugins = state
        .plugins
        .iter()
        .map(|(name, plugin)| {
            let documented = plugin.as_open_api().is_some();
            PluginSummary {
                name: name.to_string(),
                description: plugin.description().to_string(),
                documented,
                docs_url: documented.then(|| format!("{PLUGIN_DOCS_PREFIX}/{name}/index.html")),
            }
        })
        .collect();
    ApiSuccess::ok(plugins)
}
