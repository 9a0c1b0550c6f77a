//! # Documentation Registry
//!
//! Per-plugin API documents, built once at startup from the
//! [`PluginRegistry`] and read-only afterwards. Each capability-bearing
//! plugin gets its own route tree:
//!
//! | Path                                   | Content              |
//! |----------------------------------------|----------------------|
//! | `/plugins/swagger/{name}/index.html`   | interactive UI page  |
//! | `/plugins/swagger/{name}/doc.json`     | the plugin document  |
//!
//! Plugins without the [`OpenApiSpec`](tollgate_core::OpenApiSpec)
//! capability are skipped and get no route, so their paths 404.
//!
//! Registration is an upsert: registering a name twice replaces the first
//! document. Routes are installed once per distinct name after registration
//! completes, so a replaced document never produces a route conflict.

pub mod ui;

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::Path;
use axum::http::header;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, MethodRouter};
use serde_json::{Map, Value};
use thiserror::Error;
use tollgate_core::plugin::validate_name;
use tollgate_core::{PluginError, PluginRegistry};

use crate::error::AppError;

use self::ui::UiConfig;

/// Route prefix for per-plugin documentation.
pub const PLUGIN_DOCS_PREFIX: &str = "/plugins/swagger";

/// Route prefix for the aggregate gateway documentation.
pub const AGGREGATE_DOCS_PREFIX: &str = "/swagger";

/// Error registering a document.
#[derive(Error, Debug)]
pub enum DocError {
    /// The name cannot be used in a route.
    #[error(transparent)]
    InvalidName(#[from] PluginError),

    /// The document is not a JSON object.
    #[error("document for {name} is not a JSON object")]
    NotAnObject {
        /// Plugin name.
        name: String,
    },

    /// The document could not be serialized.
    #[error("failed to serialize document for {name}: {source}")]
    Serialize {
        /// Plugin name.
        name: String,
        /// Serializer error.
        source: serde_json::Error,
    },
}

/// One registered document with its UI metadata.
#[derive(Debug, Clone)]
pub struct PluginDocEntry {
    /// Instance name the document is registered under (the plugin name).
    pub instance_name: String,
    /// UI page title, `"<name> API"`.
    pub title: String,
    document: Bytes,
    page: String,
}

impl PluginDocEntry {
    /// Build an entry, defaulting `info.title` to the entry title when the
    /// document does not set one.
    pub fn new(instance_name: &str, title: String, document: Value) -> Result<Self, DocError> {
        let Value::Object(mut document) = document else {
            return Err(DocError::NotAnObject {
                name: instance_name.to_string(),
            });
        };
        default_info_title(&mut document, &title);

        let bytes = serde_json::to_vec(&document).map_err(|source| DocError::Serialize {
            name: instance_name.to_string(),
            source,
        })?;

        Ok(Self {
            instance_name: instance_name.to_string(),
            page: UiConfig::for_title(title.clone()).render(),
            title,
            document: Bytes::from(bytes),
        })
    }

    /// The serialized JSON document.
    pub fn document(&self) -> &Bytes {
        &self.document
    }

    /// Serve one file below the entry's route prefix.
    pub fn serve(&self, file: &str) -> Response {
        match file.trim_start_matches('/') {
            "doc.json" => (
                [(header::CONTENT_TYPE, "application/json; charset=utf-8")],
                self.document.clone(),
            )
                .into_response(),
            "" | "index.html" => Html(self.page.clone()).into_response(),
            other => AppError::NotFound(format!(
                "no documentation file {other:?} for {}",
                self.instance_name
            ))
            .into_response(),
        }
    }

    /// A GET handler serving the UI page, for the bare `{prefix}/` path.
    pub fn index_handler<S>(self: Arc<Self>) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        get(move || {
            let entry = Arc::clone(&self);
            async move { entry.serve("index.html") }
        })
    }

    /// A GET handler serving this entry under a `{*file}` route.
    pub fn handler<S>(self: Arc<Self>) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        get(move |Path(file): Path<String>| {
            let entry = Arc::clone(&self);
            async move { entry.serve(&file) }
        })
    }
}

fn default_info_title(document: &mut Map<String, Value>, title: &str) {
    let info = document
        .entry("info")
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(info) = info {
        let missing = info
            .get("title")
            .and_then(Value::as_str)
            .map_or(true, str::is_empty);
        if missing {
            info.insert("title".into(), Value::String(title.to_string()));
        }
    }
}

/// Documents keyed by plugin name.
#[derive(Debug, Clone, Default)]
pub struct DocRegistry {
    entries: BTreeMap<String, Arc<PluginDocEntry>>,
}

impl DocRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every plugin that exposes the documentation capability.
    pub fn from_plugins(plugins: &PluginRegistry) -> Result<Self, DocError> {
        let mut registry = Self::new();
        for (name, plugin) in plugins.iter() {
            match plugin.as_open_api() {
                Some(spec) => {
                    registry.register(name, spec.open_api_spec())?;
                }
                None => tracing::debug!(plugin = name, "plugin exposes no API document; skipped"),
            }
        }
        Ok(registry)
    }

    /// Register (or replace) the document for `name`. Returns the replaced
    /// entry, if any.
    pub fn register(
        &mut self,
        name: &str,
        document: Value,
    ) -> Result<Option<Arc<PluginDocEntry>>, DocError> {
        validate_name(name)?;
        let entry = PluginDocEntry::new(name, format!("{name} API"), document)?;
        let previous = self.entries.insert(name.to_string(), Arc::new(entry));
        if previous.is_some() {
            tracing::warn!(plugin = name, "plugin document registered twice; last write wins");
        }
        Ok(previous)
    }

    /// Look up the document for `name`.
    pub fn get(&self, name: &str) -> Option<Arc<PluginDocEntry>> {
        self.entries.get(name).cloned()
    }

    /// Registered names, in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of registered documents.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Route path and handler serving the documentation of `name`.
    pub fn route<S>(&self, name: &str) -> Option<(String, MethodRouter<S>)>
    where
        S: Clone + Send + Sync + 'static,
    {
        let entry = self.get(name)?;
        Some((
            format!("{PLUGIN_DOCS_PREFIX}/{name}/{{*file}}"),
            entry.handler(),
        ))
    }

    /// Route path and handler serving the UI page at the bare
    /// `/plugins/swagger/{name}/` path.
    pub fn index_route<S>(&self, name: &str) -> Option<(String, MethodRouter<S>)>
    where
        S: Clone + Send + Sync + 'static,
    {
        let entry = self.get(name)?;
        Some((format!("{PLUGIN_DOCS_PREFIX}/{name}/"), entry.index_handler()))
    }

    /// Index and file routes for every registered document, in name order.
    pub fn routes<S>(&self) -> Vec<(String, MethodRouter<S>)>
    where
        S: Clone + Send + Sync + 'static,
    {
        self.names()
            .flat_map(|name| self.index_route(name).into_iter().chain(self.route(name)))
            .collect()
    }
}
