//! # Aggregate OpenAPI Document
//!
//! The gateway's own endpoints, generated with utoipa derive macros and
//! served at `/swagger/doc.json` with a `basePath` of `/`. Behind a
//! path-prefixing proxy the [`ResponseRewriter`](crate::rewrite::ResponseRewriter)
//! patches that `basePath` on the way out.

use serde_json::Value;
use utoipa::OpenApi;

use crate::docs::{DocError, PluginDocEntry};

/// Instance name of the aggregate document.
pub const AGGREGATE_INSTANCE: &str = "swagger";

/// UI title of the aggregate document.
pub const AGGREGATE_TITLE: &str = "tollgate API";

/// Assembled OpenAPI spec for the gateway's own surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "tollgate API",
        description = "Request-dispatch gateway in front of a pluggable backend.\n\nWhile a destructive database migration awaits confirmation, every gated route answers 428 until `GET /proceed-db-migration` is called. Per-plugin API documents are served under `/plugins/swagger/{name}/`.",
        license(name = "Apache-2.0")
    ),
    paths(
        crate::routes::system::ping,
        crate::routes::system::health,
        crate::routes::system::version,
        crate::routes::migration::proceed_db_migration,
        crate::routes::plugins::list_plugins,
    ),
    components(
        schemas(
            crate::error::ErrorBody,
            crate::routes::system::VersionInfo,
            crate::routes::plugins::PluginSummary,
        ),
    ),
    tags(
        (name = "system", description = "Liveness and version probes; never gated"),
        (name = "migration", description = "Operator confirmation of pending database migrations"),
        (name = "plugins", description = "Loaded backend plugins"),
    )
)]
pub struct ApiDoc;

/// The aggregate document as a JSON object with `basePath` set to `/`.
pub fn aggregate_document() -> Result<Value, DocError> {
    let mut document =
        serde_json::to_value(ApiDoc::openapi()).map_err(|source| DocError::Serialize {
            name: AGGREGATE_INSTANCE.to_string(),
            source,
        })?;
    match document.as_object_mut() {
        Some(object) => {
            object.insert("basePath".into(), Value::String("/".into()));
        }
        None => {
            return Err(DocError::NotAnObject {
                name: AGGREGATE_INSTANCE.to_string(),
            })
        }
    }
    Ok(document)
}

/// Documentation entry served under `/swagger/`.
pub fn aggregate_entry() -> Result<PluginDocEntry, DocError> {
    PluginDocEntry::new(
        AGGREGATE_INSTANCE,
        AGGREGATE_TITLE.to_string(),
        aggregate_document()?,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_generates_with_gateway_paths() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "tollgate API");
        for path in ["/ping", "/health", "/version", "/proceed-db-migration", "/plugins"] {
            assert!(spec.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn aggregate_document_has_root_base_path() {
        let document = aggregate_document().unwrap();
        assert_eq!(document["basePath"], "/");
        assert_eq!(document["info"]["title"], "tollgate API");
    }

    #[test]
    fn aggregate_entry_metadata() {
        let entry = aggregate_entry().unwrap();
        assert_eq!(entry.instance_name, "swagger");
        assert_eq!(entry.title, "tollgate API");
        let doc: Value = serde_json::from_slice(entry.document()).unwrap();
        assert!(doc["components"]["schemas"]["ErrorBody"].is_object());
    }
}
