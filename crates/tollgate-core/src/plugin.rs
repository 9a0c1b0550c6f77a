//! # Plugins & Documentation Capability
//!
//! Plugins are loaded once at startup and never unloaded. A plugin may
//! optionally expose the [`OpenApiSpec`] capability; the gateway only
//! publishes documentation for plugins that do. The capability check is
//! [`Plugin::as_open_api`], which returns `None` for plugins without it.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use crate::error::PluginError;

/// The "generate API document" capability.
pub trait OpenApiSpec: Send + Sync {
    /// The plugin's API document as a JSON object (Swagger 2.0 or OpenAPI 3).
    fn open_api_spec(&self) -> Value;
}

/// A loaded backend plugin.
pub trait Plugin: Send + Sync {
    /// Unique plugin name. Used as a route segment.
    fn name(&self) -> &str;

    /// One-line description shown in the plugin listing.
    fn description(&self) -> &str {
        ""
    }

    /// Capability check for API documentation.
    fn as_open_api(&self) -> Option<&dyn OpenApiSpec> {
        None
    }
}

/// Check that a plugin name is usable as a single URL path segment.
///
/// Allowed: ASCII letters, digits, `-`, `_` and `.` (but not `.` or `..`).
pub fn validate_name(name: &str) -> Result<(), PluginError> {
    let invalid = |reason| PluginError::InvalidName {
        name: name.to_string(),
        reason,
    };
    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name == "." || name == ".." {
        return Err(invalid("name is a relative path segment"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(invalid("only ASCII letters, digits, '-', '_' and '.' are allowed"));
    }
    Ok(())
}

/// The set of plugins loaded at startup, keyed by name.
///
/// Iteration order is lexicographic by name, so route registration and
/// listings are deterministic.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: BTreeMap<String, Arc<dyn Plugin>>,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.plugins.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PluginRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plugin. Names must be valid and unique.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) -> Result<(), PluginError> {
        let name = plugin.name().to_string();
        validate_name(&name)?;
        if self.plugins.contains_key(&name) {
            return Err(PluginError::Duplicate { name });
        }
        self.plugins.insert(name, plugin);
        Ok(())
    }

    /// Look up a plugin by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Plugin>> {
        self.plugins.get(name)
    }

    /// Iterate over `(name, plugin)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Plugin>)> {
        self.plugins.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of loaded plugins.
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether no plugins are loaded.
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Register every `*.json` document found in `dir` as a [`SpecFilePlugin`].
    pub fn load_spec_dir(&mut self, dir: &Path) -> Result<usize, PluginError> {
        let plugins = SpecFilePlugin::load_dir(dir)?;
        let count = plugins.len();
        for plugin in plugins {
            self.register(Arc::new(plugin))?;
        }
        Ok(count)
    }
}

/// A documentation-only plugin backed by a JSON file on disk.
///
/// The file stem is the plugin name: `specs/jira.json` becomes plugin `jira`.
#[derive(Debug, Clone)]
pub struct SpecFilePlugin {
    name: String,
    description: String,
    document: Value,
}

impl SpecFilePlugin {
    /// Build a plugin from an in-memory document. The document must be a
    /// JSON object.
    pub fn new(name: impl Into<String>, document: Value) -> Result<Self, PluginError> {
        let name = name.into();
        validate_name(&name)?;
        let description = document
            .pointer("/info/description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if !document.is_object() {
            return Err(PluginError::SpecLoad {
                path: format!("{name}.json").into(),
                reason: "expected a JSON object".into(),
            });
        }
        Ok(Self {
            name,
            description,
            document,
        })
    }

    /// Load one spec file.
    pub fn load(path: &Path) -> Result<Self, PluginError> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| PluginError::SpecLoad {
                path: path.to_path_buf(),
                reason: "file name is not valid UTF-8".into(),
            })?
            .to_string();
        let raw = std::fs::read(path)?;
        let document: Value =
            serde_json::from_slice(&raw).map_err(|e| PluginError::SpecLoad {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Self::new(name, document).map_err(|err| match err {
            PluginError::SpecLoad { reason, .. } => PluginError::SpecLoad {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    /// Load every `*.json` file in `dir`, sorted by file name.
    pub fn load_dir(dir: &Path) -> Result<Vec<Self>, PluginError> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut plugins = Vec::with_capacity(paths.len());
        for path in paths {
            let plugin = Self::load(&path)?;
            tracing::debug!(plugin = %plugin.name, path = %path.display(), "loaded plugin spec");
            plugins.push(plugin);
        }
        Ok(plugins)
    }
}

impl OpenApiSpec for SpecFilePlugin {
    fn open_api_spec(&self) -> Value {
        self.document.clone()
    }
}

impl Plugin for SpecFilePlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn as_open_api(&self) -> Option<&dyn OpenApiSpec> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Bare(&'static str);

    impl Plugin for Bare {
        fn name(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn plugin_without_capability_returns_none() {
        assert!(Bare("dora").as_open_api().is_none());
    }

    #[test]
    fn spec_file_plugin_has_capability() {
        let plugin = SpecFilePlugin::new("jira", json!({"swagger": "2.0"})).unwrap();
        let spec = plugin.as_open_api().expect("capability");
        assert_eq!(spec.open_api_spec()["swagger"], "2.0");
    }

    #[test]
    fn registry_rejects_duplicates() {
        let mut registry = PluginRegistry::new();
        registry.register(Arc::new(Bare("github"))).unwrap();
        let err = registry.register(Arc::new(Bare("github"))).unwrap_err();
        assert!(matches!(err, PluginError::Duplicate { ref name } if name == "github"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn registry_iterates_in_name_order() {
        let mut registry = PluginRegistry::new();
        for name in ["jira", "github", "gitlab"] {
            registry.register(Arc::new(Bare(name))).unwrap();
        }
        let names: Vec<&str> = registry.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["github", "gitlab", "jira"]);
    }

    #[test]
    fn name_validation() {
        assert!(validate_name("jira").is_ok());
        assert!(validate_name("azure-devops_v2.1").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("{name}").is_err());
        assert!(validate_name("with space").is_err());
    }

    #[test]
    fn non_object_document_rejected() {
        let err = SpecFilePlugin::new("jira", json!(["not", "an", "object"])).unwrap_err();
        assert!(matches!(err, PluginError::SpecLoad { .. }));
    }

    #[test]
    fn description_taken_from_info() {
        let plugin = SpecFilePlugin::new(
            "jira",
            json!({"info": {"description": "Jira issue collector"}}),
        )
        .unwrap();
        assert_eq!(plugin.description(), "Jira issue collector");
    }

    #[test]
    fn load_dir_reads_json_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("jira.json"), r#"{"swagger":"2.0"}"#).unwrap();
        std::fs::write(dir.path().join("github.json"), r#"{"openapi":"3.0.0"}"#).unwrap();
        std::fs::write(dir.path().join("README.md"), "ignored").unwrap();

        let mut registry = PluginRegistry::new();
        let count = registry.load_spec_dir(dir.path()).unwrap();
        assert_eq!(count, 2);
        assert!(registry.get("jira").is_some());
        assert!(registry.get("github").is_some());
        assert!(registry.get("README").is_none());
    }

    #[test]
    fn load_dir_fails_on_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        let err = SpecFilePlugin::load_dir(dir.path()).unwrap_err();
        assert!(matches!(err, PluginError::SpecLoad { .. }));
    }

    #[test]
    fn non_object_file_error_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("specs-jira.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        match SpecFilePlugin::load(&path).unwrap_err() {
            PluginError::SpecLoad { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
