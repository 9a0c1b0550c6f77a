//! Interactive documentation page.
//!
//! The page loads Swagger UI from the public `swagger-ui-dist` bundle and
//! points it at a document URL relative to the page, so the same page works
//! behind any path prefix.

use serde::Serialize;

const SWAGGER_UI_DIST: &str = "https://unpkg.com/swagger-ui-dist@5";

/// Options passed to `SwaggerUIBundle`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UiConfig {
    /// Document URL, relative to the page.
    pub url: String,
    /// `list`, `full` or `none`.
    pub doc_expansion: String,
    /// Depth to which models are expanded by default.
    pub default_models_expand_depth: i32,
    /// Enable deep linking for tags and operations.
    pub deep_linking: bool,
    /// Keep authorization data across page reloads.
    pub persist_authorization: bool,
    /// Page title.
    #[serde(skip)]
    pub title: String,
}

impl UiConfig {
    /// The configuration used for every documentation page.
    pub fn for_title(title: impl Into<String>) -> Self {
        Self {
            url: "doc.json".into(),
            doc_expansion: "list".into(),
            default_models_expand_depth: 1,
            deep_linking: true,
            persist_authorization: false,
            title: title.into(),
        }
    }

    /// Render the HTML page.
    pub fn render(&self) -> String {
        // Serializing a struct of strings, bools and ints cannot fail.
        let options = serde_json::to_string(self).unwrap_or_else(|_| "{}".into());
        format!(
            r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>{title}</title>
  <link rel="stylesheet" href="{dist}/swagger-ui.css">
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="{dist}/swagger-ui-bundle.js"></script>
  <script>
    window.onload = function () {{
      const options = {options};
      options.dom_id = "#swagger-ui";
      window.ui = SwaggerUIBundle(options);
    }};
  </script>
</body>
</html>
"##,
            title = escape_html(&self.title),
            dist = SWAGGER_UI_DIST,
            options = options,
        )
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_carries_title_and_options() {
        let html = UiConfig::for_title("jira API").render();
        assert!(html.contains("<title>jira API</title>"));
        assert!(html.contains(r#""url":"doc.json""#));
        assert!(html.contains(r#""docExpansion":"list""#));
        assert!(html.contains(r#""defaultModelsExpandDepth":1"#));
        assert!(html.contains(r#""deepLinking":true"#));
        assert!(html.contains(r#""persistAuthorization":false"#));
    }

    #[test]
    fn page_mounts_into_swagger_ui_element() {
        let html = UiConfig::for_title("jira API").render();
        assert!(html.contains(r##"options.dom_id = "#swagger-ui";"##));
        assert!(html.trim_end().ends_with("</html>"));
    }

    #[test]
    fn title_is_escaped() {
        let html = UiConfig::for_title("<script>").render();
        assert!(html.contains("&lt;script&gt;"));
    }
}
