//! GraphiQL page rendering.
//!
//! [`render_explorer`] produces a self-contained HTML page that loads
//! GraphiQL from unpkg, pre-filled with the request's query, variables,
//! operation name and (when the query already ran) its result.

use serde::{Deserialize, Serialize};
use serde_json::Value;

const GRAPHIQL_VERSION: &str = "1.4.7";
const REACT_VERSION: &str = "17.0.2";
const PROMISE_POLYFILL_VERSION: &str = "8.2.0";
const FETCH_VERSION: &str = "4.2.0";
const CODE_MIRROR_VERSION: &str = "5.65.2";
const SUBSCRIPTIONS_TRANSPORT_VERSION: &str = "0.9.18";
const SUBSCRIPTIONS_FETCHER_VERSION: &str = "0.0.2";

const TEMPLATE: &str = include_str!("../templates/explorer.html");

/// What the page is pre-filled with.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExplorerData {
    pub query: Option<String>,
    pub variables: Option<Value>,
    pub operation_name: Option<String>,
    /// The formatted execution result, absent when nothing ran.
    pub result: Option<Value>,
}

/// A CodeMirror theme for the editors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EditorTheme {
    /// A theme bundled with CodeMirror, loaded from unpkg.
    Named(String),
    /// A theme served from a custom stylesheet URL.
    Custom { name: String, url: String },
}

impl EditorTheme {
    /// The theme name passed to GraphiQL.
    pub fn name(&self) -> &str {
        match self {
            Self::Named(name) | Self::Custom { name, .. } => name,
        }
    }

    /// The stylesheet to load.
    pub fn stylesheet_url(&self) -> String {
        match self {
            Self::Named(name) => format!(
                "https://unpkg.com/codemirror@{CODE_MIRROR_VERSION}/theme/{name}.css"
            ),
            Self::Custom { url, .. } => url.clone(),
        }
    }
}

/// Explorer configuration.
///
/// # Example
///
/// ```
/// use graphql_http_explorer::ExplorerOptions;
///
/// let options = ExplorerOptions::new()
///     .default_query("{ hello }")
///     .header_editor_enabled(true);
/// assert_eq!(options.default_query.as_deref(), Some("{ hello }"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorerOptions {
    /// Query shown when the page opens without one.
    pub default_query: Option<String>,
    /// Shows the request headers editor.
    pub header_editor_enabled: Option<bool>,
    /// Keeps edited headers in local storage.
    pub should_persist_headers: Option<bool>,
    /// WebSocket endpoint used for subscription operations.
    pub subscription_endpoint: Option<String>,
    pub editor_theme: Option<EditorTheme>,
}

impl ExplorerOptions {
    /// Creates options with GraphiQL's defaults.
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn default_query(mut self, query: impl Into<String>) -> Self {
        self.default_query = Some(query.into());
        self
    }

    #[must_use]
    pub fn header_editor_enabled(mut self, enabled: bool) -> Self {
        self.header_editor_enabled = Some(enabled);
        self
    }

    #[must_use]
    pub fn should_persist_headers(mut self, persist: bool) -> Self {
        self.should_persist_headers = Some(persist);
        self
    }

    #[must_use]
    pub fn subscription_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.subscription_endpoint = Some(endpoint.into());
        self
    }

    #[must_use]
    pub fn editor_theme(mut self, theme: EditorTheme) -> Self {
        self.editor_theme = Some(theme);
        self
    }
}

/// Serializes a value for embedding inside a `<script>` element.
///
/// `/` is escaped so no value can close the script early. Absent values
/// become `undefined`.
pub fn safe_serialize<T: Serialize + ?Sized>(value: Option<&T>) -> String {
    value
        .and_then(|v| serde_json::to_string(v).ok())
        .map_or_else(|| "undefined".to_string(), |json| json.replace('/', "\\/"))
}

/// Renders the GraphiQL page.
pub fn render_explorer(data: &ExplorerData, options: Option<&ExplorerOptions>) -> String {
    let options = options.cloned().unwrap_or_default();

    let variables = data
        .variables
        .as_ref()
        .and_then(|v| serde_json::to_string_pretty(v).ok());
    let response = data
        .result
        .as_ref()
        .and_then(|v| serde_json::to_string_pretty(v).ok());

    let theme = options.editor_theme.as_ref();
    let theme_link = theme.map_or_else(String::new, |theme| {
        format!(
            r#"<link href="{}" rel="stylesheet" />"#,
            escape_attribute(&theme.stylesheet_url())
        )
    });

    let endpoint = options.subscription_endpoint.as_deref();
    let subscription_scripts = endpoint.map_or_else(String::new, |_| {
        format!(
            "<script src=\"https://unpkg.com/subscriptions-transport-ws@{SUBSCRIPTIONS_TRANSPORT_VERSION}/browser/client.js\"></script>\n  \
             <script src=\"https://unpkg.com/graphiql-subscriptions-fetcher@{SUBSCRIPTIONS_FETCHER_VERSION}/browser/client.js\"></script>"
        )
    });
    let fetcher = match endpoint {
        Some(endpoint) => format!(
            "var subscriptionsClient = new window.SubscriptionsTransportWs.SubscriptionClient(\n      \
             {},\n      {{ reconnect: true }}\n    );\n    \
             var fetcher = window.GraphiQLSubscriptionsFetcher.graphQLFetcher(\n      \
             subscriptionsClient,\n      graphQLFetcher\n    );",
            safe_serialize(Some(endpoint))
        ),
        None => "var fetcher = graphQLFetcher;".to_string(),
    };

    fill_template(TEMPLATE, |key| {
        Some(match key {
            "GRAPHIQL_VERSION" => GRAPHIQL_VERSION.to_string(),
            "REACT_VERSION" => REACT_VERSION.to_string(),
            "PROMISE_POLYFILL_VERSION" => PROMISE_POLYFILL_VERSION.to_string(),
            "FETCH_VERSION" => FETCH_VERSION.to_string(),
            "EDITOR_THEME_LINK" => theme_link.clone(),
            "SUBSCRIPTION_SCRIPTS" => subscription_scripts.clone(),
            "FETCHER" => fetcher.clone(),
            "EDITOR_THEME" => safe_serialize(theme.map(EditorTheme::name)),
            "QUERY" => safe_serialize(data.query.as_deref()),
            "RESPONSE" => safe_serialize(response.as_deref()),
            "VARIABLES" => safe_serialize(variables.as_deref()),
            "OPERATION_NAME" => safe_serialize(data.operation_name.as_deref()),
            "DEFAULT_QUERY" => safe_serialize(options.default_query.as_deref()),
            "HEADER_EDITOR_ENABLED" => safe_serialize(options.header_editor_enabled.as_ref()),
            "SHOULD_PERSIST_HEADERS" => safe_serialize(options.should_persist_headers.as_ref()),
            _ => return None,
        })
    })
}

/// Replaces every `{{KEY}}` in one pass, so substituted text is never
/// scanned for placeholders again.
fn fill_template(template: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(template.len() + 1024);
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}").and_then(|end| Some((end, lookup(&after[..end])?))) {
            Some((end, value)) => {
                out.push_str(&value);
                rest = &after[end + 2..];
            }
            None => {
                out.push_str("{{");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}
