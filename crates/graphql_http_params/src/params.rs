//! GraphQL request parameters.

use http::request::Parts;
use http::Uri;
use http_body::Body;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use graphql_http_core::{BoxError, HttpError, HttpResult};

use crate::body::{parse_body, BodyConfig};

/// The parameters of one GraphQL request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLParams {
    pub query: Option<String>,
    pub variables: Option<Value>,
    pub operation_name: Option<String>,
    /// Set when the client asked for JSON regardless of `Accept`.
    #[serde(default)]
    pub raw: bool,
}

impl GraphQLParams {
    /// Combines URL query-string parameters with body parameters.
    ///
    /// A URL parameter wins over the body parameter of the same name.
    /// Values of the wrong type are ignored, except a `variables` string that
    /// is not valid JSON, which is rejected. Array variables are kept for
    /// the engine to refuse.
    pub fn from_sources(url: &[(String, String)], body: &Map<String, Value>) -> HttpResult<Self> {
        let pick = |key: &str| {
            url.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| Value::String(v.clone()))
                .or_else(|| body.get(key).cloned())
        };

        let query = match pick("query") {
            Some(Value::String(query)) => Some(query),
            _ => None,
        };

        let variables = match pick("variables") {
            Some(Value::String(text)) => parse_variables(&text)?,
            Some(value @ (Value::Object(_) | Value::Array(_))) => Some(value),
            _ => None,
        };

        let operation_name = match pick("operationName") {
            Some(Value::String(name)) => Some(name),
            _ => None,
        };

        let raw = url.iter().any(|(k, _)| k == "raw") || body.contains_key("raw");

        Ok(Self {
            query,
            variables,
            operation_name,
            raw,
        })
    }
}

fn parse_variables(text: &str) -> HttpResult<Option<Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Null) => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(_) => Err(HttpError::bad_request("Variables are invalid JSON.")),
    }
}

/// Decodes the query string of a URI into key/value pairs, in order.
pub fn url_pairs(uri: &Uri) -> Vec<(String, String)> {
    uri.query()
        .and_then(|query| serde_urlencoded::from_str(query).ok())
        .unwrap_or_default()
}

/// Extracts GraphQL parameters from a request.
///
/// Reads `query`, `variables`, `operationName` and `raw` from the URL query
/// string and from the body.
///
/// # Errors
///
/// Fails with an [`HttpError`] carrying the status to respond with:
/// 400 for malformed JSON, variables or compressed data, 413 for oversized
/// bodies, 415 for unsupported charsets and content encodings.
pub async fn get_graphql_params<B>(
    parts: &Parts,
    body: B,
    config: &BodyConfig,
) -> HttpResult<GraphQLParams>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let url = url_pairs(&parts.uri);
    let body = parse_body(parts, body, config).await?;
    GraphQLParams::from_sources(&url, &body)
}
