//! Error types shared by the HTTP adapter.
//!
//! Two kinds of failure exist:
//! - [`GraphQLError`]: an engine-level error that ends up in `errors[]`.
//! - [`HttpError`]: a failure that decides the HTTP status and headers of a
//!   response, optionally carrying the engine errors to report.

use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

use crate::source::Location;

/// Boxed error type accepted from caller-supplied hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// One step of a response path: an object key or a list index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

/// An error produced by parsing, validating or executing a document.
///
/// The serialized form is the standard GraphQL `errors[]` entry: `message`,
/// then `locations`, `path` and `extensions` when present.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{message}")]
pub struct GraphQLError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<PathSegment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
}

impl GraphQLError {
    /// Creates an error with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: Vec::new(),
            path: None,
            extensions: None,
        }
    }

    /// Adds a source location.
    #[must_use]
    pub fn with_location(mut self, location: Location) -> Self {
        self.locations.push(location);
        self
    }

    /// Sets the response path.
    #[must_use]
    pub fn with_path(mut self, path: impl IntoIterator<Item = impl Into<PathSegment>>) -> Self {
        self.path = Some(path.into_iter().map(Into::into).collect());
        self
    }

    /// Adds an extension entry.
    #[must_use]
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.extensions
                .get_or_insert_with(Map::new)
                .insert(key.into(), v);
        }
        self
    }

    /// The default formatter: the serialized form of this error.
    pub fn format(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| {
            let mut entry = Map::new();
            entry.insert("message".to_string(), Value::String(self.message.clone()));
            Value::Object(entry)
        })
    }
}

/// A failure that maps onto an HTTP response.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct HttpError {
    /// Response status.
    pub status: StatusCode,
    /// Human-readable message, reported when no engine errors are carried.
    pub message: String,
    /// Headers to set on the response (e.g. `Allow`).
    pub headers: HeaderMap,
    /// Engine errors to report instead of the message.
    pub graphql_errors: Option<Vec<GraphQLError>>,
}

impl HttpError {
    /// Creates an error with the given status and message.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            headers: HeaderMap::new(),
            graphql_errors: None,
        }
    }

    /// 400 Bad Request.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// 405 Method Not Allowed with the given `Allow` header value.
    pub fn method_not_allowed(allow: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, message)
            .with_header(http::header::ALLOW, HeaderValue::from_static(allow))
    }

    /// 413 Payload Too Large.
    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, message)
    }

    /// 415 Unsupported Media Type.
    pub fn unsupported_media_type(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, message)
    }

    /// 500 Internal Server Error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Adds a response header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Attaches engine errors to report instead of the message.
    #[must_use]
    pub fn with_graphql_errors(mut self, errors: Vec<GraphQLError>) -> Self {
        self.graphql_errors = Some(errors);
        self
    }

    /// Normalizes an arbitrary error: an `HttpError` is kept as-is, anything
    /// else becomes a 500 carrying the error's message.
    pub fn from_box(error: BoxError) -> Self {
        match error.downcast::<HttpError>() {
            Ok(http_error) => *http_error,
            Err(other) => Self::internal(other.to_string()),
        }
    }

    /// Returns the errors to report: the carried engine errors, or one error
    /// wrapping the message.
    pub fn into_graphql_errors(self) -> Vec<GraphQLError> {
        match self.graphql_errors {
            Some(errors) => errors,
            None => vec![GraphQLError::new(self.message)],
        }
    }

    /// Returns true for 4xx statuses.
    pub fn is_client_error(&self) -> bool {
        self.status.is_client_error()
    }

    /// Returns true for 5xx statuses.
    pub fn is_server_error(&self) -> bool {
        self.status.is_server_error()
    }
}

/// Result type for operations that fail with an [`HttpError`].
pub type HttpResult<T> = std::result::Result<T, HttpError>;
