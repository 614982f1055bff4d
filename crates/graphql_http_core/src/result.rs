//! Execution results, before and after error formatting.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::GraphQLError;

/// The outcome of executing a document.
///
/// `data` distinguishes "absent" (`None`, the engine never started executing)
/// from "null" (`Some(Value::Null)`, a non-null field failed at the root).
/// Both count as missing data when deciding the response status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionResult {
    pub data: Option<Value>,
    pub errors: Vec<GraphQLError>,
    pub extensions: Option<Map<String, Value>>,
}

impl ExecutionResult {
    /// A result carrying data and no errors.
    pub fn from_data(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    /// A result without data, carrying the given errors.
    pub fn from_errors(errors: Vec<GraphQLError>) -> Self {
        Self {
            data: None,
            errors,
            extensions: None,
        }
    }

    /// Returns true when `data` is absent or null.
    pub fn is_missing_data(&self) -> bool {
        matches!(self.data, None | Some(Value::Null))
    }

    /// Returns true if there are errors.
    ///
    /// Useful in an extensions hook, which sees the result before it is
    /// formatted.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Applies a formatter to every error.
    pub fn format_with(self, mut format: impl FnMut(&GraphQLError) -> Value) -> FormattedExecutionResult {
        let errors = if self.errors.is_empty() {
            None
        } else {
            Some(self.errors.iter().map(&mut format).collect())
        };

        FormattedExecutionResult {
            data: self.data,
            errors,
            extensions: self.extensions,
        }
    }
}

/// The wire shape of a response: `{"data"?, "errors"?, "extensions"?}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormattedExecutionResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
}

impl FormattedExecutionResult {
    /// Serializes compactly, or with 2-space indentation when `pretty`.
    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}
