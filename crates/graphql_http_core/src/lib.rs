//! Shared types for serving GraphQL over HTTP.
//!
//! This crate provides the types every other graphql_http crate speaks:
//! - `source`: Query text and line/column locations
//! - `error`: Engine errors and HTTP failures
//! - `result`: Execution results and their wire shape
//! - `context`: Request-scoped, type-keyed context
//! - `engine`: The trait a GraphQL implementation provides

pub mod context;
pub mod engine;
pub mod error;
pub mod result;
pub mod source;

pub use context::RequestContext;
pub use engine::{Engine, ExecutionArgs, OperationKind};
pub use error::{BoxError, GraphQLError, HttpError, HttpResult, PathSegment};
pub use result::{ExecutionResult, FormattedExecutionResult};
pub use source::{Location, Source, REQUEST_SOURCE_NAME};
