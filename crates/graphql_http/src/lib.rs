//! Serve any GraphQL engine over HTTP.
//!
//! This crate adapts an [`Engine`] to hyper's request/response model:
//! - `handler`: The request lifecycle, from parameters to response
//! - `options`: Per-request configuration and caller hooks
//! - `negotiate`: `Accept` negotiation between JSON and GraphiQL
//! - `response`: Response bodies and helpers
//! - `server`: A standalone HTTP/1.1 server
//!
//! # Example
//!
//! ```ignore
//! use graphql_http::{serve, GraphQLHttp, OptionsData, ServerConfig};
//!
//! let handler = GraphQLHttp::builder()
//!     .engine(MyEngine::new())
//!     .options(OptionsData::new(schema).explorer(true))
//!     .build()?;
//!
//! serve(handler, ServerConfig::new().port(4000)).await?;
//! ```

pub mod handler;
pub mod negotiate;
pub mod options;
pub mod response;
pub mod server;

pub use async_trait::async_trait;

pub use handler::{GraphQLHttp, GraphQLHttpBuilder, SetupError};
pub use negotiate::{preferred, prefers_html};
pub use options::{
    BoxFuture, ExecuteFn, Explorer, ExtensionsFn, FormatErrorFn, Options, OptionsData,
    OptionsFactory, OptionsRequest, ParseFn, RequestInfo, ResponseHeaders, ValidateFn,
};
pub use response::BoxBody;
pub use server::{serve, serve_listener, ServerConfig, ServerError};

// Re-exports for convenience
pub use graphql_http_core::{
    BoxError, Engine, ExecutionArgs, ExecutionResult, FormattedExecutionResult, GraphQLError,
    HttpError, Location, OperationKind, PathSegment, RequestContext, Source,
};
pub use graphql_http_explorer::{EditorTheme, ExplorerData, ExplorerOptions};
pub use graphql_http_params::{BodyConfig, GraphQLParams, PreparsedBody};
