//! The request handler.
//!
//! [`GraphQLHttp::handle`] turns one HTTP request into one HTTP response:
//!
//! 1. extract parameters from the URL and body
//! 2. resolve the configuration
//! 3. reject methods other than GET and POST
//! 4. decide whether GraphiQL may be shown
//! 5. validate, parse, validate and execute
//! 6. run the extensions hook
//! 7. map any failure to a status and an error list
//! 8. report missing data as a server error
//! 9. format errors
//! 10. respond with GraphiQL or JSON

use http::request::Parts;
use http::{HeaderMap, Method, Request, Response, StatusCode};
use http_body::Body;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use graphql_http_core::{
    BoxError, Engine, ExecutionArgs, ExecutionResult, GraphQLError, HttpError, RequestContext,
    Source,
};
use graphql_http_explorer::{render_explorer, ExplorerData, ExplorerOptions};
use graphql_http_params::{get_graphql_params, BodyConfig, GraphQLParams};

use crate::negotiate::prefers_html;
use crate::options::{
    Explorer, FormatErrorFn, Options, OptionsData, OptionsRequest, RequestInfo, ResponseHeaders,
};
use crate::response::{extend_headers, html_response, json_response, BoxBody};

const INVALID_OPTIONS: &str = "GraphQL middleware option function must return an options object or a promise which will be resolved to an options object.";
const MISSING_SCHEMA: &str = "GraphQL middleware options must contain a schema.";

/// Errors raised while constructing a handler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    #[error("GraphQL middleware requires options.")]
    MissingOptions,
    #[error("GraphQL middleware requires an engine.")]
    MissingEngine,
}

/// Serves a GraphQL engine over HTTP.
pub struct GraphQLHttp<E: Engine> {
    engine: Arc<E>,
    options: Options<E>,
    body_config: BodyConfig,
}

impl<E: Engine> Clone for GraphQLHttp<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            options: self.options.clone(),
            body_config: self.body_config,
        }
    }
}

/// Builder for [`GraphQLHttp`].
pub struct GraphQLHttpBuilder<E: Engine> {
    engine: Option<Arc<E>>,
    options: Option<Options<E>>,
    body_config: BodyConfig,
}

impl<E: Engine> Default for GraphQLHttpBuilder<E> {
    fn default() -> Self {
        Self {
            engine: None,
            options: None,
            body_config: BodyConfig::default(),
        }
    }
}

impl<E: Engine> GraphQLHttpBuilder<E> {
    /// Sets the engine.
    #[must_use]
    pub fn engine(mut self, engine: impl Into<Arc<E>>) -> Self {
        self.engine = Some(engine.into());
        self
    }

    /// Sets the configuration, static or computed per request.
    #[must_use]
    pub fn options(mut self, options: impl Into<Options<E>>) -> Self {
        self.options = Some(options.into());
        self
    }

    /// Sets the maximum request body size.
    #[must_use]
    pub fn body_limit(mut self, limit: usize) -> Self {
        self.body_config = self.body_config.limit(limit);
        self
    }

    /// Builds the handler.
    ///
    /// # Errors
    ///
    /// Fails when no options or no engine were supplied.
    pub fn build(self) -> Result<GraphQLHttp<E>, SetupError> {
        let options = self.options.ok_or(SetupError::MissingOptions)?;
        let engine = self.engine.ok_or(SetupError::MissingEngine)?;
        Ok(GraphQLHttp {
            engine,
            options,
            body_config: self.body_config,
        })
    }
}

/// How the response is presented, learned while processing.
///
/// Kept outside the pipeline so failures are reported with whatever was
/// known when they happened.
struct Presentation {
    pretty: bool,
    format_error: Option<FormatErrorFn>,
    context: Arc<RequestContext>,
    show_explorer: bool,
    explorer_options: Option<ExplorerOptions>,
    params: Option<GraphQLParams>,
}

impl Presentation {
    fn new(context: Arc<RequestContext>) -> Self {
        Self {
            pretty: false,
            format_error: None,
            context,
            show_explorer: false,
            explorer_options: None,
            params: None,
        }
    }

    fn apply<E: Engine>(&mut self, options: &OptionsData<E>) {
        self.pretty = options.pretty.unwrap_or(false);
        self.format_error = options.formatter();
        if let Some(context) = &options.context {
            self.context = Arc::clone(context);
        }
    }

    fn explorer_data(&self, result: Option<Value>) -> ExplorerData {
        let params = self.params.clone().unwrap_or_default();
        ExplorerData {
            query: params.query,
            variables: params.variables,
            operation_name: params.operation_name,
            result,
        }
    }
}

enum Outcome {
    /// Show GraphiQL without running anything.
    Explorer(ExplorerData),
    Executed(ExecutionResult),
}

impl<E: Engine> GraphQLHttp<E> {
    /// Returns a builder.
    pub fn builder() -> GraphQLHttpBuilder<E> {
        GraphQLHttpBuilder::default()
    }

    /// Creates a handler from an engine and its configuration.
    pub fn new(engine: impl Into<Arc<E>>, options: impl Into<Options<E>>) -> Self {
        Self {
            engine: engine.into(),
            options: options.into(),
            body_config: BodyConfig::default(),
        }
    }

    /// The served engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Handles one request.
    ///
    /// Every failure is reported in the response; this never fails.
    pub async fn handle<B>(&self, request: Request<B>) -> Response<BoxBody>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = request.into_parts();
        let response_headers = ResponseHeaders::default();
        let mut presentation = Presentation::new(Arc::new(RequestContext::from_parts(&parts)));

        let outcome = self
            .process(&parts, body, &response_headers, &mut presentation)
            .await;

        let mut status = StatusCode::OK;
        let mut error_headers = HeaderMap::new();
        let result = match outcome {
            Ok(Outcome::Explorer(data)) => {
                let page = render_explorer(&data, presentation.explorer_options.as_ref());
                let mut response = html_response(StatusCode::OK, page);
                extend_headers(&mut response, response_headers.snapshot());
                return response;
            }
            Ok(Outcome::Executed(result)) => result,
            Err(error) => {
                if error.is_server_error() {
                    warn!(status = %error.status, message = %error.message, "GraphQL request failed");
                } else {
                    debug!(status = %error.status, message = %error.message, "GraphQL request rejected");
                }
                status = error.status;
                error_headers = error.headers.clone();
                ExecutionResult::from_errors(error.into_graphql_errors())
            }
        };

        if status == StatusCode::OK && result.is_missing_data() {
            status = StatusCode::INTERNAL_SERVER_ERROR;
        }

        let context = Arc::clone(&presentation.context);
        let formatted = match &presentation.format_error {
            Some(format) => result.format_with(|error| format(error, &context)),
            None => result.format_with(GraphQLError::format),
        };

        let mut response = if presentation.show_explorer {
            let data = presentation.explorer_data(serde_json::to_value(&formatted).ok());
            html_response(
                status,
                render_explorer(&data, presentation.explorer_options.as_ref()),
            )
        } else {
            let body = formatted.to_json(presentation.pretty).unwrap_or_else(|error| {
                format!(r#"{{"errors":[{{"message":{}}}]}}"#, Value::String(error.to_string()))
            });
            json_response(status, body)
        };

        extend_headers(&mut response, response_headers.snapshot());
        extend_headers(&mut response, error_headers);
        response
    }

    async fn process<B>(
        &self,
        parts: &Parts,
        body: B,
        response_headers: &ResponseHeaders,
        presentation: &mut Presentation,
    ) -> Result<Outcome, HttpError>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let params = match get_graphql_params(parts, body, &self.body_config).await {
            Ok(params) => params,
            Err(error) => {
                // Still honor `pretty` and the error formatter.
                let options = self
                    .resolve_options(parts, response_headers, &presentation.context, None)
                    .await?;
                presentation.apply(&options);
                return Err(error);
            }
        };
        presentation.params = Some(params.clone());

        let options = self
            .resolve_options(
                parts,
                response_headers,
                &presentation.context,
                Some(params.clone()),
            )
            .await?;
        presentation.apply(&options);

        let schema = options
            .schema
            .clone()
            .ok_or_else(|| HttpError::internal(MISSING_SCHEMA))?;
        let context = Arc::clone(&presentation.context);

        if parts.method != Method::GET && parts.method != Method::POST {
            return Err(HttpError::method_not_allowed(
                "GET, POST",
                "GraphQL only supports GET and POST requests.",
            ));
        }

        let explorer = options.explorer.clone().unwrap_or(Explorer::Enabled(false));
        presentation.show_explorer =
            explorer.is_enabled() && !params.raw && prefers_html(&parts.headers);
        presentation.explorer_options = explorer.options().cloned();

        let Some(query) = params.query.as_deref() else {
            if presentation.show_explorer {
                return Ok(Outcome::Explorer(ExplorerData::default()));
            }
            return Err(HttpError::bad_request("Must provide query string."));
        };

        let schema_errors = self.engine.validate_schema(&schema);
        if !schema_errors.is_empty() {
            return Err(HttpError::internal("GraphQL schema validation error.")
                .with_graphql_errors(schema_errors));
        }

        let source = Source::new(query);
        let parsed = match &options.custom_parse_fn {
            Some(parse) => parse(&source),
            None => self.engine.parse(&source),
        };
        let document = parsed.map_err(|error| {
            HttpError::bad_request("GraphQL syntax error.").with_graphql_errors(vec![error])
        })?;

        let mut rules = self.engine.specified_rules();
        rules.extend(options.validation_rules.iter().cloned());
        let validation_errors = match &options.custom_validate_fn {
            Some(validate) => validate(&schema, &document, &rules),
            None => self.engine.validate(&schema, &document, &rules),
        };
        if !validation_errors.is_empty() {
            return Err(HttpError::bad_request("GraphQL validation error.")
                .with_graphql_errors(validation_errors));
        }

        let operation_name = params.operation_name.as_deref();
        if parts.method == Method::GET {
            // An undeterminable operation is left for execution to report.
            if let Some(kind) = self.engine.operation_kind(&document, operation_name) {
                if !kind.is_query() {
                    if presentation.show_explorer {
                        return Ok(Outcome::Explorer(presentation.explorer_data(None)));
                    }
                    return Err(HttpError::method_not_allowed(
                        "POST",
                        format!("Can only perform a {kind} operation from a POST request."),
                    ));
                }
            }
        }

        let args = ExecutionArgs::<E> {
            schema: &schema,
            document: &document,
            root_value: options.root_value.as_deref(),
            context: &context,
            variables: params.variables.as_ref(),
            operation_name,
            field_resolver: options.field_resolver.as_deref(),
            type_resolver: options.type_resolver.as_deref(),
        };

        debug!(operation_name = ?operation_name, "executing GraphQL operation");
        let executed = match &options.custom_execute_fn {
            Some(execute) => execute(args).await,
            None => self.engine.execute(args).await,
        };
        let mut result = executed.map_err(|error| {
            HttpError::bad_request("GraphQL execution context error.")
                .with_graphql_errors(vec![error])
        })?;

        if let Some(extensions) = &options.extensions {
            let info = RequestInfo {
                document: &document,
                variables: params.variables.as_ref(),
                operation_name,
                result: &result,
                context: &context,
            };
            if let Some(map) = extensions(info).await.map_err(HttpError::from_box)? {
                result.extensions = Some(map);
            }
        }

        Ok(Outcome::Executed(result))
    }

    async fn resolve_options(
        &self,
        parts: &Parts,
        response_headers: &ResponseHeaders,
        context: &Arc<RequestContext>,
        params: Option<GraphQLParams>,
    ) -> Result<OptionsData<E>, HttpError> {
        let options = match &self.options {
            Options::Static(data) => data.clone(),
            Options::Factory(factory) => {
                let request = OptionsRequest {
                    request: Arc::new(request_head(parts)),
                    response_headers: response_headers.clone(),
                    context: Arc::clone(context),
                    params,
                };
                factory(request)
                    .await
                    .map_err(HttpError::from_box)?
                    .ok_or_else(|| HttpError::internal(INVALID_OPTIONS))?
            }
        };

        if options.format_error.is_some() {
            warn!("`format_error` is deprecated and replaced by `custom_format_error_fn`.");
        }

        Ok(options)
    }
}

fn request_head(parts: &Parts) -> Request<()> {
    let mut request = Request::new(());
    *request.method_mut() = parts.method.clone();
    *request.uri_mut() = parts.uri.clone();
    *request.version_mut() = parts.version;
    *request.headers_mut() = parts.headers.clone();
    *request.extensions_mut() = parts.extensions.clone();
    request
}
