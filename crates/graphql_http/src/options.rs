//! Handler configuration.
//!
//! Configuration is resolved once per request, either from a static
//! [`OptionsData`] or by calling a factory with the request.

use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Request};
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use graphql_http_core::{
    BoxError, Engine, ExecutionArgs, ExecutionResult, GraphQLError, RequestContext, Source,
};
use graphql_http_explorer::ExplorerOptions;
use graphql_http_params::GraphQLParams;

/// A boxed future that can be sent across threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Replaces [`Engine::parse`].
pub type ParseFn<E> =
    Arc<dyn Fn(&Source) -> Result<<E as Engine>::Document, GraphQLError> + Send + Sync>;

/// Replaces [`Engine::validate`].
pub type ValidateFn<E> = Arc<
    dyn Fn(&<E as Engine>::Schema, &<E as Engine>::Document, &[<E as Engine>::Rule]) -> Vec<GraphQLError>
        + Send
        + Sync,
>;

/// Replaces [`Engine::execute`].
pub type ExecuteFn<E> = Arc<
    dyn for<'a> Fn(ExecutionArgs<'a, E>) -> BoxFuture<'a, Result<ExecutionResult, GraphQLError>>
        + Send
        + Sync,
>;

/// Turns an error into its `errors[]` entry.
pub type FormatErrorFn = Arc<dyn Fn(&GraphQLError, &RequestContext) -> Value + Send + Sync>;

/// Computes the `extensions` entry of a response.
pub type ExtensionsFn<E> = Arc<
    dyn for<'a> Fn(RequestInfo<'a, E>) -> BoxFuture<'a, Result<Option<Map<String, Value>>, BoxError>>
        + Send
        + Sync,
>;

/// Produces the configuration of one request.
pub type OptionsFactory<E> = Arc<
    dyn Fn(OptionsRequest) -> BoxFuture<'static, Result<Option<OptionsData<E>>, BoxError>>
        + Send
        + Sync,
>;

/// What the extensions hook sees once an operation ran.
pub struct RequestInfo<'a, E: Engine> {
    pub document: &'a E::Document,
    pub variables: Option<&'a Value>,
    pub operation_name: Option<&'a str>,
    pub result: &'a ExecutionResult,
    pub context: &'a RequestContext,
}

/// Whether the GraphiQL explorer may be served, and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Explorer {
    Enabled(bool),
    Options(ExplorerOptions),
}

impl Explorer {
    /// Returns true unless explicitly disabled.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Enabled(false))
    }

    /// Returns the explorer options, if any were given.
    pub fn options(&self) -> Option<&ExplorerOptions> {
        match self {
            Self::Options(options) => Some(options),
            Self::Enabled(_) => None,
        }
    }
}

impl From<bool> for Explorer {
    fn from(enabled: bool) -> Self {
        Self::Enabled(enabled)
    }
}

impl From<ExplorerOptions> for Explorer {
    fn from(options: ExplorerOptions) -> Self {
        Self::Options(options)
    }
}

/// Headers an options factory wants on the response.
#[derive(Debug, Clone, Default)]
pub struct ResponseHeaders(Arc<Mutex<HeaderMap>>);

impl ResponseHeaders {
    /// Sets a header, replacing previous values.
    pub fn insert(&self, name: HeaderName, value: HeaderValue) {
        self.lock().insert(name, value);
    }

    /// Adds a header value, keeping previous values.
    pub fn append(&self, name: HeaderName, value: HeaderValue) {
        self.lock().append(name, value);
    }

    /// Returns a copy of the headers set so far.
    pub fn snapshot(&self) -> HeaderMap {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HeaderMap> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The input of an options factory.
#[derive(Debug, Clone)]
pub struct OptionsRequest {
    /// The request head; the body has already been consumed.
    pub request: Arc<Request<()>>,
    pub response_headers: ResponseHeaders,
    /// The default context built from the request.
    pub context: Arc<RequestContext>,
    /// The extracted parameters, absent when extraction failed.
    pub params: Option<GraphQLParams>,
}

/// The configuration of one request.
///
/// # Example
///
/// ```ignore
/// let options = OptionsData::new(schema)
///     .pretty(true)
///     .explorer(true)
///     .custom_format_error_fn(|error, _ctx| json!({ "message": error.message }));
/// ```
pub struct OptionsData<E: Engine> {
    /// Required; a configuration without schema is rejected with a 500.
    pub schema: Option<Arc<E::Schema>>,
    /// Defaults to the context built from the request.
    pub context: Option<Arc<RequestContext>>,
    pub root_value: Option<Arc<E::RootValue>>,
    /// Appended to [`Engine::specified_rules`].
    pub validation_rules: Vec<E::Rule>,
    pub field_resolver: Option<Arc<E::FieldResolver>>,
    pub type_resolver: Option<Arc<E::TypeResolver>>,
    pub pretty: Option<bool>,
    pub explorer: Option<Explorer>,
    pub custom_parse_fn: Option<ParseFn<E>>,
    pub custom_validate_fn: Option<ValidateFn<E>>,
    pub custom_execute_fn: Option<ExecuteFn<E>>,
    pub custom_format_error_fn: Option<FormatErrorFn>,
    /// Deprecated in favor of `custom_format_error_fn`.
    pub format_error: Option<FormatErrorFn>,
    pub extensions: Option<ExtensionsFn<E>>,
}

impl<E: Engine> Default for OptionsData<E> {
    fn default() -> Self {
        Self {
            schema: None,
            context: None,
            root_value: None,
            validation_rules: Vec::new(),
            field_resolver: None,
            type_resolver: None,
            pretty: None,
            explorer: None,
            custom_parse_fn: None,
            custom_validate_fn: None,
            custom_execute_fn: None,
            custom_format_error_fn: None,
            format_error: None,
            extensions: None,
        }
    }
}

impl<E: Engine> Clone for OptionsData<E> {
    fn clone(&self) -> Self {
        Self {
            schema: self.schema.clone(),
            context: self.context.clone(),
            root_value: self.root_value.clone(),
            validation_rules: self.validation_rules.clone(),
            field_resolver: self.field_resolver.clone(),
            type_resolver: self.type_resolver.clone(),
            pretty: self.pretty,
            explorer: self.explorer.clone(),
            custom_parse_fn: self.custom_parse_fn.clone(),
            custom_validate_fn: self.custom_validate_fn.clone(),
            custom_execute_fn: self.custom_execute_fn.clone(),
            custom_format_error_fn: self.custom_format_error_fn.clone(),
            format_error: self.format_error.clone(),
            extensions: self.extensions.clone(),
        }
    }
}

impl<E: Engine> OptionsData<E> {
    /// Creates a configuration serving the given schema.
    pub fn new(schema: impl Into<Arc<E::Schema>>) -> Self {
        Self {
            schema: Some(schema.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn schema(mut self, schema: impl Into<Arc<E::Schema>>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    #[must_use]
    pub fn context(mut self, context: impl Into<Arc<RequestContext>>) -> Self {
        self.context = Some(context.into());
        self
    }

    #[must_use]
    pub fn root_value(mut self, root_value: impl Into<Arc<E::RootValue>>) -> Self {
        self.root_value = Some(root_value.into());
        self
    }

    #[must_use]
    pub fn validation_rules(mut self, rules: impl IntoIterator<Item = E::Rule>) -> Self {
        self.validation_rules.extend(rules);
        self
    }

    #[must_use]
    pub fn field_resolver(mut self, resolver: impl Into<Arc<E::FieldResolver>>) -> Self {
        self.field_resolver = Some(resolver.into());
        self
    }

    #[must_use]
    pub fn type_resolver(mut self, resolver: impl Into<Arc<E::TypeResolver>>) -> Self {
        self.type_resolver = Some(resolver.into());
        self
    }

    #[must_use]
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = Some(pretty);
        self
    }

    #[must_use]
    pub fn explorer(mut self, explorer: impl Into<Explorer>) -> Self {
        self.explorer = Some(explorer.into());
        self
    }

    #[must_use]
    pub fn custom_parse_fn<F>(mut self, parse: F) -> Self
    where
        F: Fn(&Source) -> Result<E::Document, GraphQLError> + Send + Sync + 'static,
    {
        self.custom_parse_fn = Some(Arc::new(parse));
        self
    }

    #[must_use]
    pub fn custom_validate_fn<F>(mut self, validate: F) -> Self
    where
        F: Fn(&E::Schema, &E::Document, &[E::Rule]) -> Vec<GraphQLError> + Send + Sync + 'static,
    {
        self.custom_validate_fn = Some(Arc::new(validate));
        self
    }

    #[must_use]
    pub fn custom_execute_fn<F>(mut self, execute: F) -> Self
    where
        F: for<'a> Fn(ExecutionArgs<'a, E>) -> BoxFuture<'a, Result<ExecutionResult, GraphQLError>>
            + Send
            + Sync
            + 'static,
    {
        self.custom_execute_fn = Some(Arc::new(execute));
        self
    }

    #[must_use]
    pub fn custom_format_error_fn<F>(mut self, format: F) -> Self
    where
        F: Fn(&GraphQLError, &RequestContext) -> Value + Send + Sync + 'static,
    {
        self.custom_format_error_fn = Some(Arc::new(format));
        self
    }

    #[deprecated(note = "use `custom_format_error_fn`")]
    #[must_use]
    pub fn format_error<F>(mut self, format: F) -> Self
    where
        F: Fn(&GraphQLError, &RequestContext) -> Value + Send + Sync + 'static,
    {
        self.format_error = Some(Arc::new(format));
        self
    }

    /// Sets a synchronous extensions hook.
    #[must_use]
    pub fn extensions<F>(mut self, extensions: F) -> Self
    where
        F: for<'a> Fn(RequestInfo<'a, E>) -> Result<Option<Map<String, Value>>, BoxError>
            + Send
            + Sync
            + 'static,
    {
        self.extensions = Some(boxed_extensions(move |info| {
            let out = extensions(info);
            Box::pin(async move { out })
        }));
        self
    }

    /// Sets an asynchronous extensions hook.
    #[must_use]
    pub fn extensions_async<F>(mut self, extensions: F) -> Self
    where
        F: for<'a> Fn(
                RequestInfo<'a, E>,
            ) -> BoxFuture<'a, Result<Option<Map<String, Value>>, BoxError>>
            + Send
            + Sync
            + 'static,
    {
        self.extensions = Some(boxed_extensions(extensions));
        self
    }

    /// The formatter to apply: custom, then deprecated, then none (the
    /// default formatter).
    pub(crate) fn formatter(&self) -> Option<FormatErrorFn> {
        self.custom_format_error_fn
            .clone()
            .or_else(|| self.format_error.clone())
    }
}

/// How the configuration of a request is obtained.
pub enum Options<E: Engine> {
    /// The same configuration for every request.
    Static(OptionsData<E>),
    /// A configuration computed per request. Returning `Ok(None)` is a
    /// configuration error.
    Factory(OptionsFactory<E>),
}

impl<E: Engine> Clone for Options<E> {
    fn clone(&self) -> Self {
        match self {
            Self::Static(data) => Self::Static(data.clone()),
            Self::Factory(factory) => Self::Factory(Arc::clone(factory)),
        }
    }
}

impl<E: Engine> From<OptionsData<E>> for Options<E> {
    fn from(data: OptionsData<E>) -> Self {
        Self::Static(data)
    }
}

impl<E: Engine> Options<E> {
    /// A factory computing the configuration synchronously.
    pub fn from_fn<F>(factory: F) -> Self
    where
        F: Fn(OptionsRequest) -> Result<Option<OptionsData<E>>, BoxError> + Send + Sync + 'static,
    {
        Self::Factory(boxed_factory(move |request| {
            let out = factory(request);
            Box::pin(async move { out })
        }))
    }

    /// A factory computing the configuration asynchronously.
    pub fn from_async_fn<F, Fut>(factory: F) -> Self
    where
        F: Fn(OptionsRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<OptionsData<E>>, BoxError>> + Send + 'static,
    {
        Self::Factory(boxed_factory(move |request| Box::pin(factory(request))))
    }
}

fn boxed_factory<E, F>(factory: F) -> OptionsFactory<E>
where
    E: Engine,
    F: Fn(OptionsRequest) -> BoxFuture<'static, Result<Option<OptionsData<E>>, BoxError>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(factory)
}

fn boxed_extensions<E, F>(extensions: F) -> ExtensionsFn<E>
where
    E: Engine,
    F: for<'a> Fn(RequestInfo<'a, E>) -> BoxFuture<'a, Result<Option<Map<String, Value>>, BoxError>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(extensions)
}
