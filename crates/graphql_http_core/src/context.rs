//! Request-scoped context handed to the engine and to error formatters.
//!
//! Uses `TypeId` keys for type safety instead of string keys. Values placed in
//! the incoming request's `http::Extensions` by upstream middleware (a session,
//! an authenticated user) are visible through the same lookup.

use http::request::Parts;
use http::{Extensions, HeaderMap, Method, Uri};
use rustc_hash::FxHashMap;
use std::any::{Any, TypeId};
use std::fmt;

/// Type-keyed storage for one request.
///
/// # Example
///
/// ```
/// use graphql_http_core::RequestContext;
///
/// #[derive(Clone)]
/// struct UserId(String);
///
/// let ctx = RequestContext::new().with(UserId("123".into()));
/// assert_eq!(ctx.get::<UserId>().unwrap().0, "123");
/// assert!(ctx.get::<String>().is_none());
/// ```
pub struct RequestContext {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    extensions: Extensions,
    data: FxHashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    /// Creates an empty context, not tied to any request.
    pub fn new() -> Self {
        Self {
            method: Method::GET,
            uri: Uri::from_static("/"),
            headers: HeaderMap::new(),
            extensions: Extensions::new(),
            data: FxHashMap::default(),
        }
    }

    /// Creates the default context of a request: its method, URI, headers
    /// and extensions.
    pub fn from_parts(parts: &Parts) -> Self {
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            extensions: parts.extensions.clone(),
            data: FxHashMap::default(),
        }
    }

    /// Inserts a value, replacing and returning any previous value of the
    /// same type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.data
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|boxed| boxed.downcast().ok().map(|b| *b))
    }

    /// Adds a value and returns self.
    #[must_use]
    pub fn with<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.insert(value);
        self
    }

    /// Gets a value by type, falling back to the request extensions.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.data
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref())
            .or_else(|| self.extensions.get::<T>())
    }

    /// Gets a mutable reference to a value inserted into this context.
    pub fn get_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.data
            .get_mut(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_mut())
    }

    /// Removes a value inserted into this context.
    pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.data
            .remove(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast().ok().map(|b| *b))
    }

    /// Returns true if a value of the given type is reachable via [`get`](Self::get).
    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.get::<T>().is_some()
    }

    /// The request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request URI.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// The request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Gets a header value as a string.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).and_then(|v| v.to_str().ok())
    }

    /// The request extensions.
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("data_count", &self.data.len())
            .field("headers", &self.headers)
            .finish()
    }
}
