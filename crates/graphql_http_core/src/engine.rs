//! The seam between the HTTP adapter and a GraphQL implementation.
//!
//! The adapter never parses, validates or executes GraphQL itself. It drives
//! an [`Engine`] through the same four steps for every request: validate the
//! schema, parse the query, validate the document, execute it.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

use crate::context::RequestContext;
use crate::error::GraphQLError;
use crate::result::ExecutionResult;
use crate::source::Source;

/// Root operation kind of an operation definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl OperationKind {
    /// Returns the keyword used in GraphQL documents.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
        }
    }

    /// Returns true for read-only operations.
    pub const fn is_query(self) -> bool {
        matches!(self, Self::Query)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A GraphQL implementation the adapter can serve.
///
/// Every method except [`execute`](Engine::execute) is synchronous; resolvers
/// are free to await inside execution.
#[async_trait]
pub trait Engine: Send + Sync + 'static {
    /// A built schema.
    type Schema: Send + Sync + 'static;
    /// A parsed document.
    type Document: Send + Sync;
    /// A validation rule.
    type Rule: Clone + Send + Sync + 'static;
    /// The root value passed to top-level resolvers.
    type RootValue: Send + Sync + 'static;
    /// Overrides the default field resolver.
    type FieldResolver: Send + Sync + 'static;
    /// Overrides the default abstract type resolver.
    type TypeResolver: Send + Sync + 'static;

    /// Checks the schema itself. An empty list means the schema is valid.
    fn validate_schema(&self, schema: &Self::Schema) -> Vec<GraphQLError>;

    /// Parses query text into a document.
    fn parse(&self, source: &Source) -> Result<Self::Document, GraphQLError>;

    /// The rules every document is validated against.
    fn specified_rules(&self) -> Vec<Self::Rule>;

    /// Validates a document, returning every violation found.
    fn validate(
        &self,
        schema: &Self::Schema,
        document: &Self::Document,
        rules: &[Self::Rule],
    ) -> Vec<GraphQLError>;

    /// Returns the kind of the operation that would run, or `None` when the
    /// operation cannot be determined (unknown name, or several operations
    /// and no name).
    fn operation_kind(
        &self,
        document: &Self::Document,
        operation_name: Option<&str>,
    ) -> Option<OperationKind>;

    /// Executes a document.
    ///
    /// `Err` means execution could not start (e.g. invalid variables). Field
    /// errors are reported in [`ExecutionResult::errors`].
    async fn execute(&self, args: ExecutionArgs<'_, Self>) -> Result<ExecutionResult, GraphQLError>;
}

/// Everything needed to execute one operation.
pub struct ExecutionArgs<'a, E: Engine + ?Sized> {
    pub schema: &'a E::Schema,
    pub document: &'a E::Document,
    pub root_value: Option<&'a E::RootValue>,
    pub context: &'a RequestContext,
    pub variables: Option<&'a Value>,
    pub operation_name: Option<&'a str>,
    pub field_resolver: Option<&'a E::FieldResolver>,
    pub type_resolver: Option<&'a E::TypeResolver>,
}

impl<E: Engine + ?Sized> Clone for ExecutionArgs<'_, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E: Engine + ?Sized> Copy for ExecutionArgs<'_, E> {}

impl<E: Engine + ?Sized> fmt::Debug for ExecutionArgs<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionArgs")
            .field("variables", &self.variables)
            .field("operation_name", &self.operation_name)
            .field("has_root_value", &self.root_value.is_some())
            .finish_non_exhaustive()
    }
}
