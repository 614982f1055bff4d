//! A small GraphQL engine and request helpers for driving the handler.
//!
//! The engine understands enough of the language for the handler's tests:
//! operations with variables, fields with aliases and arguments, fragments,
//! and non-null propagation. It reports errors in the same shape and wording
//! as the reference implementation.

#![allow(dead_code)]

use bytes::Bytes;
use graphql_http::{
    async_trait, Engine, ExecutionArgs, ExecutionResult, GraphQLError, GraphQLHttp, OperationKind,
    OptionsData, RequestContext, Source,
};
use http::{HeaderMap, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use serde_json::{Map, Number, Value};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Document {
    pub operations: Vec<Operation>,
    pub fragments: Vec<Fragment>,
}

#[derive(Debug)]
pub struct Operation {
    pub kind: OperationKind,
    pub name: Option<String>,
    pub variables: Vec<VariableDef>,
    pub selections: Vec<Selection>,
}

#[derive(Debug)]
pub struct Fragment {
    pub name: String,
    pub type_condition: String,
    pub selections: Vec<Selection>,
}

#[derive(Debug)]
pub struct VariableDef {
    pub name: String,
    pub ty: TypeRef,
    pub default: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    Named(String),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::List(inner) => write!(f, "[{inner}]"),
            Self::NonNull(inner) => write!(f, "{inner}!"),
        }
    }
}

#[derive(Debug)]
pub enum Selection {
    Field(Field),
    Spread(String),
    Inline(Vec<Selection>),
}

#[derive(Debug)]
pub struct Field {
    pub alias: Option<String>,
    pub name: String,
    pub arguments: Vec<(String, Input)>,
    pub selections: Vec<Selection>,
    pub location: graphql_http::Location,
}

impl Field {
    fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug)]
pub enum Input {
    Variable(String),
    Value(Value),
    List(Vec<Input>),
    Object(Vec<(String, Input)>),
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Punct(char),
    Spread,
    Name(String),
    Str(String),
    Int(String),
    Float(String),
    Eof,
}

impl Tok {
    fn describe(&self) -> String {
        match self {
            Self::Punct(c) => format!("\"{c}\""),
            Self::Spread => "\"...\"".to_string(),
            Self::Name(name) => format!("Name \"{name}\""),
            Self::Str(value) => format!("String \"{value}\""),
            Self::Int(value) => format!("Int \"{value}\""),
            Self::Float(value) => format!("Float \"{value}\""),
            Self::Eof => "<EOF>".to_string(),
        }
    }
}

fn syntax_error(source: &Source, offset: usize, message: &str) -> GraphQLError {
    GraphQLError::new(format!("Syntax Error: {message}")).with_location(source.location_at(offset))
}

fn lex(source: &Source) -> Result<Vec<(Tok, usize)>, GraphQLError> {
    let body = source.body();
    let bytes = body.as_bytes();
    let len = bytes.len();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < len {
        let c = bytes[i];
        match c {
            b' ' | b'\t' | b'\n' | b'\r' | b',' => i += 1,
            b'#' => {
                while i < len && bytes[i] != b'\n' && bytes[i] != b'\r' {
                    i += 1;
                }
            }
            b'{' | b'}' | b'(' | b')' | b':' | b'$' | b'!' | b'=' | b'@' | b'[' | b']' | b'|'
            | b'&' => {
                tokens.push((Tok::Punct(c as char), i));
                i += 1;
            }
            b'.' => {
                if body[i..].starts_with("...") {
                    tokens.push((Tok::Spread, i));
                    i += 3;
                } else {
                    return Err(syntax_error(source, i, "Unexpected character: \".\"."));
                }
            }
            b'_' | b'a'..=b'z' | b'A'..=b'Z' => {
                let start = i;
                while i < len && (bytes[i] == b'_' || bytes[i].is_ascii_alphanumeric()) {
                    i += 1;
                }
                tokens.push((Tok::Name(body[start..i].to_string()), start));
            }
            b'-' | b'0'..=b'9' => {
                let start = i;
                i += 1;
                while i < len && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                let mut float = false;
                if i < len && bytes[i] == b'.' {
                    float = true;
                    i += 1;
                    while i < len && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let text = body[start..i].to_string();
                tokens.push((if float { Tok::Float(text) } else { Tok::Int(text) }, start));
            }
            b'"' => {
                let start = i;
                i += 1;
                let mut value = String::new();
                loop {
                    if i >= len || bytes[i] == b'\n' || bytes[i] == b'\r' {
                        return Err(syntax_error(source, i, "Unterminated string."));
                    }
                    match bytes[i] {
                        b'"' => {
                            i += 1;
                            break;
                        }
                        b'\\' => {
                            i += 1;
                            let escaped = match bytes.get(i) {
                                Some(b'"') => '"',
                                Some(b'\\') => '\\',
                                Some(b'/') => '/',
                                Some(b'n') => '\n',
                                Some(b't') => '\t',
                                Some(b'r') => '\r',
                                Some(b'b') => '\u{8}',
                                Some(b'f') => '\u{c}',
                                Some(b'u') => {
                                    let code = body
                                        .get(i + 1..i + 5)
                                        .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                                        .and_then(char::from_u32);
                                    i += 4;
                                    match code {
                                        Some(ch) => ch,
                                        None => {
                                            return Err(syntax_error(
                                                source,
                                                i,
                                                "Invalid Unicode escape sequence.",
                                            ))
                                        }
                                    }
                                }
                                _ => {
                                    return Err(syntax_error(
                                        source,
                                        i,
                                        "Invalid character escape sequence.",
                                    ))
                                }
                            };
                            value.push(escaped);
                            i += 1;
                        }
                        _ => {
                            let ch = body[i..].chars().next().unwrap_or('\u{fffd}');
                            value.push(ch);
                            i += ch.len_utf8();
                        }
                    }
                }
                tokens.push((Tok::Str(value), start));
            }
            _ => {
                let ch = body[i..].chars().next().unwrap_or('\u{fffd}');
                if ch == '\u{feff}' {
                    i += ch.len_utf8();
                    continue;
                }
                return Err(syntax_error(
                    source,
                    i,
                    &format!("Cannot parse the unexpected character \"{ch}\"."),
                ));
            }
        }
    }

    tokens.push((Tok::Eof, len));
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser<'s> {
    source: &'s Source,
    tokens: Vec<(Tok, usize)>,
    pos: usize,
}

impl<'s> Parser<'s> {
    fn new(source: &'s Source) -> Result<Self, GraphQLError> {
        Ok(Self {
            source,
            tokens: lex(source)?,
            pos: 0,
        })
    }

    fn peek(&self) -> &Tok {
        &self.tokens[self.pos].0
    }

    fn offset(&self) -> usize {
        self.tokens[self.pos].1
    }

    fn advance(&mut self) -> Tok {
        let tok = self.tokens[self.pos].0.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn unexpected(&self) -> GraphQLError {
        syntax_error(
            self.source,
            self.offset(),
            &format!("Unexpected {}.", self.peek().describe()),
        )
    }

    fn expected(&self, what: &str) -> GraphQLError {
        syntax_error(
            self.source,
            self.offset(),
            &format!("Expected {what}, found {}.", self.peek().describe()),
        )
    }

    fn is_punct(&self, c: char) -> bool {
        self.peek() == &Tok::Punct(c)
    }

    fn skip_punct(&mut self, c: char) -> bool {
        if self.is_punct(c) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, c: char) -> Result<(), GraphQLError> {
        if self.skip_punct(c) {
            Ok(())
        } else {
            Err(self.expected(&format!("\"{c}\"")))
        }
    }

    fn expect_name(&mut self) -> Result<String, GraphQLError> {
        match self.peek() {
            Tok::Name(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.expected("Name")),
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), GraphQLError> {
        match self.peek() {
            Tok::Name(name) if name == keyword => {
                self.advance();
                Ok(())
            }
            _ => Err(self.expected(&format!("\"{keyword}\""))),
        }
    }

    fn document(&mut self) -> Result<Document, GraphQLError> {
        let mut document = Document::default();
        loop {
            match self.peek().clone() {
                Tok::Eof if !document.operations.is_empty() || !document.fragments.is_empty() => {
                    break
                }
                Tok::Punct('{') => {
                    let selections = self.selection_set()?;
                    document.operations.push(Operation {
                        kind: OperationKind::Query,
                        name: None,
                        variables: Vec::new(),
                        selections,
                    });
                }
                Tok::Name(name) if matches!(name.as_str(), "query" | "mutation" | "subscription") => {
                    document.operations.push(self.operation()?);
                }
                Tok::Name(name) if name == "fragment" => {
                    document.fragments.push(self.fragment()?);
                }
                _ => return Err(self.unexpected()),
            }
        }
        Ok(document)
    }

    fn operation(&mut self) -> Result<Operation, GraphQLError> {
        let kind = match self.expect_name()?.as_str() {
            "query" => OperationKind::Query,
            "mutation" => OperationKind::Mutation,
            _ => OperationKind::Subscription,
        };
        let name = match self.peek() {
            Tok::Name(_) => Some(self.expect_name()?),
            _ => None,
        };
        let mut variables = Vec::new();
        if self.skip_punct('(') {
            while !self.skip_punct(')') {
                variables.push(self.variable_def()?);
            }
        }
        self.directives()?;
        let selections = self.selection_set()?;
        Ok(Operation {
            kind,
            name,
            variables,
            selections,
        })
    }

    fn fragment(&mut self) -> Result<Fragment, GraphQLError> {
        self.expect_keyword("fragment")?;
        let name = self.expect_name()?;
        self.expect_keyword("on")?;
        let type_condition = self.expect_name()?;
        self.directives()?;
        let selections = self.selection_set()?;
        Ok(Fragment {
            name,
            type_condition,
            selections,
        })
    }

    fn variable_def(&mut self) -> Result<VariableDef, GraphQLError> {
        self.expect_punct('$')?;
        let name = self.expect_name()?;
        self.expect_punct(':')?;
        let ty = self.type_ref()?;
        let default = if self.skip_punct('=') {
            Some(constant(self.value()?))
        } else {
            None
        };
        self.directives()?;
        Ok(VariableDef { name, ty, default })
    }

    fn type_ref(&mut self) -> Result<TypeRef, GraphQLError> {
        let ty = if self.skip_punct('[') {
            let inner = self.type_ref()?;
            self.expect_punct(']')?;
            TypeRef::List(Box::new(inner))
        } else {
            TypeRef::Named(self.expect_name()?)
        };
        if self.skip_punct('!') {
            Ok(TypeRef::NonNull(Box::new(ty)))
        } else {
            Ok(ty)
        }
    }

    fn value(&mut self) -> Result<Input, GraphQLError> {
        match self.peek().clone() {
            Tok::Punct('$') => {
                self.advance();
                Ok(Input::Variable(self.expect_name()?))
            }
            Tok::Int(text) => {
                self.advance();
                Ok(Input::Value(text.parse::<i64>().map_or(Value::Null, Value::from)))
            }
            Tok::Float(text) => {
                self.advance();
                let number = text.parse::<f64>().ok().and_then(Number::from_f64);
                Ok(Input::Value(number.map_or(Value::Null, Value::Number)))
            }
            Tok::Str(value) => {
                self.advance();
                Ok(Input::Value(Value::String(value)))
            }
            Tok::Name(name) => {
                self.advance();
                Ok(Input::Value(match name.as_str() {
                    "true" => Value::Bool(true),
                    "false" => Value::Bool(false),
                    "null" => Value::Null,
                    _ => Value::String(name),
                }))
            }
            Tok::Punct('[') => {
                self.advance();
                let mut items = Vec::new();
                while !self.skip_punct(']') {
                    items.push(self.value()?);
                }
                Ok(Input::List(items))
            }
            Tok::Punct('{') => {
                self.advance();
                let mut fields = Vec::new();
                while !self.skip_punct('}') {
                    let name = self.expect_name()?;
                    self.expect_punct(':')?;
                    fields.push((name, self.value()?));
                }
                Ok(Input::Object(fields))
            }
            _ => Err(self.unexpected()),
        }
    }

    fn arguments(&mut self) -> Result<Vec<(String, Input)>, GraphQLError> {
        let mut arguments = Vec::new();
        if self.skip_punct('(') {
            while !self.skip_punct(')') {
                let name = self.expect_name()?;
                self.expect_punct(':')?;
                arguments.push((name, self.value()?));
            }
        }
        Ok(arguments)
    }

    fn directives(&mut self) -> Result<(), GraphQLError> {
        while self.skip_punct('@') {
            self.expect_name()?;
            self.arguments()?;
        }
        Ok(())
    }

    fn selection_set(&mut self) -> Result<Vec<Selection>, GraphQLError> {
        self.expect_punct('{')?;
        let mut selections = Vec::new();
        loop {
            selections.push(self.selection()?);
            if self.skip_punct('}') {
                break;
            }
        }
        Ok(selections)
    }

    fn selection(&mut self) -> Result<Selection, GraphQLError> {
        if self.peek() == &Tok::Spread {
            self.advance();
            if let Tok::Name(name) = self.peek().clone() {
                if name != "on" {
                    self.advance();
                    self.directives()?;
                    return Ok(Selection::Spread(name));
                }
                self.advance();
                self.expect_name()?;
            }
            self.directives()?;
            return Ok(Selection::Inline(self.selection_set()?));
        }

        let offset = self.offset();
        let first = self.expect_name()?;
        let (alias, name) = if self.skip_punct(':') {
            (Some(first), self.expect_name()?)
        } else {
            (None, first)
        };
        let arguments = self.arguments()?;
        self.directives()?;
        let selections = if self.is_punct('{') {
            self.selection_set()?
        } else {
            Vec::new()
        };

        Ok(Selection::Field(Field {
            alias,
            name,
            arguments,
            selections,
            location: self.source.location_at(offset),
        }))
    }
}

fn constant(input: Input) -> Value {
    match input {
        Input::Variable(_) => Value::Null,
        Input::Value(value) => value,
        Input::List(items) => Value::Array(items.into_iter().map(constant).collect()),
        Input::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(name, value)| (name, constant(value)))
                .collect(),
        ),
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldType {
    String,
    NonNullString,
    Object(&'static str),
}

impl FieldType {
    fn is_non_null(self) -> bool {
        matches!(self, Self::NonNullString)
    }
}

/// What a resolver sees.
pub struct Resolve<'a> {
    pub parent: &'a Value,
    pub args: &'a Map<String, Value>,
    pub context: &'a RequestContext,
}

pub type Resolver = Arc<dyn Fn(&Resolve<'_>) -> Result<Value, String> + Send + Sync>;

pub struct FieldDef {
    pub name: &'static str,
    pub ty: FieldType,
    pub resolve: Option<Resolver>,
}

impl FieldDef {
    pub fn new(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            resolve: None,
        }
    }

    pub fn resolve<F>(mut self, resolve: F) -> Self
    where
        F: Fn(&Resolve<'_>) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.resolve = Some(Arc::new(resolve));
        self
    }
}

pub struct ObjectType {
    pub name: &'static str,
    pub fields: Vec<FieldDef>,
}

impl ObjectType {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    fn get(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.name == name)
    }
}

pub struct TestSchema {
    pub query: &'static str,
    pub mutation: Option<&'static str>,
    pub types: Vec<ObjectType>,
}

impl TestSchema {
    pub fn new(query: ObjectType) -> Self {
        Self {
            query: query.name,
            mutation: None,
            types: vec![query],
        }
    }

    pub fn mutation(mut self, mutation: ObjectType) -> Self {
        self.mutation = Some(mutation.name);
        self.types.push(mutation);
        self
    }

    pub fn object(&self, name: &str) -> Option<&ObjectType> {
        self.types.iter().find(|ty| ty.name == name)
    }

    fn root(&self, kind: OperationKind) -> Result<&ObjectType, String> {
        let name = match kind {
            OperationKind::Query => Some(self.query),
            OperationKind::Mutation => self.mutation,
            OperationKind::Subscription => None,
        };
        name.and_then(|name| self.object(name)).ok_or_else(|| match kind {
            OperationKind::Query => "Schema does not define the required query root type.".to_string(),
            OperationKind::Mutation => "Schema is not configured for mutations.".to_string(),
            OperationKind::Subscription => "Schema is not configured for subscriptions.".to_string(),
        })
    }
}

/// A context value read by the `contextDotFoo` field.
#[derive(Debug, Clone)]
pub struct Foo(pub String);

/// The schema most tests run against.
pub fn test_schema() -> TestSchema {
    let query = ObjectType::new("QueryRoot")
        .field(FieldDef::new("test", FieldType::String).resolve(|r| {
            let who = r.args.get("who").and_then(Value::as_str).unwrap_or("World");
            Ok(Value::String(format!("Hello {who}")))
        }))
        .field(FieldDef::new("nonNullThrower", FieldType::NonNullString).resolve(|_| Err("Throws!".into())))
        .field(FieldDef::new("thrower", FieldType::String).resolve(|_| Err("Throws!".into())))
        .field(FieldDef::new("context", FieldType::String).resolve(|r| {
            Ok(r.context.get::<String>().map_or(Value::Null, |s| Value::String(s.clone())))
        }))
        .field(FieldDef::new("contextDotFoo", FieldType::String).resolve(|r| {
            Ok(r.context.get::<Foo>().map_or(Value::Null, |foo| Value::String(foo.0.clone())))
        }))
        .field(FieldDef::new("rootField", FieldType::String));

    let mutation = ObjectType::new("MutationRoot").field(
        FieldDef::new("writeTest", FieldType::Object("QueryRoot")).resolve(|r| {
            Ok(if r.parent.is_null() {
                Value::Object(Map::new())
            } else {
                r.parent.clone()
            })
        }),
    );

    TestSchema::new(query).mutation(mutation)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

pub type CustomRule = Arc<dyn Fn(&TestSchema, &Document) -> Vec<GraphQLError> + Send + Sync>;

#[derive(Clone)]
pub enum TestRule {
    KnownFields,
    KnownFragments,
    Custom(CustomRule),
}

impl TestRule {
    pub fn custom<F>(rule: F) -> Self
    where
        F: Fn(&TestSchema, &Document) -> Vec<GraphQLError> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(rule))
    }

    /// Reports one error for every document.
    pub fn always_invalid() -> Self {
        Self::custom(|_, _| vec![GraphQLError::new("AlwaysInvalidRule was really invalid!")])
    }

    fn check(&self, schema: &TestSchema, document: &Document) -> Vec<GraphQLError> {
        match self {
            Self::KnownFields => known_fields(schema, document),
            Self::KnownFragments => known_fragments(document),
            Self::Custom(rule) => rule(schema, document),
        }
    }
}

fn known_fields(schema: &TestSchema, document: &Document) -> Vec<GraphQLError> {
    let mut errors = Vec::new();
    for operation in &document.operations {
        match schema.root(operation.kind) {
            Ok(root) => check_selections(
                schema,
                document,
                root,
                &operation.selections,
                &mut HashSet::new(),
                &mut errors,
            ),
            Err(message) => errors.push(GraphQLError::new(message)),
        }
    }
    errors
}

fn check_selections<'d>(
    schema: &TestSchema,
    document: &'d Document,
    ty: &ObjectType,
    selections: &'d [Selection],
    visited: &mut HashSet<&'d str>,
    errors: &mut Vec<GraphQLError>,
) {
    for selection in selections {
        match selection {
            Selection::Field(field) => {
                let Some(def) = ty.get(&field.name) else {
                    errors.push(
                        GraphQLError::new(format!(
                            "Cannot query field \"{}\" on type \"{}\".",
                            field.name, ty.name
                        ))
                        .with_location(field.location),
                    );
                    continue;
                };
                match def.ty {
                    FieldType::Object(name) => {
                        if field.selections.is_empty() {
                            errors.push(
                                GraphQLError::new(format!(
                                    "Field \"{}\" of type \"{name}\" must have a selection of subfields. Did you mean \"{} {{ ... }}\"?",
                                    field.name, field.name
                                ))
                                .with_location(field.location),
                            );
                        } else if let Some(object) = schema.object(name) {
                            check_selections(schema, document, object, &field.selections, visited, errors);
                        }
                    }
                    FieldType::String | FieldType::NonNullString => {
                        if !field.selections.is_empty() {
                            errors.push(
                                GraphQLError::new(format!(
                                    "Field \"{}\" must not have a selection since type \"String\" has no subfields.",
                                    field.name
                                ))
                                .with_location(field.location),
                            );
                        }
                    }
                }
            }
            Selection::Spread(name) => {
                if let Some(fragment) = document.fragments.iter().find(|f| &f.name == name) {
                    if visited.insert(fragment.name.as_str()) {
                        let target = schema.object(&fragment.type_condition).unwrap_or(ty);
                        check_selections(schema, document, target, &fragment.selections, visited, errors);
                    }
                }
            }
            Selection::Inline(inner) => {
                check_selections(schema, document, ty, inner, visited, errors);
            }
        }
    }
}

fn known_fragments(document: &Document) -> Vec<GraphQLError> {
    fn walk(document: &Document, selections: &[Selection], errors: &mut Vec<GraphQLError>) {
        for selection in selections {
            match selection {
                Selection::Field(field) => walk(document, &field.selections, errors),
                Selection::Spread(name) => {
                    if !document.fragments.iter().any(|f| &f.name == name) {
                        errors.push(GraphQLError::new(format!("Unknown fragment \"{name}\".")));
                    }
                }
                Selection::Inline(inner) => walk(document, inner, errors),
            }
        }
    }

    let mut errors = Vec::new();
    for operation in &document.operations {
        walk(document, &operation.selections, &mut errors);
    }
    for fragment in &document.fragments {
        walk(document, &fragment.selections, &mut errors);
    }
    errors
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Replaces the default "read the parent's property" resolution of fields
/// without their own resolver.
pub struct TestFieldResolver(pub Box<dyn Fn(&str, &Value) -> Value + Send + Sync>);

impl TestFieldResolver {
    pub fn new<F>(resolve: F) -> Self
    where
        F: Fn(&str, &Value) -> Value + Send + Sync + 'static,
    {
        Self(Box::new(resolve))
    }
}

fn select_operation<'d>(
    document: &'d Document,
    operation_name: Option<&str>,
) -> Result<&'d Operation, String> {
    match operation_name {
        Some(name) => document
            .operations
            .iter()
            .find(|op| op.name.as_deref() == Some(name))
            .ok_or_else(|| format!("Unknown operation named \"{name}\".")),
        None => match document.operations.as_slice() {
            [operation] => Ok(operation),
            [] => Err("Must provide an operation.".to_string()),
            _ => Err("Must provide operation name if query contains multiple operations.".to_string()),
        },
    }
}

fn coerce_variables(
    operation: &Operation,
    provided: Option<&Value>,
) -> Result<Map<String, Value>, Vec<GraphQLError>> {
    let empty = Map::new();
    let provided = provided.and_then(Value::as_object).unwrap_or(&empty);
    let mut coerced = Map::new();
    let mut errors = Vec::new();

    for def in &operation.variables {
        let value = provided.get(&def.name).cloned().or_else(|| def.default.clone());
        let non_null = matches!(def.ty, TypeRef::NonNull(_));
        match value {
            None if non_null => errors.push(GraphQLError::new(format!(
                "Variable \"${}\" of required type \"{}\" was not provided.",
                def.name, def.ty
            ))),
            None => {}
            Some(Value::Null) if non_null => errors.push(GraphQLError::new(format!(
                "Variable \"${}\" of non-null type \"{}\" must not be null.",
                def.name, def.ty
            ))),
            Some(value) => {
                let named = match &def.ty {
                    TypeRef::NonNull(inner) => inner.as_ref(),
                    other => other,
                };
                if named == &TypeRef::Named("String".into()) && !(value.is_string() || value.is_null()) {
                    errors.push(GraphQLError::new(format!(
                        "Variable \"${}\" got invalid value {value}; String cannot represent a non string value: {value}",
                        def.name
                    )));
                } else {
                    coerced.insert(def.name.clone(), value);
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(coerced)
    } else {
        Err(errors)
    }
}

struct Executor<'a> {
    schema: &'a TestSchema,
    document: &'a Document,
    context: &'a RequestContext,
    variables: Map<String, Value>,
    field_resolver: Option<&'a TestFieldResolver>,
    errors: Vec<GraphQLError>,
}

/// Marks a null that must propagate to the parent field.
struct NullBubble;

impl<'a> Executor<'a> {
    fn collect<'s>(&self, selections: &'s [Selection], out: &mut Vec<&'s Field>, visited: &mut HashSet<String>)
    where
        'a: 's,
    {
        for selection in selections {
            match selection {
                Selection::Field(field) => out.push(field),
                Selection::Spread(name) => {
                    if !visited.insert(name.clone()) {
                        continue;
                    }
                    if let Some(fragment) = self.document.fragments.iter().find(|f| &f.name == name) {
                        self.collect(&fragment.selections, out, visited);
                    }
                }
                Selection::Inline(inner) => self.collect(inner, out, visited),
            }
        }
    }

    fn object(
        &mut self,
        ty: &ObjectType,
        selections: &[Selection],
        parent: &Value,
        path: &mut Vec<String>,
    ) -> Result<Map<String, Value>, NullBubble> {
        let mut fields = Vec::new();
        self.collect(selections, &mut fields, &mut HashSet::new());

        let mut map = Map::new();
        for field in fields {
            let Some(def) = ty.get(&field.name) else {
                continue;
            };
            let key = field.response_key().to_string();
            path.push(key.clone());
            let value = self.field(ty, def, field, parent, path);
            path.pop();
            map.insert(key, value?);
        }
        Ok(map)
    }

    fn field(
        &mut self,
        parent_type: &ObjectType,
        def: &FieldDef,
        field: &Field,
        parent: &Value,
        path: &mut Vec<String>,
    ) -> Result<Value, NullBubble> {
        let args = self.arguments(field);
        let resolved = match &def.resolve {
            Some(resolve) => resolve(&Resolve {
                parent,
                args: &args,
                context: self.context,
            }),
            None => Ok(match self.field_resolver {
                Some(resolver) => (resolver.0)(&field.name, parent),
                None => parent.get(&field.name).cloned().unwrap_or(Value::Null),
            }),
        };

        let value = match resolved {
            Ok(value) => value,
            Err(message) => {
                self.errors.push(
                    GraphQLError::new(message)
                        .with_location(field.location)
                        .with_path(path.clone()),
                );
                return if def.ty.is_non_null() {
                    Err(NullBubble)
                } else {
                    Ok(Value::Null)
                };
            }
        };

        if value.is_null() {
            if def.ty.is_non_null() {
                self.errors.push(
                    GraphQLError::new(format!(
                        "Cannot return null for non-nullable field {}.{}.",
                        parent_type.name, def.name
                    ))
                    .with_location(field.location)
                    .with_path(path.clone()),
                );
                return Err(NullBubble);
            }
            return Ok(Value::Null);
        }

        match def.ty {
            FieldType::Object(name) => {
                let schema = self.schema;
                let Some(object) = schema.object(name) else {
                    return Ok(Value::Null);
                };
                Ok(self
                    .object(object, &field.selections, &value, path)
                    .map_or(Value::Null, Value::Object))
            }
            FieldType::String | FieldType::NonNullString => Ok(value),
        }
    }

    fn arguments(&self, field: &Field) -> Map<String, Value> {
        field
            .arguments
            .iter()
            .filter_map(|(name, input)| Some((name.clone(), self.input(input)?)))
            .collect()
    }

    fn input(&self, input: &Input) -> Option<Value> {
        match input {
            Input::Variable(name) => self.variables.get(name).cloned(),
            Input::Value(value) => Some(value.clone()),
            Input::List(items) => Some(Value::Array(
                items
                    .iter()
                    .map(|item| self.input(item).unwrap_or(Value::Null))
                    .collect(),
            )),
            Input::Object(fields) => Some(Value::Object(
                fields
                    .iter()
                    .filter_map(|(name, value)| Some((name.clone(), self.input(value)?)))
                    .collect(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct TestEngine;

#[async_trait]
impl Engine for TestEngine {
    type Schema = TestSchema;
    type Document = Document;
    type Rule = TestRule;
    type RootValue = Value;
    type FieldResolver = TestFieldResolver;
    type TypeResolver = ();

    fn validate_schema(&self, schema: &TestSchema) -> Vec<GraphQLError> {
        let mut errors = Vec::new();
        if schema.object(schema.query).is_none() {
            errors.push(GraphQLError::new("Query root type must be provided."));
        }
        for ty in &schema.types {
            if ty.fields.is_empty() {
                errors.push(GraphQLError::new(format!(
                    "Type {} must define one or more fields.",
                    ty.name
                )));
            }
        }
        errors
    }

    fn parse(&self, source: &Source) -> Result<Document, GraphQLError> {
        Parser::new(source)?.document()
    }

    fn specified_rules(&self) -> Vec<TestRule> {
        vec![TestRule::KnownFields, TestRule::KnownFragments]
    }

    fn validate(&self, schema: &TestSchema, document: &Document, rules: &[TestRule]) -> Vec<GraphQLError> {
        rules
            .iter()
            .flat_map(|rule| rule.check(schema, document))
            .collect()
    }

    fn operation_kind(&self, document: &Document, operation_name: Option<&str>) -> Option<OperationKind> {
        select_operation(document, operation_name).ok().map(|op| op.kind)
    }

    async fn execute(&self, args: ExecutionArgs<'_, Self>) -> Result<ExecutionResult, GraphQLError> {
        if args.variables.is_some_and(|variables| !variables.is_object()) {
            return Err(GraphQLError::new(
                "Variables must be provided as an Object where each property is a variable value. Perhaps look to see if an unparsed JSON string was provided.",
            ));
        }

        let operation = match select_operation(args.document, args.operation_name) {
            Ok(operation) => operation,
            Err(message) => return Ok(ExecutionResult::from_errors(vec![GraphQLError::new(message)])),
        };
        let variables = match coerce_variables(operation, args.variables) {
            Ok(variables) => variables,
            Err(errors) => return Ok(ExecutionResult::from_errors(errors)),
        };
        let root = match args.schema.root(operation.kind) {
            Ok(root) => root,
            Err(message) => return Ok(ExecutionResult::from_errors(vec![GraphQLError::new(message)])),
        };

        let mut executor = Executor {
            schema: args.schema,
            document: args.document,
            context: args.context,
            variables,
            field_resolver: args.field_resolver,
            errors: Vec::new(),
        };
        let parent = args.root_value.cloned().unwrap_or(Value::Null);
        let data = executor
            .object(root, &operation.selections, &parent, &mut Vec::new())
            .map_or(Value::Null, Value::Object);

        Ok(ExecutionResult {
            data: Some(data),
            errors: executor.errors,
            extensions: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Installs a log subscriber honoring `RUST_LOG`, once per test binary.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "graphql_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

/// A handler serving the test schema with the given options.
pub fn handler(options: impl Into<graphql_http::Options<TestEngine>>) -> GraphQLHttp<TestEngine> {
    init_tracing();
    GraphQLHttp::new(TestEngine, options)
}

/// Options serving [`test_schema`].
pub fn options() -> OptionsData<TestEngine> {
    OptionsData::new(test_schema())
}

/// Builds `/graphql` with the given query-string parameters.
pub fn url_string(params: &[(&str, &str)]) -> String {
    if params.is_empty() {
        return "/graphql".to_string();
    }
    format!("/graphql?{}", serde_urlencoded::to_string(params).unwrap())
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub text: String,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.text).unwrap()
    }

    pub fn content_type(&self) -> &str {
        self.headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Sends a request through the handler and collects the response.
pub async fn send<B: Into<Bytes>>(handler: &GraphQLHttp<TestEngine>, request: Request<B>) -> TestResponse {
    let (parts, body) = request.into_parts();
    let request = Request::from_parts(parts, Full::new(body.into()));
    let response = handler.handle(request).await;
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    TestResponse {
        status,
        headers,
        text: String::from_utf8(bytes.to_vec()).unwrap(),
    }
}

/// A GET request with an empty body.
pub fn get(uri: &str) -> Request<Bytes> {
    Request::get(uri).body(Bytes::new()).unwrap()
}

/// A GET request accepting HTML.
pub fn get_html(uri: &str) -> Request<Bytes> {
    Request::get(uri)
        .header("accept", "text/html")
        .body(Bytes::new())
        .unwrap()
}

/// A POST request with a JSON body.
pub fn post_json(uri: &str, body: &Value) -> Request<Bytes> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Bytes::from(body.to_string()))
        .unwrap()
}

/// A POST request with a body of the given content type.
pub fn post(uri: &str, content_type: &str, body: impl Into<Bytes>) -> Request<Bytes> {
    Request::post(uri)
        .header("content-type", content_type)
        .body(body.into())
        .unwrap()
}
