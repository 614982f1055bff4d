//! Extraction of GraphQL request parameters from HTTP requests.
//!
//! Parameters come from the URL query string (GET) and from the body (POST):
//! - `application/json`: a JSON object
//! - `application/x-www-form-urlencoded`: form fields
//! - `application/graphql`: the body is the query
//!
//! Bodies may be gzip or deflate compressed and encoded in UTF-8 or UTF-16.

pub mod body;
pub mod params;

pub use body::{BodyConfig, PreparsedBody, DEFAULT_BODY_LIMIT};
pub use params::{get_graphql_params, url_pairs, GraphQLParams};
