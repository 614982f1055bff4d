//! Response construction helpers.

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, Response, StatusCode};
use http_body_util::{BodyExt, Full};

/// The body type of every response the handler produces.
pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Wraps bytes in a [`BoxBody`].
pub fn full<T: Into<Bytes>>(chunk: T) -> BoxBody {
    Full::new(chunk.into())
        .map_err(|never| match never {})
        .boxed()
}

fn response(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> Response<BoxBody> {
    let mut response = Response::new(full(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// An `application/json` response.
pub fn json_response(status: StatusCode, body: impl Into<Bytes>) -> Response<BoxBody> {
    response(status, "application/json", body)
}

/// A `text/html` response.
pub fn html_response(status: StatusCode, body: impl Into<Bytes>) -> Response<BoxBody> {
    response(status, "text/html; charset=utf-8", body)
}

/// 404 for paths the server does not route to the handler.
pub fn not_found() -> Response<BoxBody> {
    json_response(StatusCode::NOT_FOUND, r#"{"error":"Not Found"}"#)
}

/// Copies headers onto a response, replacing existing values of the same
/// name.
pub fn extend_headers(response: &mut Response<BoxBody>, headers: HeaderMap) {
    let mut last_name = None;
    for (name, value) in headers {
        match name {
            Some(name) => {
                response.headers_mut().insert(name.clone(), value);
                last_name = Some(name);
            }
            None => {
                if let Some(name) = &last_name {
                    response.headers_mut().append(name.clone(), value);
                }
            }
        }
    }
}
