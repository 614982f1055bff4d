//! Reading and decoding request bodies.
//!
//! A body is collected up to a size limit, inflated according to
//! `Content-Encoding`, decoded according to the `charset` content-type
//! parameter, and finally interpreted according to its content type.

use bytes::Bytes;
use encoding_rs::Encoding;
use flate2::read::{GzDecoder, ZlibDecoder};
use http::header::{HeaderValue, CONTENT_ENCODING, CONTENT_TYPE};
use http::request::Parts;
use http_body::Body;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use mediatype::{MediaType, Name, ReadParams};
use serde_json::{Map, Value};
use std::io::Read;

use graphql_http_core::{BoxError, HttpError, HttpResult};

/// Default maximum body size: 100 KiB.
pub const DEFAULT_BODY_LIMIT: usize = 100 * 1024;

/// A body already consumed by upstream middleware.
///
/// Insert it into the request extensions before handing the request over;
/// the raw body is then ignored.
#[derive(Debug, Clone, PartialEq)]
pub enum PreparsedBody {
    /// A decoded JSON object (or form fields).
    Json(Map<String, Value>),
    /// Body text, used as the query when the content type is
    /// `application/graphql`.
    Text(String),
    /// Bytes nobody could interpret.
    Bytes(Bytes),
}

/// Limits applied while reading a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyConfig {
    /// Maximum body size in bytes, after decompression.
    pub limit: usize,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl BodyConfig {
    /// Creates a config with the default limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum body size.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// The parts of a `Content-Type` header the parser cares about.
#[derive(Debug, Default)]
struct BodyType {
    essence: String,
    charset: Option<String>,
}

impl BodyType {
    fn from_header(value: &HeaderValue) -> Self {
        let Some(mime) = value.to_str().ok().and_then(|s| MediaType::parse(s).ok()) else {
            return Self::default();
        };

        let charset = Name::new("charset")
            .and_then(|name| mime.get_param(name))
            .map(|value| value.as_str().trim_matches('"').to_ascii_lowercase());

        Self {
            essence: format!("{}/{}", mime.ty.as_str(), mime.subty.as_str()).to_ascii_lowercase(),
            charset,
        }
    }

    fn is(&self, essence: &str) -> bool {
        self.essence == essence
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentEncoding {
    Identity,
    Gzip,
    Deflate,
}

impl ContentEncoding {
    fn from_parts(parts: &Parts) -> HttpResult<Self> {
        let encoding = parts
            .headers
            .get(CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map_or_else(|| "identity".to_string(), str::to_ascii_lowercase);

        match encoding.as_str() {
            "identity" => Ok(Self::Identity),
            "gzip" => Ok(Self::Gzip),
            "deflate" => Ok(Self::Deflate),
            other => Err(HttpError::unsupported_media_type(format!(
                "Unsupported content-encoding \"{other}\"."
            ))),
        }
    }

    fn decode(self, raw: Bytes, limit: usize) -> HttpResult<Bytes> {
        match self {
            Self::Identity => Ok(raw),
            Self::Gzip => inflate(GzDecoder::new(&raw[..]), limit),
            Self::Deflate => inflate(ZlibDecoder::new(&raw[..]), limit),
        }
    }
}

/// Turns the request body into a map of body parameters.
///
/// Pre-parsed bodies found in the request extensions take priority over the
/// raw body. A missing or unknown content type yields no parameters.
pub(crate) async fn parse_body<B>(
    parts: &Parts,
    body: B,
    config: &BodyConfig,
) -> HttpResult<Map<String, Value>>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let preparsed = parts.extensions.get::<PreparsedBody>();
    if let Some(PreparsedBody::Json(map)) = preparsed {
        return Ok(map.clone());
    }

    let Some(header) = parts.headers.get(CONTENT_TYPE) else {
        return Ok(Map::new());
    };
    let body_type = BodyType::from_header(header);

    match preparsed {
        Some(PreparsedBody::Text(text)) if body_type.is("application/graphql") => {
            return Ok(query_only(text.clone()));
        }
        Some(_) => return Ok(Map::new()),
        None => {}
    }

    match body_type.essence.as_str() {
        "application/graphql" => Ok(query_only(read_body(parts, body, &body_type, config).await?)),
        "application/json" => parse_json_object(&read_body(parts, body, &body_type, config).await?),
        "application/x-www-form-urlencoded" => {
            parse_form(&read_body(parts, body, &body_type, config).await?)
        }
        _ => Ok(Map::new()),
    }
}

async fn read_body<B>(
    parts: &Parts,
    body: B,
    body_type: &BodyType,
    config: &BodyConfig,
) -> HttpResult<String>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let charset = body_type.charset.as_deref().unwrap_or("utf-8");
    if !charset.starts_with("utf-") {
        return Err(unsupported_charset(charset));
    }

    let encoding = ContentEncoding::from_parts(parts)?;

    let raw = Limited::new(body, config.limit)
        .collect()
        .await
        .map_err(read_error)?
        .to_bytes();

    let bytes = encoding.decode(raw, config.limit)?;
    decode_charset(&bytes, charset)
}

fn read_error(error: BoxError) -> HttpError {
    if error.is::<LengthLimitError>() {
        too_large()
    } else {
        tracing::debug!(%error, "failed to read request body");
        HttpError::bad_request(format!("Invalid body: {error}."))
    }
}

fn too_large() -> HttpError {
    HttpError::payload_too_large("Invalid body: request entity too large.")
}

fn unsupported_charset(charset: &str) -> HttpError {
    HttpError::unsupported_media_type(format!(
        "Unsupported charset \"{}\".",
        charset.to_uppercase()
    ))
}

fn inflate(reader: impl Read, limit: usize) -> HttpResult<Bytes> {
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    let mut out = Vec::new();
    reader
        .take(cap)
        .read_to_end(&mut out)
        .map_err(|error| HttpError::bad_request(format!("Invalid body: {error}.")))?;

    if out.len() > limit {
        return Err(too_large());
    }
    Ok(Bytes::from(out))
}

fn decode_charset(bytes: &[u8], charset: &str) -> HttpResult<String> {
    let encoding =
        Encoding::for_label(charset.as_bytes()).ok_or_else(|| unsupported_charset(charset))?;
    // A byte order mark overrides the label and is stripped.
    let (text, _, _) = encoding.decode(bytes);
    Ok(text.into_owned())
}

fn query_only(query: String) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("query".to_string(), Value::String(query));
    map
}

fn parse_json_object(text: &str) -> HttpResult<Map<String, Value>> {
    if text.trim_start().starts_with('{') {
        if let Ok(map) = serde_json::from_str::<Map<String, Value>>(text) {
            return Ok(map);
        }
    }
    Err(HttpError::bad_request("POST body sent invalid JSON."))
}

fn parse_form(text: &str) -> HttpResult<Map<String, Value>> {
    let pairs = serde_urlencoded::from_str::<Vec<(String, String)>>(text)
        .map_err(|error| HttpError::bad_request(format!("Invalid body: {error}.")))?;
    Ok(group_pairs(pairs))
}

/// Collects form fields; a repeated key becomes an array of its values.
pub(crate) fn group_pairs(pairs: Vec<(String, String)>) -> Map<String, Value> {
    let mut map = Map::new();
    for (key, value) in pairs {
        match map.get_mut(&key) {
            Some(Value::Array(values)) => values.push(Value::String(value)),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(value)]);
            }
            None => {
                map.insert(key, Value::String(value));
            }
        }
    }
    map
}
