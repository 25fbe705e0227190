//! Decoding of incoming HTTP requests into [`RequestOptions`].
//!
//! Sources are tried in a fixed order and the first one that yields a query
//! wins:
//!
//! 1. the URL query string, whatever the method or body
//! 2. nothing at all for non-POST requests or POST requests without a body
//! 3. the body, interpreted according to the `Content-Type` header
//!
//! Decoding never fails. Anything malformed degrades to empty fields and the
//! schema reports the missing document like any other validation error.

use async_trait::async_trait;
use bytes::Bytes;
use hyper::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::error::Result;

/// Canonical decoded form of a GraphQL request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestOptions {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub variables: Map<String, Value>,
    #[serde(default, rename = "operationName")]
    pub operation_name: String,
}

impl RequestOptions {
    /// Returns true if no field carries a value.
    pub fn is_empty(&self) -> bool {
        self.query.is_empty() && self.variables.is_empty() && self.operation_name.is_empty()
    }
}

/// An already-parsed HTTP request as seen by the decoder.
#[async_trait]
pub trait IncomingRequest: Send {
    /// The request method.
    fn method(&self) -> &Method;

    /// Looks a header up case-insensitively. Returns `""` when absent.
    fn header(&self, name: &str) -> &str;

    /// The raw URL query string without the leading `?`. `""` when absent.
    fn raw_query(&self) -> &str;

    /// Whether a body is present and has not been taken yet.
    fn has_body(&self) -> bool;

    /// Reads the whole body, failing once more than `limit` bytes arrive.
    ///
    /// The body can be read once; later calls fail with
    /// [`ErrorCode::BodyConsumed`](crate::error::ErrorCode::BodyConsumed).
    async fn read_body(&mut self, limit: usize) -> Result<Bytes>;
}

/// Content types the decoder dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestContentType {
    /// `application/graphql`: the body is the document.
    GraphQL,
    /// `application/x-www-form-urlencoded`: the body holds form fields.
    FormUrlEncoded,
    /// `application/json`, also used for missing or unknown types.
    Json,
}

impl RequestContentType {
    pub const GRAPHQL: &'static str = "application/graphql";
    pub const FORM_URL_ENCODED: &'static str = "application/x-www-form-urlencoded";
    pub const JSON: &'static str = "application/json";

    /// Classifies a `Content-Type` header value by the token before the first `;`.
    pub fn from_header(value: &str) -> Self {
        let (essence, _) = value.split_once(';').unwrap_or((value, ""));
        let essence = essence.trim();

        if essence.eq_ignore_ascii_case(Self::GRAPHQL) {
            Self::GraphQL
        } else if essence.eq_ignore_ascii_case(Self::FORM_URL_ENCODED) {
            Self::FormUrlEncoded
        } else {
            Self::Json
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::GraphQL => Self::GRAPHQL,
            Self::FormUrlEncoded => Self::FORM_URL_ENCODED,
            Self::Json => Self::JSON,
        }
    }
}

/// Key/value pairs from a query string or a form body.
///
/// Lookups return the first value given for a key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields(Vec<(String, String)>);

impl FormFields {
    /// Parses `application/x-www-form-urlencoded` input.
    pub fn parse(input: &[u8]) -> std::result::Result<Self, serde_urlencoded::de::Error> {
        serde_urlencoded::from_bytes(input).map(Self)
    }

    /// Returns the first value for `key`, or `""`.
    pub fn get(&self, key: &str) -> &str {
        self.0
            .iter()
            .find(|(name, _)| name == key)
            .map_or("", |(_, value)| value.as_str())
    }

    /// Builds request options when a non-empty `query` field is present.
    pub fn request_options(&self) -> Option<RequestOptions> {
        let query = self.get("query");
        if query.is_empty() {
            return None;
        }

        Some(RequestOptions {
            query: query.to_string(),
            variables: parse_variables(self.get("variables")),
            operation_name: self.get("operationName").to_string(),
        })
    }
}

/// Body shape with `variables` as a nested object.
#[derive(Deserialize)]
struct JsonRequestOptions {
    query: Option<String>,
    variables: Option<Map<String, Value>>,
    #[serde(rename = "operationName")]
    operation_name: Option<String>,
}

/// Body shape with `variables` sent as a JSON-encoded string.
#[derive(Deserialize)]
struct CompatRequestOptions {
    query: Option<String>,
    variables: Option<String>,
    #[serde(rename = "operationName")]
    operation_name: Option<String>,
}

/// Parses a JSON object of variables. Empty or malformed input yields no variables.
pub fn parse_variables(raw: &str) -> Map<String, Value> {
    if raw.is_empty() {
        return Map::new();
    }

    match serde_json::from_str(raw) {
        Ok(variables) => variables,
        Err(err) => {
            debug!("ignoring malformed variables: {}", err);
            Map::new()
        }
    }
}

/// Decodes a request, bounding body reads by `max_body_size` bytes.
pub async fn decode<R>(request: &mut R, max_body_size: usize) -> RequestOptions
where
    R: IncomingRequest + ?Sized,
{
    if let Some(options) = from_query_string(request.raw_query()) {
        trace!("using GraphQL request from the query string");
        return options;
    }

    if request.method() != Method::POST {
        trace!("{} request without a query parameter", request.method());
        return RequestOptions::default();
    }

    if !request.has_body() {
        trace!("POST request without a body");
        return RequestOptions::default();
    }

    let content_type = RequestContentType::from_header(request.header("content-type"));
    trace!("decoding POST body as {}", content_type.as_str());

    let body = match request.read_body(max_body_size).await {
        Ok(body) => body,
        Err(err) => {
            debug!("failed to read request body: {}", err);
            return RequestOptions::default();
        }
    };

    match content_type {
        RequestContentType::GraphQL => RequestOptions {
            query: String::from_utf8_lossy(&body).into_owned(),
            ..RequestOptions::default()
        },
        RequestContentType::FormUrlEncoded => from_form_body(&body),
        RequestContentType::Json => from_json_body(&body),
    }
}

/// Decodes a request without limiting the body size.
pub async fn decode_unbounded<R>(request: &mut R) -> RequestOptions
where
    R: IncomingRequest + ?Sized,
{
    decode(request, usize::MAX).await
}

fn from_query_string(raw_query: &str) -> Option<RequestOptions> {
    if raw_query.is_empty() {
        return None;
    }

    match FormFields::parse(raw_query.as_bytes()) {
        Ok(fields) => fields.request_options(),
        Err(err) => {
            debug!("ignoring unparseable query string: {}", err);
            None
        }
    }
}

fn from_form_body(body: &[u8]) -> RequestOptions {
    match FormFields::parse(body) {
        Ok(fields) => fields.request_options().unwrap_or_default(),
        Err(err) => {
            debug!("failed to parse form body: {}", err);
            RequestOptions::default()
        }
    }
}

fn from_json_body(body: &[u8]) -> RequestOptions {
    match serde_json::from_slice::<JsonRequestOptions>(body) {
        Ok(parsed) => {
            return RequestOptions {
                query: parsed.query.unwrap_or_default(),
                variables: parsed.variables.unwrap_or_default(),
                operation_name: parsed.operation_name.unwrap_or_default(),
            };
        }
        Err(err) => debug!("failed to parse JSON body: {}", err),
    }

    // Some clients send `variables` as a JSON-encoded string.
    match serde_json::from_slice::<CompatRequestOptions>(body) {
        Ok(compat) => {
            return RequestOptions {
                query: compat.query.unwrap_or_default(),
                variables: parse_variables(compat.variables.as_deref().unwrap_or_default()),
                operation_name: compat.operation_name.unwrap_or_default(),
            };
        }
        Err(err) => debug!("failed to parse JSON body with string variables: {}", err),
    }

    let mut options = RequestOptions::default();
    if let Ok(Value::Object(object)) = serde_json::from_slice::<Value>(body) {
        salvage_fields(object, &mut options);
    }
    options
}

/// Keeps every field whose JSON type is usable and drops the rest.
fn salvage_fields(object: Map<String, Value>, options: &mut RequestOptions) {
    for (key, value) in object {
        match (key.as_str(), value) {
            ("query", Value::String(query)) => options.query = query,
            ("operationName", Value::String(name)) => options.operation_name = name,
            ("variables", Value::Object(variables)) => options.variables = variables,
            ("variables", Value::String(raw)) => options.variables = parse_variables(&raw),
            _ => {}
        }
    }
}
