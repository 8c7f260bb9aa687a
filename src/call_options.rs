//! Per-call request options.
//!
//! A [`CallOptions`] describes one logical API call: where it goes, what it
//! sends, and how it should be retried. It is built from the client-wide
//! [`ClientOptions`](crate::ClientOptions) and then customized per endpoint.

use crate::config::ClientOptions;
use crate::retry::BackoffPolicy;
use crate::{Error, Result};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Methods the API accepts.
pub const SUPPORTED_METHODS: [Method; 6] = [
    Method::GET,
    Method::DELETE,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::PATCH,
];

/// Parses a method name case-insensitively, accepting only [`SUPPORTED_METHODS`].
///
/// # Examples
///
/// ```
/// use apify_client::call_options::parse_method;
/// use http::Method;
///
/// assert_eq!(parse_method("patch").unwrap(), Method::PATCH);
/// assert!(parse_method("TRACE").is_err());
/// ```
pub fn parse_method(name: &str) -> Result<Method> {
    let upper = name.trim().to_ascii_uppercase();
    SUPPORTED_METHODS
        .iter()
        .find(|m| m.as_str() == upper)
        .cloned()
        .ok_or_else(|| {
            Error::InvalidParameter(format!(
                "Method must be one of GET, DELETE, HEAD, POST, PUT, PATCH (got \"{}\")",
                name
            ))
        })
}

/// Ordered query string parameters.
///
/// Insertion order is kept on the wire. Booleans are written as `1`/`0`, and
/// `None` values are left out so the API can tell "not specified" apart from
/// "explicitly false".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Creates an empty parameter list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a string parameter.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.pairs.push((key.into(), value.into()));
        self
    }

    /// Appends a parameter if `value` is present.
    pub fn push_opt<V: ToString>(&mut self, key: &str, value: Option<V>) -> &mut Self {
        if let Some(value) = value {
            self.push(key, value.to_string());
        }
        self
    }

    /// Appends a tri-state boolean: `Some(true)` as `1`, `Some(false)` as `0`,
    /// `None` omitted.
    pub fn push_bool(&mut self, key: &str, value: Option<bool>) -> &mut Self {
        if let Some(value) = value {
            self.push(key, if value { "1" } else { "0" });
        }
        self
    }

    /// Appends a comma-joined list if it is non-empty.
    pub fn push_list<S: AsRef<str>>(&mut self, key: &str, values: &[S]) -> &mut Self {
        if !values.is_empty() {
            let joined = values
                .iter()
                .map(|v| v.as_ref())
                .collect::<Vec<_>>()
                .join(",");
            self.push(key, joined);
        }
        self
    }

    /// Returns the value of the first parameter named `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Iterates over the parameters in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns `true` if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// A request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Serialized as JSON with `content-type: application/json` unless a
    /// content type override is set.
    Json(serde_json::Value),
    /// Sent unchanged with the configured content type.
    Raw(Vec<u8>),
}

/// Options for one logical API call.
///
/// # Examples
///
/// ```
/// use apify_client::{CallOptions, ClientOptions};
/// use http::Method;
///
/// let mut call = CallOptions::new(&ClientOptions::default(), Method::GET, "/v2/acts");
/// call.query.push_opt("limit", Some(5)).push_bool("desc", Some(true));
/// assert_eq!(call.query.get("desc"), Some("1"));
/// ```
#[derive(Debug, Clone)]
pub struct CallOptions {
    /// API base URL, e.g. `https://api.apify.com`.
    pub base_url: String,
    /// HTTP method.
    pub method: Method,
    /// Endpoint path appended to the base URL.
    pub path: String,
    /// Query parameters, excluding the token.
    pub query: QueryParams,
    /// Request payload.
    pub body: Option<RequestBody>,
    /// Additional request headers.
    pub headers: HeaderMap,
    /// API token, sent as the `token` query parameter.
    pub token: Option<String>,
    /// Content type override for the request body.
    pub content_type: Option<String>,
    /// Whether the response body should be parsed as JSON.
    pub json: bool,
    /// Retry tuning.
    pub backoff: BackoffPolicy,
    /// Status codes in `[300, 500)` that should be retried.
    pub retryable_status_codes: BTreeSet<u16>,
    /// Per-attempt timeout.
    pub timeout: Option<Duration>,
    /// Aborts the call when cancelled.
    pub cancel: Option<CancellationToken>,
}

impl CallOptions {
    /// Creates call options for `method path` from client-wide defaults.
    pub fn new(defaults: &ClientOptions, method: Method, path: impl Into<String>) -> Self {
        Self {
            base_url: defaults.base_url.trim_end_matches('/').to_string(),
            method,
            path: path.into(),
            query: QueryParams::new(),
            body: None,
            headers: HeaderMap::new(),
            token: defaults.token.clone(),
            content_type: None,
            json: true,
            backoff: defaults.backoff_policy(),
            retryable_status_codes: defaults.retryable_status_codes.clone(),
            timeout: defaults.timeout,
            cancel: None,
        }
    }

    /// Sets a JSON body from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns an error if `body` cannot be serialized.
    pub fn with_json_body<B: Serialize>(mut self, body: &B) -> Result<Self> {
        let value =
            serde_json::to_value(body).map_err(|e| Error::SerializationFailed(e.to_string()))?;
        self.body = Some(RequestBody::Json(value));
        Ok(self)
    }

    /// Sets a raw body with its content type.
    pub fn with_raw_body(mut self, body: Vec<u8>, content_type: impl Into<String>) -> Self {
        self.body = Some(RequestBody::Raw(body));
        self.content_type = Some(content_type.into());
        self
    }

    /// Sets whether the response body is parsed as JSON.
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Attaches a cancellation token.
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Adds a header to the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::InvalidParameter(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::InvalidParameter(format!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// The method in canonical upper-case form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if the method is not supported.
    pub fn normalized_method(&self) -> Result<Method> {
        parse_method(self.method.as_str())
    }

    /// Checks the constraints that must hold before any I/O and returns the
    /// normalized method.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if the base URL is empty or the
    /// method is not supported.
    pub fn validate(&self) -> Result<Method> {
        if self.base_url.trim().is_empty() {
            return Err(Error::InvalidParameter(
                "Parameter \"baseUrl\" must be a non-empty string".to_string(),
            ));
        }
        self.normalized_method()
    }
}
