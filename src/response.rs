//! Successful responses and their decoded bodies.
//!
//! [`ApiResponse`] keeps the decoded body together with the HTTP metadata of
//! the attempt that produced it, so endpoint code can read pagination headers
//! or the content type after a call returns.

use crate::normalize::{coerce_date_fields, unwrap_envelope};
use crate::{Error, ErrorDetails, Result};
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// A decoded response payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// The response had no body.
    Empty,
    /// A parsed JSON document.
    Json(Value),
    /// A textual payload.
    Text(String),
    /// An opaque binary payload.
    Bytes(Vec<u8>),
}

impl ResponseBody {
    /// Returns the JSON document, if this body is JSON.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the text, if this body is textual.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Converts the body into a JSON value.
    ///
    /// Text becomes a JSON string; empty and binary bodies become `null`.
    pub fn into_json(self) -> Value {
        match self {
            ResponseBody::Json(value) => value,
            ResponseBody::Text(text) => Value::String(text),
            ResponseBody::Empty | ResponseBody::Bytes(_) => Value::Null,
        }
    }

    /// Returns the payload as raw bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            ResponseBody::Empty => Vec::new(),
            ResponseBody::Json(value) => value.to_string().into_bytes(),
            ResponseBody::Text(text) => text.into_bytes(),
            ResponseBody::Bytes(bytes) => bytes,
        }
    }

    /// Returns `true` if the response had no body.
    pub fn is_empty(&self) -> bool {
        matches!(self, ResponseBody::Empty)
    }
}

/// A successful API response.
///
/// # Examples
///
/// ```
/// # use apify_client::{ApiResponse, ResponseBody};
/// # use http::{HeaderMap, StatusCode};
/// # use std::time::Duration;
/// let response = ApiResponse::new(
///     ResponseBody::Json(serde_json::json!({ "data": { "id": "abc" } })),
///     StatusCode::OK,
///     HeaderMap::new(),
///     Duration::from_millis(12),
///     1,
/// );
///
/// assert!(!response.was_retried());
/// assert_eq!(response.into_data()["id"], "abc");
/// ```
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// The decoded body.
    pub body: ResponseBody,

    /// The HTTP status code.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// Time from the first attempt until this response arrived.
    pub latency: Duration,

    /// The number of attempts made, `1` if no retry was needed.
    pub attempts: usize,
}

impl ApiResponse {
    /// Creates a new `ApiResponse`.
    pub fn new(
        body: ResponseBody,
        status: StatusCode,
        headers: HeaderMap,
        latency: Duration,
        attempts: usize,
    ) -> Self {
        Self {
            body,
            status,
            headers,
            latency,
            attempts,
        }
    }

    /// Returns `true` if the request required retries.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Returns the response content type, if present.
    pub fn content_type(&self) -> Option<&str> {
        self.header(http::header::CONTENT_TYPE.as_str())
    }

    /// Unwraps the `data` envelope and normalizes date fields.
    ///
    /// Returns `null` when the body has no `data` property.
    pub fn into_data(self) -> Value {
        coerce_date_fields(unwrap_envelope(self.body.into_json()), 0)
    }

    /// Deserializes the enveloped payload into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedBody`] if the payload does not match `T`.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T> {
        let status = self.status;
        let data = self.into_data();
        <T as Deserialize>::deserialize(&data).map_err(|e| {
            tracing::error!(error = %e, "Failed to deserialize response payload");
            Error::MalformedBody {
                raw_response: data.to_string(),
                serde_error: e.to_string(),
                status,
                details: Box::new(ErrorDetails {
                    status_code: Some(status.as_u16()),
                    has_body: true,
                    ..Default::default()
                }),
            }
        })
    }
}

impl AsRef<ResponseBody> for ApiResponse {
    fn as_ref(&self) -> &ResponseBody {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use http::HeaderValue;
    use serde::Deserialize;
    use serde_json::json;

    fn response(body: ResponseBody) -> ApiResponse {
        ApiResponse::new(
            body,
            StatusCode::OK,
            HeaderMap::new(),
            Duration::from_millis(5),
            2,
        )
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Actor {
        id: String,
        created_at: DateTime<Utc>,
    }

    #[test]
    fn into_typed_reads_enveloped_payload() {
        let body = json!({ "data": { "id": "abc", "createdAt": "2019-01-02T03:04:05Z" } });
        let actor: Actor = response(ResponseBody::Json(body)).into_typed().unwrap();
        assert_eq!(actor.id, "abc");
        assert_eq!(actor.created_at.timestamp(), 1_546_398_245);
    }

    #[test]
    fn into_typed_reports_mismatched_payload() {
        let body = json!({ "data": { "name": "no id here" } });
        let err = response(ResponseBody::Json(body))
            .into_typed::<Actor>()
            .unwrap_err();
        assert!(matches!(err, Error::MalformedBody { .. }));
    }

    #[test]
    fn into_data_without_envelope_is_null() {
        assert_eq!(response(ResponseBody::Empty).into_data(), Value::Null);
        assert_eq!(
            response(ResponseBody::Json(json!({ "items": [] }))).into_data(),
            Value::Null
        );
    }

    #[test]
    fn header_accessors() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("text/plain"));
        let response = ApiResponse::new(
            ResponseBody::Text("hi".to_string()),
            StatusCode::OK,
            headers,
            Duration::ZERO,
            1,
        );
        assert_eq!(response.content_type(), Some("text/plain"));
        assert_eq!(response.body.as_text(), Some("hi"));
        assert!(!response.was_retried());
    }

    #[test]
    fn body_conversions() {
        assert_eq!(
            ResponseBody::Text("x".to_string()).into_json(),
            Value::String("x".to_string())
        );
        assert_eq!(ResponseBody::Bytes(vec![1, 2]).into_bytes(), vec![1, 2]);
        assert!(ResponseBody::Empty.is_empty());
        assert!(response(ResponseBody::Empty).was_retried());
    }
}
