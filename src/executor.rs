//! Single-attempt request execution and outcome classification.
//!
//! [`attempt`] performs exactly one HTTP exchange and classifies it as an
//! [`Outcome`]; it never sleeps or retries. [`execute`] drives attempts
//! through [`run_with_backoff`] to complete one logical call.

use crate::call_options::{CallOptions, RequestBody};
use crate::response::{ApiResponse, ResponseBody};
use crate::retry::{run_with_backoff, Outcome};
use crate::stats::Stats;
use crate::{Error, ErrorDetails, ErrorKind, Result, RATE_LIMIT_STATUS};
use http::header::{CONTENT_TYPE, USER_AGENT};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use serde_json::Value;
use std::time::{Duration, Instant};
use url::Url;

/// Message used when an error response does not describe itself.
pub const DEFAULT_ERROR_MESSAGE: &str = "Server request failed.";

/// The `user-agent` sent with every request.
pub fn user_agent() -> String {
    format!(
        "ApifyClient/{} ({}; Rust)",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS
    )
}

/// A response as received, before classification.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// Status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Un-decoded body.
    pub body: Vec<u8>,
}

/// Builds the request URL: base URL without trailing slash, the path, the
/// query parameters in order and finally the token.
pub fn build_url(call: &CallOptions) -> Result<Url> {
    let base = call.base_url.trim_end_matches('/');
    let mut url = Url::parse(&format!("{}{}", base, call.path))?;

    if !call.query.is_empty() || call.token.is_some() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in call.query.iter() {
            pairs.append_pair(key, value);
        }
        if let Some(token) = &call.token {
            pairs.append_pair("token", token);
        }
    }

    Ok(url)
}

/// The URL with its query removed, safe to log.
fn display_url(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}

/// Builds an API error from a response body.
///
/// Uses the `type` and `message` reported by the API, either at the top level
/// or nested under `error`. The body may also be a JSON string that itself
/// holds such a document. Otherwise falls back to `request-failed` and
/// [`DEFAULT_ERROR_MESSAGE`].
pub fn new_error(body: &[u8], details: ErrorDetails) -> Error {
    let raw_response = String::from_utf8_lossy(body).into_owned();

    let parsed = match serde_json::from_slice::<Value>(body) {
        Ok(Value::String(inner)) => serde_json::from_str::<Value>(&inner).ok(),
        Ok(value) => Some(value),
        Err(_) => None,
    };

    let (error_type, message) = parsed
        .as_ref()
        .and_then(reported_error)
        .unwrap_or_else(|| {
            (
                ErrorKind::RequestFailed.as_str().to_string(),
                DEFAULT_ERROR_MESSAGE.to_string(),
            )
        });

    Error::Api {
        error_type,
        message,
        raw_response,
        details: Box::new(details),
    }
}

fn reported_error(value: &Value) -> Option<(String, String)> {
    let source = value.get("error").filter(|e| e.is_object()).unwrap_or(value);
    let error_type = source.get("type")?.as_str()?;
    let message = source.get("message")?.as_str()?;
    Some((error_type.to_string(), message.to_string()))
}

fn transport_error(error: reqwest::Error, mut details: ErrorDetails) -> Error {
    details.cause = Some(error.to_string());
    if error.is_timeout() {
        Error::Timeout {
            details: Box::new(details),
        }
    } else {
        Error::Network {
            source: error,
            details: Box::new(details),
        }
    }
}

fn request_headers(call: &CallOptions) -> Result<HeaderMap> {
    let mut headers = call.headers.clone();

    let agent = HeaderValue::from_str(&user_agent())
        .map_err(|e| Error::InvalidParameter(format!("Invalid header value: {}", e)))?;
    headers.insert(USER_AGENT, agent);

    let content_type = match (&call.body, &call.content_type) {
        (Some(_), Some(content_type)) => Some(content_type.as_str()),
        (Some(RequestBody::Json(_)), None) => Some("application/json"),
        _ => None,
    };
    if let Some(content_type) = content_type {
        let value = HeaderValue::from_str(content_type)
            .map_err(|e| Error::InvalidParameter(format!("Invalid content type: {}", e)))?;
        headers.insert(CONTENT_TYPE, value);
    }

    Ok(headers)
}

fn build_request(
    http: &reqwest::Client,
    call: &CallOptions,
    method: Method,
    url: Url,
) -> Result<reqwest::RequestBuilder> {
    let mut request = http
        .request(method, url)
        .headers(request_headers(call)?);

    match &call.body {
        Some(RequestBody::Json(value)) => {
            let bytes =
                serde_json::to_vec(value).map_err(|e| Error::SerializationFailed(e.to_string()))?;
            request = request.body(bytes);
        }
        Some(RequestBody::Raw(bytes)) => {
            request = request.body(bytes.clone());
        }
        None => {}
    }

    if let Some(timeout) = call.timeout {
        request = request.timeout(timeout);
    }

    Ok(request)
}

/// Classifies a received response.
///
/// In priority order: 2xx (and below) succeeds, with a JSON body parse failure
/// counted as retryable; `[300, 500)` outside the retryable set is terminal;
/// 429 is retryable and counted in the rate-limit stats; everything else
/// (5xx or a configured status) is retryable.
pub fn classify(
    call: &CallOptions,
    attempt: usize,
    stats: &Stats,
    raw: RawResponse,
    mut details: ErrorDetails,
    latency: Duration,
) -> Outcome<ApiResponse> {
    let status = raw.status.as_u16();
    details.status_code = Some(status);
    details.has_body = !raw.body.is_empty();

    if status < 300 {
        let body = if raw.body.is_empty() {
            ResponseBody::Empty
        } else if call.json {
            match serde_json::from_slice(&raw.body) {
                Ok(value) => ResponseBody::Json(value),
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        status = status,
                        attempt = attempt,
                        "Failed to parse JSON response body"
                    );
                    details.cause = Some(e.to_string());
                    return Outcome::Retryable(Error::MalformedBody {
                        raw_response: String::from_utf8_lossy(&raw.body).into_owned(),
                        serde_error: e.to_string(),
                        status: raw.status,
                        details: Box::new(details),
                    });
                }
            }
        } else {
            ResponseBody::Bytes(raw.body)
        };

        return Outcome::Success(ApiResponse::new(
            body,
            raw.status,
            raw.headers,
            latency,
            attempt,
        ));
    }

    let error = new_error(&raw.body, details);

    if status < 500 && !call.retryable_status_codes.contains(&status) {
        tracing::error!(
            status = status,
            error = %error,
            attempt = attempt,
            "Client error (non-retryable)"
        );
        return Outcome::Terminal(error);
    }

    if status == RATE_LIMIT_STATUS {
        stats.record_rate_limit(attempt);
    }

    tracing::warn!(
        status = status,
        error = %error,
        attempt = attempt,
        "Request failed with retryable status"
    );
    Outcome::Retryable(error)
}

/// Performs one HTTP attempt of a call and classifies the result.
///
/// Validation failures are terminal and happen before any I/O. Each attempt
/// that reaches the network counts once in `stats.requests`.
pub async fn attempt(
    http: &reqwest::Client,
    call: &CallOptions,
    attempt: usize,
    stats: &Stats,
) -> Outcome<ApiResponse> {
    let prepared = call.validate().and_then(|method| {
        let url = build_url(call)?;
        let shown = display_url(&url);
        build_request(http, call, method.clone(), url).map(|request| (request, method, shown))
    });
    let (request, method, url) = match prepared {
        Ok(prepared) => prepared,
        Err(e) => return Outcome::Terminal(e),
    };

    let details = ErrorDetails {
        url: Some(url.clone()),
        method: Some(method.clone()),
        attempt: Some(attempt),
        ..Default::default()
    };

    stats.record_request();
    tracing::debug!(
        method = %method,
        url = %url,
        attempt = attempt,
        "Executing HTTP request"
    );

    let started = Instant::now();
    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(error = %e, url = %url, attempt = attempt, "Request failed");
            return Outcome::Retryable(transport_error(e, details));
        }
    };

    let status = response.status();
    let headers = response.headers().clone();
    let body = match response.bytes().await {
        Ok(bytes) => bytes.to_vec(),
        Err(e) => {
            tracing::warn!(
                error = %e,
                status = status.as_u16(),
                attempt = attempt,
                "Failed to read response body"
            );
            let details = ErrorDetails {
                status_code: Some(status.as_u16()),
                ..details
            };
            return Outcome::Retryable(transport_error(e, details));
        }
    };

    let latency = started.elapsed();
    tracing::info!(
        status = status.as_u16(),
        latency_ms = latency.as_millis(),
        attempt = attempt,
        "Received HTTP response"
    );

    classify(
        call,
        attempt,
        stats,
        RawResponse {
            status,
            headers,
            body,
        },
        details,
        latency,
    )
}

/// Runs a complete logical call: validation, then attempts under the call's
/// backoff policy.
///
/// `stats.calls` grows by one per call; `stats.requests` by one per attempt.
pub async fn execute(
    http: &reqwest::Client,
    call: &CallOptions,
    stats: &Stats,
) -> Result<ApiResponse> {
    let method = call.validate()?;
    stats.record_call();

    let started = Instant::now();
    let mut response = run_with_backoff(&call.backoff, call.cancel.as_ref(), |number| {
        attempt(http, call, number, stats)
    })
    .await
    .map_err(|error| match error {
        Error::Cancelled { attempt, mut details } => {
            details.url = build_url(call).ok().map(|url| display_url(&url));
            details.method = Some(method.clone());
            Error::Cancelled { attempt, details }
        }
        other => other,
    })?;

    response.latency = started.elapsed();
    Ok(response)
}
