//! Pure transforms applied to successful responses.

use crate::response::ResponseBody;
use crate::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value;

/// How deep [`coerce_date_fields`] descends into nested values.
pub const DATE_FIELDS_MAX_DEPTH: usize = 3;

/// Keys ending with this suffix hold timestamps.
pub const DATE_FIELD_SUFFIX: &str = "At";

/// Returns the `data` property of an enveloped body, or `null` if there is none.
///
/// # Examples
///
/// ```
/// use apify_client::normalize::unwrap_envelope;
/// use serde_json::{json, Value};
///
/// assert_eq!(unwrap_envelope(json!({ "data": [1, 2] })), json!([1, 2]));
/// assert_eq!(unwrap_envelope(json!("plain")), Value::Null);
/// ```
pub fn unwrap_envelope(body: Value) -> Value {
    match body {
        Value::Object(mut map) => map.remove("data").unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

/// Normalizes every timestamp held under a key ending in `At`.
///
/// Matching values that parse as a date (RFC 3339 strings, naive ISO-8601
/// strings, or epoch milliseconds) are rewritten as canonical RFC 3339 UTC
/// strings with millisecond precision, which `chrono::DateTime<Utc>`
/// deserializes directly. `null` and unparseable values are left alone.
/// Nested objects and arrays are visited down to [`DATE_FIELDS_MAX_DEPTH`];
/// anything deeper is returned as-is. Applying this twice is the same as once.
///
/// # Examples
///
/// ```
/// use apify_client::normalize::coerce_date_fields;
/// use serde_json::json;
///
/// let value = coerce_date_fields(json!({ "createdAt": "2019-01-02T03:04:05Z", "name": "x" }), 0);
/// assert_eq!(value["createdAt"], "2019-01-02T03:04:05.000Z");
/// assert_eq!(value["name"], "x");
/// ```
pub fn coerce_date_fields(value: Value, depth: usize) -> Value {
    if depth > DATE_FIELDS_MAX_DEPTH {
        return value;
    }

    match value {
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| coerce_date_fields(item, depth + 1))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| {
                    let value = if key.ends_with(DATE_FIELD_SUFFIX) {
                        coerce_date_value(value)
                    } else if value.is_object() || value.is_array() {
                        coerce_date_fields(value, depth + 1)
                    } else {
                        value
                    };
                    (key, value)
                })
                .collect(),
        ),
        other => other,
    }
}

fn coerce_date_value(value: Value) -> Value {
    match parse_date(&value) {
        Some(date) => Value::String(date.to_rfc3339_opts(SecondsFormat::Millis, true)),
        None => value,
    }
}

/// Parses a JSON value holding a timestamp.
pub fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => parse_date_str(text),
        Value::Number(number) => number.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

fn parse_date_str(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Decodes a raw payload according to its MIME type.
///
/// `text/*` and `application/xml` become text, `application/json` is parsed,
/// everything else is kept as bytes. Parameters such as `charset` are ignored.
///
/// # Errors
///
/// Returns the serde error if a JSON payload does not parse.
pub fn decode_body(body: Vec<u8>, content_type: Option<&str>) -> serde_json::Result<ResponseBody> {
    if body.is_empty() {
        return Ok(ResponseBody::Empty);
    }

    let essence = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .unwrap_or_default();

    if essence.starts_with("text/") || essence == "application/xml" {
        return Ok(ResponseBody::Text(
            String::from_utf8_lossy(&body).into_owned(),
        ));
    }
    if essence == "application/json" {
        return serde_json::from_slice(&body).map(ResponseBody::Json);
    }
    Ok(ResponseBody::Bytes(body))
}

/// Turns a not-found error into `Ok(None)`.
///
/// Apply this to lookup-style operations only; list and create operations
/// should surface a 404 as an error.
///
/// # Examples
///
/// ```
/// use apify_client::{normalize::decode_not_found, Error, ErrorDetails};
///
/// let missing: apify_client::Result<u32> = Err(Error::Api {
///     error_type: "record-not-found".to_string(),
///     message: "Missing".to_string(),
///     raw_response: String::new(),
///     details: Box::new(ErrorDetails { status_code: Some(404), ..Default::default() }),
/// });
/// assert_eq!(decode_not_found(missing).unwrap(), None);
/// assert_eq!(decode_not_found(Ok(7)).unwrap(), Some(7));
/// ```
pub fn decode_not_found<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(error) if error.is_not_found() => {
            tracing::debug!(error = %error, "Resource not found");
            Ok(None)
        }
        Err(error) => Err(error),
    }
}
