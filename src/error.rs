//! Error types for Apify API calls.
//!
//! Every error surfaced by this crate carries a stable [`ErrorKind`], a human
//! readable message and, when the failure came from an HTTP exchange, an
//! [`ErrorDetails`] bag describing which endpoint, method and attempt failed.
//! Callers can branch on these (for example "is this a not-found?") without
//! matching on message text.

use http::{Method, StatusCode};

/// Status code the platform uses for a missing resource.
pub const NOT_FOUND_STATUS: u16 = 404;

/// Status code the platform uses when a client is being rate limited.
pub const RATE_LIMIT_STATUS: u16 = 429;

/// Machine-readable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The caller supplied a malformed or missing argument. Never retried.
    InvalidParameter,
    /// The remote call failed, either terminally or after exhausting retries.
    RequestFailed,
}

impl ErrorKind {
    /// Returns the stable string form of this kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidParameter => "invalid-parameter",
            ErrorKind::RequestFailed => "request-failed",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured context attached to errors produced by an HTTP attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorDetails {
    /// Response status code, if a response was received.
    pub status_code: Option<u16>,
    /// Request URL without the query string.
    pub url: Option<String>,
    /// HTTP method of the request.
    pub method: Option<Method>,
    /// The 1-based attempt number that produced this error.
    pub attempt: Option<usize>,
    /// Whether the response carried a non-empty body.
    pub has_body: bool,
    /// Message of the underlying low-level error, if any.
    pub cause: Option<String>,
}

/// The main error type for Apify API calls.
///
/// # Examples
///
/// ```no_run
/// use apify_client::{ApifyClient, Error, ErrorKind};
///
/// # async fn example() -> Result<(), Error> {
/// let client = ApifyClient::builder().token("my-token").build()?;
///
/// match client.requester()?.get_actor("apify~web-scraper").await {
///     Ok(Some(actor)) => println!("Actor: {}", actor["name"]),
///     Ok(None) => println!("No such actor"),
///     Err(e) if e.kind() == ErrorKind::InvalidParameter => eprintln!("Bad input: {}", e),
///     Err(e) => eprintln!("Request failed: {} ({:?})", e, e.details()),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A required argument was missing or malformed.
    ///
    /// Raised before any network I/O takes place.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The API answered with an error status.
    ///
    /// `error_type` and `message` come from the response body when it carries
    /// them, otherwise they fall back to generic values.
    #[error("{message} ({error_type})")]
    Api {
        /// The platform's error type, e.g. `record-not-found`.
        error_type: String,
        /// Human readable message.
        message: String,
        /// The raw response body.
        raw_response: String,
        /// Request and response context.
        details: Box<ErrorDetails>,
    },

    /// A network-level failure (connection refused, DNS, reset, ...).
    #[error("Network error: {source}")]
    Network {
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
        /// Request context.
        details: Box<ErrorDetails>,
    },

    /// The attempt exceeded the configured timeout.
    #[error("Request timed out")]
    Timeout {
        /// Request context.
        details: Box<ErrorDetails>,
    },

    /// A JSON response was expected but the body did not parse.
    #[error("Failed to parse response body (status {status}): {serde_error}")]
    MalformedBody {
        /// The raw response body.
        raw_response: String,
        /// The serde error message.
        serde_error: String,
        /// The HTTP status code.
        status: StatusCode,
        /// Request and response context.
        details: Box<ErrorDetails>,
    },

    /// Every allowed attempt ended in a retryable failure.
    #[error("Max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded {
        /// The number of attempts made.
        attempts: usize,
        /// The failure of the final attempt.
        last_error: Box<Error>,
    },

    /// The call was aborted through its cancellation token.
    #[error("Request cancelled during attempt {attempt}")]
    Cancelled {
        /// The attempt that was running or about to run.
        attempt: usize,
        /// Request context.
        details: Box<ErrorDetails>,
    },

    /// The request body could not be serialized.
    #[error("Failed to serialize request: {0}")]
    SerializationFailed(String),

    /// The base URL and path did not form a valid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidParameter(_) | Error::SerializationFailed(_) | Error::InvalidUrl(_) => {
                ErrorKind::InvalidParameter
            }
            _ => ErrorKind::RequestFailed,
        }
    }

    /// Returns the request/response context, if this error came from an attempt.
    ///
    /// For [`Error::MaxRetriesExceeded`] this is the context of the last attempt.
    pub fn details(&self) -> Option<&ErrorDetails> {
        match self {
            Error::Api { details, .. }
            | Error::Network { details, .. }
            | Error::Timeout { details }
            | Error::MalformedBody { details, .. }
            | Error::Cancelled { details, .. } => Some(&**details),
            Error::MaxRetriesExceeded { last_error, .. } => last_error.details(),
            _ => None,
        }
    }

    /// Returns the HTTP status code if a response was received.
    pub fn status(&self) -> Option<u16> {
        self.details().and_then(|d| d.status_code)
    }

    /// Returns the platform's error type string, if the API reported one.
    ///
    /// Validation errors report `invalid-parameter`.
    pub fn error_type(&self) -> Option<&str> {
        match self {
            Error::Api { error_type, .. } => Some(error_type.as_str()),
            Error::InvalidParameter(_) => Some(ErrorKind::InvalidParameter.as_str()),
            Error::MaxRetriesExceeded { last_error, .. } => last_error.error_type(),
            _ => None,
        }
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::Api { raw_response, .. } => Some(raw_response.as_str()),
            Error::MalformedBody { raw_response, .. } => Some(raw_response.as_str()),
            Error::MaxRetriesExceeded { last_error, .. } => last_error.raw_response(),
            _ => None,
        }
    }

    /// Returns `true` if the API reported the resource as missing.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(NOT_FOUND_STATUS)
    }

    /// Returns `true` if the call was aborted through its cancellation token.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }

    /// Returns `true` if this error is retryable under the default policy.
    ///
    /// Transport failures, timeouts, unparseable bodies, 5xx responses and
    /// 429 responses are retryable. Everything else is not.
    ///
    /// # Examples
    ///
    /// ```
    /// use apify_client::{Error, ErrorDetails};
    ///
    /// let err = Error::Api {
    ///     error_type: "internal-error".to_string(),
    ///     message: "Oops".to_string(),
    ///     raw_response: String::new(),
    ///     details: Box::new(ErrorDetails {
    ///         status_code: Some(503),
    ///         ..Default::default()
    ///     }),
    /// };
    /// assert!(err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network { .. } | Error::Timeout { .. } | Error::MalformedBody { .. } => true,
            Error::Api { details, .. } => match details.status_code {
                Some(status) => status >= 500 || status == RATE_LIMIT_STATUS,
                None => false,
            },
            _ => false,
        }
    }
}

/// A specialized `Result` type for Apify API calls.
pub type Result<T> = std::result::Result<T, Error>;
