//! Client-wide configuration and per-call overrides.

use crate::retry::{BackoffPolicy, DEFAULT_MAX_RETRIES, DEFAULT_MIN_DELAY_BETWEEN_RETRIES};
use crate::{Error, Result, RATE_LIMIT_STATUS};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

/// Base URL of the public Apify API.
pub const DEFAULT_BASE_URL: &str = "https://api.apify.com";

/// Environment variable holding the API token.
pub const TOKEN_ENV_VAR: &str = "APIFY_TOKEN";

/// Environment variable overriding the API base URL.
pub const BASE_URL_ENV_VAR: &str = "APIFY_API_BASE_URL";

/// Defaults applied to every call made by a client.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// API base URL.
    pub base_url: String,
    /// API token, sent as a query parameter.
    pub token: Option<String>,
    /// Retries after the first attempt.
    pub max_retries: usize,
    /// Delay before the first retry; doubles on each following one.
    pub min_delay_between_retries: Duration,
    /// Status codes in `[300, 500)` that are retried. 5xx is always retried.
    pub retryable_status_codes: BTreeSet<u16>,
    /// Per-attempt timeout.
    pub timeout: Option<Duration>,
    /// Randomize backoff delays.
    pub jitter: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            max_retries: DEFAULT_MAX_RETRIES,
            min_delay_between_retries: DEFAULT_MIN_DELAY_BETWEEN_RETRIES,
            retryable_status_codes: BTreeSet::from([RATE_LIMIT_STATUS]),
            timeout: None,
            jitter: false,
        }
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("max_retries", &self.max_retries)
            .field("min_delay_between_retries", &self.min_delay_between_retries)
            .field("retryable_status_codes", &self.retryable_status_codes)
            .field("timeout", &self.timeout)
            .field("jitter", &self.jitter)
            .finish()
    }
}

impl ClientOptions {
    /// Reads options from the environment.
    ///
    /// Reads:
    /// - `APIFY_TOKEN`: API token (optional)
    /// - `APIFY_API_BASE_URL`: base URL (optional, defaults to
    ///   `https://api.apify.com`)
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but empty.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut options = Self::default();

        if let Some(token) = lookup(TOKEN_ENV_VAR) {
            if token.trim().is_empty() {
                return Err(Error::InvalidParameter(format!(
                    "{} is set but empty",
                    TOKEN_ENV_VAR
                )));
            }
            options.token = Some(token.trim().to_string());
        }

        if let Some(base_url) = lookup(BASE_URL_ENV_VAR) {
            if base_url.trim().is_empty() {
                return Err(Error::InvalidParameter(format!(
                    "{} is set but empty",
                    BASE_URL_ENV_VAR
                )));
            }
            options.base_url = base_url.trim().to_string();
        }

        Ok(options)
    }

    /// Returns these options with every field set in `overrides` replaced.
    pub fn merged_with(&self, overrides: &OptionOverrides) -> ClientOptions {
        let mut merged = self.clone();
        overrides.apply_to(&mut merged);
        merged
    }

    /// Returns the backoff policy these options describe.
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            initial_delay: self.min_delay_between_retries,
            max_attempts: self.max_retries.saturating_add(1),
            jitter: self.jitter,
        }
    }
}

/// A partial set of [`ClientOptions`]; every `Some` field wins over the default.
///
/// # Examples
///
/// ```
/// use apify_client::{ClientOptions, OptionOverrides};
///
/// let defaults = ClientOptions::default();
/// let merged = defaults.merged_with(&OptionOverrides::new().token("t").max_retries(2));
/// assert_eq!(merged.token.as_deref(), Some("t"));
/// assert_eq!(merged.max_retries, 2);
/// assert_eq!(merged.base_url, defaults.base_url);
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct OptionOverrides {
    /// Overrides [`ClientOptions::base_url`].
    pub base_url: Option<String>,
    /// Overrides [`ClientOptions::token`].
    pub token: Option<String>,
    /// Overrides [`ClientOptions::max_retries`].
    pub max_retries: Option<usize>,
    /// Overrides [`ClientOptions::min_delay_between_retries`].
    pub min_delay_between_retries: Option<Duration>,
    /// Overrides [`ClientOptions::retryable_status_codes`].
    pub retryable_status_codes: Option<BTreeSet<u16>>,
    /// Overrides [`ClientOptions::timeout`].
    pub timeout: Option<Duration>,
    /// Overrides [`ClientOptions::jitter`].
    pub jitter: Option<bool>,
}

impl fmt::Debug for OptionOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionOverrides")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("max_retries", &self.max_retries)
            .field("min_delay_between_retries", &self.min_delay_between_retries)
            .field("retryable_status_codes", &self.retryable_status_codes)
            .field("timeout", &self.timeout)
            .field("jitter", &self.jitter)
            .finish()
    }
}

impl OptionOverrides {
    /// Creates an empty set of overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Overrides the token.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Overrides the retry count.
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Overrides the initial backoff delay.
    pub fn min_delay_between_retries(mut self, delay: Duration) -> Self {
        self.min_delay_between_retries = Some(delay);
        self
    }

    /// Overrides the retryable status set.
    pub fn retryable_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.retryable_status_codes = Some(codes.into_iter().collect());
        self
    }

    /// Overrides the per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Overrides backoff jitter.
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = Some(jitter);
        self
    }

    pub(crate) fn apply_to(&self, options: &mut ClientOptions) {
        if let Some(base_url) = &self.base_url {
            options.base_url = base_url.clone();
        }
        if let Some(token) = &self.token {
            options.token = Some(token.clone());
        }
        if let Some(max_retries) = self.max_retries {
            options.max_retries = max_retries;
        }
        if let Some(delay) = self.min_delay_between_retries {
            options.min_delay_between_retries = delay;
        }
        if let Some(codes) = &self.retryable_status_codes {
            options.retryable_status_codes = codes.clone();
        }
        if let Some(timeout) = self.timeout {
            options.timeout = Some(timeout);
        }
        if let Some(jitter) = self.jitter {
            options.jitter = jitter;
        }
    }
}
