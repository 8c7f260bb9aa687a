//! The client façade.
//!
//! [`ApifyClient`] owns the connection pool, the client-wide
//! [`ClientOptions`] and the per-client [`Stats`]. Every logical call goes
//! through a [`Requester`]: a handle bound to the client with the options
//! for that call already merged.

use crate::call_options::CallOptions;
use crate::config::{ClientOptions, OptionOverrides};
use crate::executor;
use crate::stats::{Stats, StatsSnapshot};
use crate::{ApiResponse, Error, Result};
use http::Method;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// A client for the Apify API.
///
/// The client is cheap to clone; clones share the connection pool, the
/// options and the stats.
///
/// # Examples
///
/// ```no_run
/// use apify_client::{ApifyClient, OptionOverrides};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), apify_client::Error> {
/// let client = ApifyClient::builder()
///     .token("my-token")
///     .max_retries(3)
///     .min_delay_between_retries(Duration::from_millis(200))
///     .build()?;
///
/// // Calls with the client defaults
/// let actor = client.requester()?.get_actor("apify~web-scraper").await?;
///
/// // Calls with per-call overrides
/// let overrides = OptionOverrides::new().token("other-token");
/// let user = client
///     .invoke(&overrides, |api| async move { api.get_user(None).await })
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ApifyClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    options: RwLock<ClientOptions>,
    stats: Stats,
}

impl fmt::Debug for ApifyClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApifyClient")
            .field("options", &self.options())
            .field("stats", &self.stats())
            .finish()
    }
}

impl ApifyClient {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Creates a client with the given options.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(options: ClientOptions) -> Result<Self> {
        ClientBuilder::new().options(options).build()
    }

    /// Creates a client configured from `APIFY_TOKEN` and `APIFY_API_BASE_URL`.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but empty.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientOptions::from_env()?)
    }

    /// Returns a copy of the current client-wide options.
    pub fn options(&self) -> ClientOptions {
        self.inner
            .options
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Applies `overrides` to the client-wide options.
    ///
    /// Calls already in flight keep the options they started with. Applying
    /// the same overrides twice has the same effect as applying them once.
    pub fn set_options(&self, overrides: &OptionOverrides) {
        let mut options = self
            .inner
            .options
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        overrides.apply_to(&mut options);
        tracing::debug!(options = ?*options, "Client options updated");
    }

    /// Returns a snapshot of this client's request counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Returns a requester bound to the client-wide options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if the base URL is empty.
    pub fn requester(&self) -> Result<Requester> {
        self.requester_with(&OptionOverrides::default())
    }

    /// Returns a requester bound to the client-wide options merged with
    /// `overrides`. Overrides win on every field they set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if the merged base URL is empty.
    pub fn requester_with(&self, overrides: &OptionOverrides) -> Result<Requester> {
        let mut options = self.options().merged_with(overrides);
        if options.base_url.trim().is_empty() {
            return Err(Error::InvalidParameter(
                "Parameter \"baseUrl\" must be a non-empty string".to_string(),
            ));
        }
        options.base_url = options.base_url.trim_end_matches('/').to_string();

        Ok(Requester {
            inner: Arc::clone(&self.inner),
            options,
        })
    }

    /// Runs an endpoint function with merged options.
    ///
    /// `endpoint` receives a [`Requester`] holding the client defaults merged
    /// with `overrides`, and returns the future result of the call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] without calling `endpoint` if the
    /// merged base URL is empty; otherwise whatever `endpoint` returns.
    pub async fn invoke<T, F, Fut>(&self, overrides: &OptionOverrides, endpoint: F) -> Result<T>
    where
        F: FnOnce(Requester) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let requester = self.requester_with(overrides)?;
        endpoint(requester).await
    }

    /// Like [`invoke`](Self::invoke), but hands the settled result to
    /// `callback` instead of returning it.
    ///
    /// The callback is invoked exactly once, with the error or the value.
    pub async fn invoke_with_callback<T, F, Fut, C>(
        &self,
        overrides: &OptionOverrides,
        endpoint: F,
        callback: C,
    ) where
        F: FnOnce(Requester) -> Fut,
        Fut: Future<Output = Result<T>>,
        C: FnOnce(Result<T>),
    {
        callback(self.invoke(overrides, endpoint).await);
    }
}

/// A handle for executing calls with one fixed set of merged options.
///
/// Endpoint functions are implemented on this type.
#[derive(Clone)]
pub struct Requester {
    inner: Arc<ClientInner>,
    options: ClientOptions,
}

impl fmt::Debug for Requester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Requester")
            .field("options", &self.options)
            .finish()
    }
}

impl Requester {
    /// The merged options this requester uses.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Starts call options for `method path` from the merged options.
    pub fn request(&self, method: Method, path: impl Into<String>) -> CallOptions {
        CallOptions::new(&self.options, method, path)
    }

    /// Executes one logical call, retrying as its options allow.
    ///
    /// # Errors
    ///
    /// Returns the terminal error of the call, or
    /// [`Error::MaxRetriesExceeded`] if every attempt was retryable.
    pub async fn execute(&self, call: CallOptions) -> Result<ApiResponse> {
        executor::execute(&self.inner.http_client, &call, &self.inner.stats).await
    }
}

/// Builder for configuring and creating an [`ApifyClient`].
///
/// # Examples
///
/// ```no_run
/// use apify_client::ClientBuilder;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), apify_client::Error> {
/// let client = ClientBuilder::new()
///     .base_url("https://api.apify.com")?
///     .token("my-token")
///     .timeout(Duration::from_secs(30))
///     .retryable_status_codes([429, 409])
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ClientBuilder {
    options: ClientOptions,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all options at once.
    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the API base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        let url = url::Url::parse(url.as_ref())?;
        self.options.base_url = url.as_str().trim_end_matches('/').to_string();
        Ok(self)
    }

    /// Sets the API token.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.options.token = Some(token.into());
        self
    }

    /// Sets how many times a failed attempt is retried.
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.options.max_retries = max_retries;
        self
    }

    /// Sets the delay before the first retry.
    pub fn min_delay_between_retries(mut self, delay: Duration) -> Self {
        self.options.min_delay_between_retries = delay;
        self
    }

    /// Sets which status codes below 500 are retried.
    pub fn retryable_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.options.retryable_status_codes = codes.into_iter().collect();
        self
    }

    /// Sets the per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Enables random jitter on backoff delays.
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.options.jitter = jitter;
        self
    }

    /// Builds the configured `ApifyClient`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is empty or the HTTP client cannot be
    /// initialized.
    pub fn build(self) -> Result<ApifyClient> {
        if self.options.base_url.trim().is_empty() {
            return Err(Error::InvalidParameter(
                "Parameter \"baseUrl\" must be a non-empty string".to_string(),
            ));
        }

        // 3xx responses are classified like any other status, so never follow them
        let http_client = reqwest::Client::builder()
            .gzip(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::InvalidParameter(format!("Failed to build HTTP client: {}", e)))?;

        Ok(ApifyClient {
            inner: Arc::new(ClientInner {
                http_client,
                options: RwLock::new(self.options),
                stats: Stats::new(),
            }),
        })
    }
}
