//! # apify-client - An async client for the Apify API
//!
//! Maps Apify REST endpoints onto method calls and takes care of the HTTP
//! plumbing around them: token injection, retries with exponential backoff,
//! error classification and response normalization.
//!
//! ## Quick Start
//!
//! ```no_run
//! use apify_client::{ApifyClient, ListOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), apify_client::Error> {
//!     let client = ApifyClient::builder().token("my-token").build()?;
//!     let api = client.requester()?;
//!
//!     let actors = api
//!         .list_actors(&ListOptions {
//!             limit: Some(10),
//!             desc: Some(true),
//!             ..Default::default()
//!         })
//!         .await?;
//!     println!("{} of {} actors", actors.count, actors.total);
//!
//!     match api.get_actor("apify~web-scraper").await? {
//!         Some(actor) => println!("Found {}", actor["name"]),
//!         None => println!("No such actor"),
//!     }
//!
//!     println!("Requests so far: {}", client.stats().requests);
//!     Ok(())
//! }
//! ```
//!
//! ## Retries
//!
//! Each attempt is classified as a success, a retryable failure or a terminal
//! failure:
//!
//! - transport errors, unparseable JSON bodies, 5xx responses and statuses in
//!   the retryable set (default `{429}`) are retried after
//!   `min_delay_between_retries * 2^(attempt - 1)`;
//! - other 3xx/4xx responses fail immediately;
//! - once `max_retries` retries are used up the last failure is returned inside
//!   [`Error::MaxRetriesExceeded`].
//!
//! ## Custom endpoints
//!
//! Endpoints not covered by [`Requester`] can be called through the same
//! machinery:
//!
//! ```no_run
//! use apify_client::{ApifyClient, OptionOverrides};
//! use http::Method;
//!
//! # async fn example() -> Result<(), apify_client::Error> {
//! let client = ApifyClient::builder().token("my-token").build()?;
//!
//! let run = client
//!     .invoke(&OptionOverrides::new().max_retries(2), |api| async move {
//!         let call = api.request(Method::POST, "/v2/acts/apify~hello-world/runs");
//!         Ok(api.execute(call).await?.into_data())
//!     })
//!     .await?;
//! println!("Started run {}", run["id"]);
//! # Ok(())
//! # }
//! ```

pub mod call_options;
mod client;
mod config;
mod endpoints;
mod error;
pub mod executor;
pub mod normalize;
pub mod pagination;
mod response;
pub mod retry;
mod stats;

pub use call_options::{CallOptions, QueryParams, RequestBody};
pub use client::{ApifyClient, ClientBuilder, Requester};
pub use config::{ClientOptions, OptionOverrides, DEFAULT_BASE_URL};
pub use endpoints::{DatasetFormat, DatasetItemsOptions, KeyValueRecord, ListOptions};
pub use error::{Error, ErrorDetails, ErrorKind, Result, NOT_FOUND_STATUS, RATE_LIMIT_STATUS};
pub use pagination::{PaginationList, PaginationMeta};
pub use response::{ApiResponse, ResponseBody};
pub use retry::{BackoffPolicy, Outcome};
pub use stats::{Stats, StatsSnapshot};
