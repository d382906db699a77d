//! Outbound HTTP for connectors
//!
//! Every connector owns one [`HttpClient`]. The client carries the
//! source's cookies and headers, spaces requests with a [`RateLimiter`],
//! and retries transient failures with exponential backoff.

mod client;
mod error;
mod rate_limit;

pub use client::{header_map, FetchedResponse, HttpClient};
pub use error::{is_retryable_status, FetchError};
pub use rate_limit::{time_until_next_request, RateLimiter};
