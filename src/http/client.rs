//! Retrying HTTP client shared by all connectors

use crate::config::HttpConfig;
use crate::http::error::FetchError;
use crate::http::rate_limit::RateLimiter;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// A successful response with its body fully read
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    /// URL after redirects
    pub final_url: String,
    pub status: u16,
    /// Content-Type header value, empty when absent
    pub content_type: String,
    pub body: Vec<u8>,
}

impl FetchedResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_image(&self) -> bool {
        self.content_type
            .trim()
            .to_ascii_lowercase()
            .starts_with("image/")
    }
}

/// HTTP client with retry, backoff, cookies and a politeness delay
///
/// Cloning is cheap and clones share the cookie jar and rate limiter.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    jar: Arc<Jar>,
    limiter: Arc<RateLimiter>,
    max_retries: u32,
    retry_base_delay: Duration,
    probe_timeout: Duration,
}

impl HttpClient {
    /// Builds a client with browser-like default headers
    pub fn new(config: &HttpConfig) -> Result<Self, FetchError> {
        Self::with_headers(config, HeaderMap::new())
    }

    /// Builds a client whose every request also carries `extra_headers`
    ///
    /// # Arguments
    ///
    /// * `config` - Timeouts, retry policy and user agent
    /// * `extra_headers` - Source-specific headers, overriding the browser defaults
    pub fn with_headers(config: &HttpConfig, extra_headers: HeaderMap) -> Result<Self, FetchError> {
        let mut headers = browser_headers();
        headers.extend(extra_headers);

        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .cookie_provider(Arc::clone(&jar))
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| FetchError::Build(e.to_string()))?;

        Ok(Self {
            client,
            jar,
            limiter: Arc::new(RateLimiter::new(Duration::from_millis(
                config.request_delay_ms,
            ))),
            max_retries: config.max_retries,
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
            probe_timeout: Duration::from_secs(config.probe_timeout_secs),
        })
    }

    /// Stores a cookie (in `Set-Cookie` syntax) for the given URL
    pub fn add_cookie(&self, cookie: &str, url: &str) -> Result<(), FetchError> {
        let parsed = Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
        self.jar.add_cookie_str(cookie, &parsed);
        Ok(())
    }

    /// Fetches a URL, retrying timeouts, connection failures, 429 and 5xx
    ///
    /// Each attempt waits for the rate limiter. Retry `n` (0-based) sleeps
    /// `retry_base_delay * 2^n` first.
    pub async fn fetch(
        &self,
        url: &str,
        headers: Option<&HeaderMap>,
    ) -> Result<FetchedResponse, FetchError> {
        let mut attempt = 0;
        loop {
            self.limiter.acquire().await;

            match self.send_once(url, headers).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    let delay = self.retry_delay(attempt);
                    tracing::warn!(
                        "Request to {} failed (attempt {}/{}): {}, retrying in {:?}",
                        url,
                        attempt + 1,
                        self.max_retries + 1,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        Ok(self.fetch(url, None).await?.text())
    }

    /// Fetches and deserializes a JSON document
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let response = self.fetch(url, None).await?;
        serde_json::from_slice(&response.body).map_err(|e| FetchError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    /// Existence probe: a single HEAD request with the short probe timeout
    ///
    /// Any transport failure or non-success status counts as absent. Probes
    /// skip the politeness delay and are never retried.
    pub async fn exists(&self, url: &str) -> bool {
        match self
            .client
            .head(url)
            .timeout(self.probe_timeout)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("Probe of {} failed: {}", url, e);
                false
            }
        }
    }

    async fn send_once(
        &self,
        url: &str,
        headers: Option<&HeaderMap>,
    ) -> Result<FetchedResponse, FetchError> {
        let mut request = self.client.get(url);
        if let Some(headers) = headers {
            request = request.headers(headers.clone());
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body = response.bytes().await.map_err(|e| FetchError::Body {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        Ok(FetchedResponse {
            final_url,
            status: status.as_u16(),
            content_type,
            body: body.to_vec(),
        })
    }

    fn retry_delay(&self, attempt: u32) -> Duration {
        self.retry_base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers
}

/// Builds a header map from static name/value pairs, skipping invalid values
pub fn header_map(pairs: &[(&'static str, String)]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                headers.insert(*name, value);
            }
            Err(_) => tracing::warn!("Skipping invalid value for header {}", name),
        }
    }
    headers
}
