//! Rate limiting and retry logic for media server calls
//!
//! Library listings on large servers are heavy, and collection edits fan out
//! into one request per item on removal, so every request goes through a
//! shared limiter. Transient failures (429, 408, 5xx, transport errors) are
//! retried with exponential backoff; anything else fails immediately.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use reqwest::{Client, Method, Response};
use tracing::{debug, warn};

/// Configuration for rate limiting
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per second
    pub requests_per_second: u32,
    /// Burst capacity (allows short bursts above the rate)
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 10,
            burst_size: 20,
        }
    }
}

/// A rate-limited HTTP client that attaches fixed headers to every request
pub struct RateLimitedClient {
    client: Client,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    default_headers: Vec<(String, String)>,
    name: String,
}

impl RateLimitedClient {
    pub fn new(name: &str, config: RateLimitConfig, timeout: Duration) -> Result<Self> {
        let quota = Quota::per_second(
            NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN),
        )
        .allow_burst(NonZeroU32::new(config.burst_size).unwrap_or(NonZeroU32::MIN));

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            limiter: Arc::new(RateLimiter::direct(quota)),
            default_headers: Vec::new(),
            name: name.to_string(),
        })
    }

    /// Client tuned for a self-hosted media server on the local network
    pub fn for_media_server(timeout: Duration) -> Result<Self> {
        Self::new(
            "media_server",
            RateLimitConfig {
                requests_per_second: 10,
                burst_size: 20,
            },
            timeout,
        )
    }

    /// Header sent with every request (auth token, accept type)
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.default_headers.push((key.to_string(), value.to_string()));
        self
    }

    /// Wait for a permit and send a request
    pub async fn request<Q: serde::Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        query: &Q,
    ) -> Result<Response> {
        self.wait_for_permit().await;
        debug!(client = %self.name, method = %method, url = %url, "Making rate-limited request");

        let mut request = self.client.request(method, url);
        for (key, value) in &self.default_headers {
            request = request.header(key.as_str(), value.as_str());
        }
        request
            .query(query)
            .send()
            .await
            .context("HTTP request failed")
    }

    /// Wait for a rate limit permit
    pub async fn wait_for_permit(&self) {
        self.limiter.until_ready().await;
    }
}

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_retries: u32,
    /// Initial backoff duration
    pub initial_interval: Duration,
    /// Maximum backoff duration
    pub max_interval: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create an ExponentialBackoff from this config
    pub fn to_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            multiplier: self.multiplier,
            max_elapsed_time: Some(Duration::from_secs(120)),
            ..Default::default()
        }
    }
}

/// Execute an async operation, retrying only errors marked transient
pub async fn retry_async<T, E, Fut, F>(
    operation: F,
    config: &RetryConfig,
    operation_name: &str,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, backoff::Error<E>>>,
    E: std::fmt::Display,
{
    let mut attempts = 0;
    let mut backoff = config.to_backoff();

    loop {
        attempts += 1;
        let err = match operation().await {
            Ok(result) => return Ok(result),
            Err(backoff::Error::Permanent(e)) => return Err(e),
            Err(backoff::Error::Transient { err, .. }) => err,
        };

        if attempts >= config.max_retries {
            warn!(
                operation = %operation_name,
                attempts = attempts,
                error = %err,
                "Operation failed after max retries"
            );
            return Err(err);
        }

        let Some(duration) = backoff.next_backoff() else {
            return Err(err);
        };
        warn!(
            operation = %operation_name,
            attempt = attempts,
            error = %err,
            retry_in_ms = duration.as_millis() as u64,
            "Operation failed, retrying"
        );
        tokio::time::sleep(duration).await;
    }
}

/// 429 (rate limit), 408 (timeout) and 5xx are worth retrying
pub fn is_transient_status(status: u16) -> bool {
    status == 429 || status == 408 || (500..600).contains(&status)
}
