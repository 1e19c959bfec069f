//! HTTP client configuration and building logic
//!
//! This module handles the configuration and construction of HTTP clients
//! for the range endpoint, together with the retry policy settings.

use std::time::Duration;

use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::{hibp, http, limits};
use crate::errors::{DownloadError, DownloadResult};

/// Retry policy for a single partition request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    /// First backoff interval
    #[serde(with = "humantime_serde")]
    pub initial_interval: Duration,
    /// Upper bound for a single backoff interval
    #[serde(with = "humantime_serde")]
    pub max_interval: Duration,
    /// Growth factor between intervals
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: limits::MAX_ATTEMPTS,
            initial_interval: limits::RETRY_INITIAL_INTERVAL,
            max_interval: limits::RETRY_MAX_INTERVAL,
            multiplier: limits::RETRY_MULTIPLIER,
        }
    }
}

impl RetryConfig {
    /// Exponential backoff schedule; the attempt cap is enforced by the fetcher
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_interval)
            .with_max_interval(self.max_interval)
            .with_multiplier(self.multiplier)
            .with_max_elapsed_time(None)
            .build()
    }
}

/// Configuration for the range API client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Endpoint that partition keys are appended to
    pub base_url: String,
    /// User agent sent with every request
    pub user_agent: String,
    /// TCP keep-alive settings
    #[serde(with = "humantime_serde")]
    pub tcp_keepalive: Option<Duration>,
    /// TCP nodelay (disable Nagle's algorithm)
    pub tcp_nodelay: bool,
    /// Connection pool idle timeout
    #[serde(with = "humantime_serde")]
    pub pool_idle_timeout: Option<Duration>,
    /// Maximum idle connections per host; raised to the parallelism when lower
    pub pool_max_per_host: usize,
    /// Overall request timeout, body included
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Connect timeout
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Retry policy
    pub retry: RetryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: hibp::BASE_URL.to_string(),
            user_agent: http::USER_AGENT.to_string(),
            tcp_keepalive: Some(Duration::from_secs(30)),
            tcp_nodelay: true,
            pool_idle_timeout: Some(http::POOL_IDLE_TIMEOUT),
            pool_max_per_host: 0,
            request_timeout: http::DEFAULT_TIMEOUT,
            connect_timeout: http::CONNECT_TIMEOUT,
            retry: RetryConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Point the client at another endpoint (mirrors, tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Replace the retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Make sure the pool can hold one idle connection per worker
    pub fn with_pool_for_parallelism(mut self, parallelism: usize) -> Self {
        self.pool_max_per_host = self.pool_max_per_host.max(parallelism);
        self
    }

    /// Parse the base URL, forcing a trailing slash so keys append as a path segment
    pub fn parsed_base_url(&self) -> DownloadResult<Url> {
        let mut raw = self.base_url.clone();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw).map_err(|e| DownloadError::InvalidUrl {
            url: self.base_url.clone(),
            error: e.to_string(),
        })
    }

    /// Builds the HTTP client with the specified configuration
    pub fn build_http_client(&self) -> DownloadResult<Client> {
        let mut client_builder = Client::builder()
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(self.user_agent.as_str())
            .tcp_nodelay(self.tcp_nodelay)
            .pool_max_idle_per_host(self.pool_max_per_host);

        if let Some(keepalive) = self.tcp_keepalive {
            client_builder = client_builder.tcp_keepalive(keepalive);
        }

        if let Some(idle_timeout) = self.pool_idle_timeout {
            client_builder = client_builder.pool_idle_timeout(idle_timeout);
        }

        client_builder.build().map_err(DownloadError::Http)
    }
}
