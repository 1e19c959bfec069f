//! Core HTTP operations with classified retry logic
//!
//! This module issues the range request for a single partition. Retries use
//! exponential backoff from the `backoff` crate; every failure is classified as
//! transient (retried) or permanent (returned at once), and the run's
//! cancellation token interrupts both requests and the waits between them.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use reqwest::header::{ACCEPT_ENCODING, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use super::config::RetryConfig;
use crate::app::coordinator::FetchStats;
use crate::app::models::{HashMode, Partition};
use crate::constants::hibp;
use crate::errors::{DownloadError, DownloadResult};

/// HTTP operations handler for the range endpoint
#[derive(Debug)]
pub struct HttpHandler {
    client: Client,
    base_url: Url,
    retry: RetryConfig,
}

impl HttpHandler {
    /// Creates a new HttpHandler
    ///
    /// `base_url` must end with a slash so that partition keys join as the last
    /// path segment.
    pub fn new(client: Client, base_url: Url, retry: RetryConfig) -> Self {
        Self {
            client,
            base_url,
            retry,
        }
    }

    /// Range URL for a partition, with `?mode=ntlm` for NTLM hashes
    pub fn range_url(&self, partition: Partition, mode: HashMode) -> DownloadResult<Url> {
        let key = partition.key();
        let mut url = self
            .base_url
            .join(&key)
            .map_err(|e| DownloadError::InvalidUrl {
                url: format!("{}{}", self.base_url, key),
                error: e.to_string(),
            })?;
        if mode == HashMode::Ntlm {
            url.set_query(Some(hibp::NTLM_QUERY));
        }
        Ok(url)
    }

    /// Fetches a partition's compressed body, retrying transient failures
    ///
    /// On success the returned response has status 200 and an unread body. The
    /// accepted response is counted in `stats` and classified by its
    /// `Cf-Cache-Status` header. The elapsed time of the whole retry sequence is
    /// always added to `stats`, whether or not the fetch succeeded.
    ///
    /// # Errors
    ///
    /// - `DownloadError::Cancelled` if `cancel` fires before or during an attempt,
    ///   or while waiting to retry
    /// - `DownloadError::UnexpectedStatus` for a non-retryable status such as 404
    /// - `DownloadError::MaxRetriesExceeded` once all attempts hit transient errors
    pub async fn fetch_partition(
        &self,
        partition: Partition,
        mode: HashMode,
        stats: &FetchStats,
        cancel: &CancellationToken,
    ) -> DownloadResult<Response> {
        let url = self.range_url(partition, mode)?;
        let key = partition.key();
        let attempts = AtomicU32::new(0);
        let max_attempts = self.retry.max_attempts.max(1);

        let start = Instant::now();
        let retries = backoff::future::retry_notify(
            self.retry.backoff(),
            || {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                self.attempt(&url, &key, attempt, max_attempts, cancel)
            },
            |error: DownloadError, wait: Duration| {
                warn!(
                    "Retrying request for {} after error (attempt {}/{}): {}. Waiting {}ms",
                    key,
                    attempts.load(Ordering::SeqCst),
                    max_attempts,
                    error,
                    wait.as_millis()
                );
            },
        );
        // The backoff sleep between attempts must not outlive a cancelled run
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DownloadError::Cancelled),
            result = retries => result,
        };
        stats.record_latency(start.elapsed());

        let response = result?;
        let cache_status = response
            .headers()
            .get(hibp::CACHE_STATUS_HEADER)
            .and_then(|value| value.to_str().ok());
        stats.record_response(cache_status);

        debug!(
            "Fetched {} in {} attempt(s), cache status {:?}",
            key,
            attempts.load(Ordering::SeqCst),
            cache_status
        );
        Ok(response)
    }

    /// One request, classified for the retry loop
    async fn attempt(
        &self,
        url: &Url,
        key: &str,
        attempt: u32,
        max_attempts: u32,
        cancel: &CancellationToken,
    ) -> Result<Response, backoff::Error<DownloadError>> {
        if cancel.is_cancelled() {
            return Err(backoff::Error::permanent(DownloadError::Cancelled));
        }

        let request = self
            .client
            .get(url.clone())
            .header(ACCEPT_ENCODING, hibp::ACCEPT_ENCODING)
            .build()
            .map_err(|e| backoff::Error::permanent(DownloadError::Http(e)))?;

        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(backoff::Error::permanent(DownloadError::Cancelled));
            }
            sent = self.client.execute(request) => sent,
        };

        let (error, retry_after) = match sent {
            Ok(response) if response.status() == StatusCode::OK => return Ok(response),
            Ok(response) => (
                DownloadError::UnexpectedStatus {
                    status: response.status().as_u16(),
                },
                self.retry_after(&response),
            ),
            Err(e) => (DownloadError::Http(e), None),
        };

        if !error.is_retryable() {
            return Err(backoff::Error::permanent(error));
        }
        if attempt >= max_attempts {
            return Err(backoff::Error::permanent(
                DownloadError::MaxRetriesExceeded {
                    key: key.to_string(),
                    attempts: attempt,
                    last_error: Box::new(error),
                },
            ));
        }

        Err(match retry_after {
            Some(wait) => backoff::Error::retry_after(error, wait),
            None => backoff::Error::transient(error),
        })
    }

    /// Server-requested delay in whole seconds, capped at the max backoff interval
    fn retry_after(&self, response: &Response) -> Option<Duration> {
        let seconds: u64 = response
            .headers()
            .get(RETRY_AFTER)?
            .to_str()
            .ok()?
            .trim()
            .parse()
            .ok()?;
        Some(Duration::from_secs(seconds).min(self.retry.max_interval))
    }
}
