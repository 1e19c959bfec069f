//! HTTP client for the Have I Been Pwned range API
//!
//! The module is organized into specialized components:
//! - `config`: HTTP client and retry configuration
//! - `http`: the retrying partition fetcher with transient/terminal classification
//! - `download`: streamed brotli decoding with atomic writes

use std::path::Path;

use tokio_util::sync::CancellationToken;
use url::Url;

use crate::app::coordinator::FetchStats;
use crate::app::models::{HashMode, LineFormat, Partition};
use crate::errors::DownloadResult;

// Module declarations
pub mod config;
pub mod download;
pub mod http;

pub use config::{ClientConfig, RetryConfig};
pub use download::{temp_path_for, DownloadHandler};

use http::HttpHandler;

/// Client for downloading password hash ranges
///
/// Cheap to share behind an `Arc`; the inner reqwest client pools connections
/// across all workers.
#[derive(Debug)]
pub struct RangeClient {
    http_handler: HttpHandler,
}

impl RangeClient {
    /// Creates a client against the public range API with default settings
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if HTTP client creation fails
    pub fn new() -> DownloadResult<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Creates a client with custom configuration
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if the base URL is invalid or HTTP client creation fails
    pub fn with_config(config: ClientConfig) -> DownloadResult<Self> {
        let client = config.build_http_client()?;
        let base_url = config.parsed_base_url()?;
        tracing::info!(
            "Created range client for {} (pool {} per host, {} attempts)",
            base_url,
            config.pool_max_per_host,
            config.retry.max_attempts
        );

        Ok(Self {
            http_handler: HttpHandler::new(client, base_url, config.retry),
        })
    }

    /// Fetch a partition and stream it to `destination`
    ///
    /// The request is retried according to the retry policy; the body is decoded
    /// into a temp file and renamed into place. Returns the decoded byte count.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` for terminal or retry-exhausted fetch failures and
    /// for any decode or write failure.
    pub async fn download_partition(
        &self,
        partition: Partition,
        mode: HashMode,
        destination: &Path,
        format: LineFormat,
        stats: &FetchStats,
        cancel: &CancellationToken,
    ) -> DownloadResult<u64> {
        let response = self
            .http_handler
            .fetch_partition(partition, mode, stats, cancel)
            .await?;
        DownloadHandler::write_partition(response.bytes_stream(), partition, destination, format)
            .await
    }

    /// Range URL a partition would be fetched from
    pub fn range_url(&self, partition: Partition, mode: HashMode) -> DownloadResult<Url> {
        self.http_handler.range_url(partition, mode)
    }
}
