//! Error types for HIBP Fetcher
//!
//! This module defines the error types for all components of the application.
//! Errors are designed to be actionable and provide clear context for debugging and
//! user feedback.

use std::path::PathBuf;
use thiserror::Error;

/// Fetch, decode and write errors for a single partition, and run-level failures
#[derive(Error, Debug)]
pub enum DownloadError {
    /// HTTP request error (connection, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with something other than 200
    #[error("unexpected HTTP status: {status}")]
    UnexpectedStatus { status: u16 },

    /// Invalid URL built for a partition
    #[error("Invalid URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },

    /// The run was cancelled before or during this request
    #[error("Download cancelled")]
    Cancelled,

    /// All attempts used up on retryable errors
    #[error("Maximum attempts ({attempts}) exceeded for partition {key}: {last_error}")]
    MaxRetriesExceeded {
        key: String,
        attempts: u32,
        last_error: Box<DownloadError>,
    },

    /// Body read, brotli decode, or temp file write failed for a partition
    #[error("Failed to stream partition {key} to disk: {source}")]
    Stream {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Atomic file operation failed
    #[error("Atomic file operation failed: could not rename {temp_path} to {final_path}")]
    AtomicOperationFailed {
        temp_path: PathBuf,
        final_path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Blocking decode task or worker task died
    #[error("Worker task failed: {reason}")]
    TaskFailed { reason: String },

    /// Run configuration rejected before any worker started
    #[error("Invalid run configuration: {reason}")]
    InvalidConfiguration { reason: String },

    /// Some partitions failed under the continue policy
    #[error("{failed} partition(s) failed to download")]
    PartitionsFailed { failed: u64 },
}

impl DownloadError {
    /// Whether another attempt could succeed
    ///
    /// HTTP 429 and 5xx responses and transport errors are transient. Everything
    /// else, including request construction failures, is terminal.
    pub fn is_retryable(&self) -> bool {
        match self {
            DownloadError::UnexpectedStatus { status } => *status == 429 || *status >= 500,
            DownloadError::Http(e) => !e.is_builder() && !e.is_redirect(),
            _ => false,
        }
    }
}

/// Output location conflicts detected before any network activity
#[derive(Error, Debug)]
pub enum TargetError {
    /// Consolidated output already present
    #[error("output file {path} already exists. Use -o if you want to overwrite it")]
    OutputExists { path: PathBuf },

    /// Multi-file output path is a regular file
    #[error("output path {path} exists and is not a directory")]
    NotADirectory { path: PathBuf },

    /// Multi-file output folder has content and neither resume nor overwrite was asked
    #[error("output folder {path} already exists and is not empty. Use -o if you want to overwrite it")]
    DirectoryNotEmpty { path: PathBuf },

    /// Filesystem error while preparing the target
    #[error("Failed to prepare {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from merging partition files into the consolidated output
#[derive(Error, Debug)]
pub enum ConsolidationError {
    /// Partition directory could not be listed
    #[error("Failed to read partition directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Merged output could not be created
    #[error("Failed to create output file {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Partition file could not be opened
    #[error("Failed to open partition file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Copy into the merged output failed
    #[error("Failed to copy {path} into the output: {source}")]
    Copy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Finishing the merged output failed
    #[error("Failed to finalize output file {path}: {source}")]
    Finalize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Removing merged partition files failed
    #[error("Failed to clean up {path}: {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("Failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration format
    #[error("Invalid configuration format in {path}: {source}")]
    InvalidFormat {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Download error
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Output target error
    #[error(transparent)]
    Target(#[from] TargetError),

    /// Consolidation error
    #[error(transparent)]
    Consolidation(#[from] ConsolidationError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AppError {
    /// Check if the error is recoverable (transient)
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Download(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Download(_) => "download",
            AppError::Target(_) => "target",
            AppError::Consolidation(_) => "consolidation",
            AppError::Config(_) => "config",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Download result type alias
pub type DownloadResult<T> = std::result::Result<T, DownloadError>;

/// Target result type alias
pub type TargetResult<T> = std::result::Result<T, TargetError>;

/// Consolidation result type alias
pub type ConsolidationResult<T> = std::result::Result<T, ConsolidationError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
