//! On-disk partition store: resume checks and output layout
//!
//! - [`path`] - where partition files live for each run mode, and preparing that
//!   location before any network activity
//!
//! The resume guard here decides whether a partition still needs downloading.
//! A partition counts as complete when its file exists and is non-empty. This is
//! a size heuristic, not a checksum: a truncated but non-empty file left by a
//! crash is indistinguishable from a complete one. Files are only ever promoted
//! to their final name by an atomic rename, which keeps that case rare.

pub mod path;

pub use path::{DownloadTarget, TargetMode};

use std::path::Path;

use tracing::debug;

/// Result of checking a partition's destination before fetching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeStatus {
    /// A non-empty file is present; skip the network
    AlreadyComplete,
    /// Missing or empty; fetch it
    NeedsDownload,
}

/// Decides which partitions can be skipped on a resumed run
#[derive(Debug, Clone, Copy)]
pub struct ResumeGuard {
    enabled: bool,
}

impl ResumeGuard {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Check a destination path
    ///
    /// Always reports `NeedsDownload` when resume is disabled, so existing files
    /// are overwritten.
    pub async fn check(&self, destination: &Path) -> ResumeStatus {
        if !self.enabled {
            return ResumeStatus::NeedsDownload;
        }

        match tokio::fs::metadata(destination).await {
            Ok(metadata) if metadata.is_file() && metadata.len() > 0 => {
                debug!("Resuming past complete {}", destination.display());
                ResumeStatus::AlreadyComplete
            }
            _ => ResumeStatus::NeedsDownload,
        }
    }
}
