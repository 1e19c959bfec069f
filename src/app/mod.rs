//! Core application logic for HIBP Fetcher
//!
//! This module contains the range API client, the partition model, the on-disk
//! partition store, the worker pool and its coordinator, and the final merge.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hibp_fetcher::app::{
//!     Consolidator, Coordinator, CoordinatorConfig, DownloadTarget, RangeClient, TargetMode,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let target = DownloadTarget::new("hibp-passwords.txt", TargetMode::SingleFile);
//! target.prepare(true, false).await?;
//!
//! let client = Arc::new(RangeClient::new()?);
//! let coordinator = Coordinator::new(CoordinatorConfig::default(), client, target.clone());
//! let result = coordinator.run_downloads().await?;
//!
//! Consolidator::new(target.partition_dir(), target.output())
//!     .consolidate()
//!     .await?;
//! println!("{}", result.report());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod consolidate;
pub mod coordinator;
pub mod models;
pub mod queue;
pub mod worker;

// Re-export main public API
pub use cache::{DownloadTarget, ResumeGuard, ResumeStatus, TargetMode};
pub use client::{ClientConfig, RangeClient, RetryConfig};
pub use consolidate::{ConsolidationSummary, Consolidator};
pub use coordinator::{
    Coordinator, CoordinatorConfig, FailurePolicy, FetchStats, NoopProgress, ProgressSink,
    SessionResult, StatsSnapshot,
};
pub use models::{to_key, HashMode, JobOutcome, LineFormat, Partition, PartitionRange};
pub use queue::PartitionQueue;
pub use worker::WorkerPool;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_structure() {
        // Ensure public API is accessible
        let config = ClientConfig::default();
        assert!(config.tcp_nodelay);
        assert!(CoordinatorConfig::default().partitions.is_full());
    }
}
