//! Download statistics tracking and aggregation
//!
//! This module holds the shared, lock-free counters that every worker updates
//! while the run is in flight, the immutable snapshot taken from them, and the
//! final session result handed back to the CLI.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::models::JobOutcome;
use crate::constants::hibp;
use crate::errors::{DownloadError, DownloadResult};

/// Shared counters updated concurrently by all workers
///
/// One instance is owned by a run and handed to every worker behind an `Arc`.
/// All updates are single atomic increments, so `cache_hits + cache_misses ==
/// requests` holds whenever no worker is between the two increments of
/// [`FetchStats::record_response`].
#[derive(Debug, Default)]
pub struct FetchStats {
    requests: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    request_time_ms: AtomicU64,
    completed: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

impl FetchStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count an accepted response and classify its edge cache status
    pub fn record_response(&self, cache_status: Option<&str>) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if is_cache_hit(cache_status) {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cache_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Add the wall-clock time of one whole retry sequence
    pub fn record_latency(&self, elapsed: Duration) {
        let millis = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.request_time_ms.fetch_add(millis, Ordering::Relaxed);
    }

    /// Count a finished partition by outcome
    pub fn record_outcome(&self, outcome: JobOutcome) {
        let counter = match outcome {
            JobOutcome::Completed => &self.completed,
            JobOutcome::Skipped => &self.skipped,
            JobOutcome::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            request_time_ms: self.request_time_ms.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

fn is_cache_hit(cache_status: Option<&str>) -> bool {
    cache_status.is_some_and(|status| status.trim().eq_ignore_ascii_case(hibp::CACHE_HIT))
}

/// Immutable copy of [`FetchStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Accepted responses (one per fetched partition)
    pub requests: u64,
    /// Responses served from the edge cache
    pub cache_hits: u64,
    /// Responses fetched from origin or with no cache status
    pub cache_misses: u64,
    /// Cumulative request time across partitions
    pub request_time_ms: u64,
    /// Partitions fetched over the network
    pub completed: u64,
    /// Partitions resumed from disk
    pub skipped: u64,
    /// Partitions that failed
    pub failed: u64,
}

impl StatsSnapshot {
    /// Cache hit rate in whole percent
    pub fn hit_rate(&self) -> Option<u64> {
        (self.requests > 0).then(|| self.cache_hits * 100 / self.requests)
    }

    /// Mean request time in milliseconds
    pub fn average_request_time_ms(&self) -> Option<u64> {
        (self.requests > 0).then(|| self.request_time_ms / self.requests)
    }

    /// Partitions that reached any outcome
    pub fn total_processed(&self) -> u64 {
        self.completed + self.skipped + self.failed
    }
}

/// Final result of a download session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResult {
    /// Final counters
    pub stats: StatsSnapshot,
    /// Partitions the run was asked to cover
    pub total_partitions: u64,
    /// When the run started
    pub session_start: DateTime<Utc>,
    /// Time taken for the entire session
    pub total_duration: Duration,
}

impl SessionResult {
    /// True when every partition was either fetched or resumed
    pub fn is_complete(&self) -> bool {
        self.stats.failed == 0
            && self.stats.completed + self.stats.skipped == self.total_partitions
    }

    /// Turn failed partitions into an error
    ///
    /// # Errors
    ///
    /// Returns `DownloadError::PartitionsFailed` when any partition failed.
    pub fn ensure_complete(&self) -> DownloadResult<()> {
        match self.stats.failed {
            0 => Ok(()),
            failed => Err(DownloadError::PartitionsFailed { failed }),
        }
    }

    /// One-line outcome for logs
    pub fn summary(&self) -> String {
        format!(
            "{} fetched, {} resumed, {} failed of {} partitions in {}",
            self.stats.completed,
            self.stats.skipped,
            self.stats.failed,
            self.total_partitions,
            format_duration(self.total_duration)
        )
    }

    /// Multi-line report printed after a run
    pub fn report(&self) -> String {
        let stats = &self.stats;
        let mut lines = vec![
            format!("Cloudflare requests:             {}", stats.requests),
            format!("Cloudflare hits:                 {}", stats.cache_hits),
            format!("Cloudflare misses:               {}", stats.cache_misses),
        ];
        if let Some(rate) = stats.hit_rate() {
            lines.push(format!("Cloudflare hit rate:             {} %", rate));
        }
        lines.push(format!(
            "Cloudflare request time total:   {} ms",
            stats.request_time_ms
        ));
        if let Some(average) = stats.average_request_time_ms() {
            lines.push(format!("Cloudflare request time average: {} ms", average));
        }
        lines.push(format!("Partitions:                      {}", self.summary()));
        lines.join("\n")
    }
}

/// Format a duration as human-readable string
pub(crate) fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();

    if total_secs < 60 {
        format!("{}s", total_secs)
    } else if total_secs < 3600 {
        format!("{}m{}s", total_secs / 60, total_secs % 60)
    } else {
        format!("{}h{}m", total_secs / 3600, (total_secs % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_cache_status_classification() {
        let stats = FetchStats::new();
        stats.record_response(Some("HIT"));
        stats.record_response(Some("hit"));
        stats.record_response(Some("MISS"));
        stats.record_response(Some("DYNAMIC"));
        stats.record_response(None);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.requests, 5);
        assert_eq!(snapshot.cache_hits, 2);
        assert_eq!(snapshot.cache_misses, 3);
        assert_eq!(snapshot.hit_rate(), Some(40));
    }

    /// Hits and misses always add up to requests once all writers are done
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_keep_invariant() {
        let stats = Arc::new(FetchStats::new());
        let mut handles = Vec::new();
        for worker in 0..8u64 {
            let stats = stats.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..1000u64 {
                    let status = if (worker + i) % 3 == 0 { "HIT" } else { "MISS" };
                    stats.record_response(Some(status));
                    stats.record_latency(Duration::from_millis(1));
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.requests, 8000);
        assert_eq!(snapshot.cache_hits + snapshot.cache_misses, snapshot.requests);
        assert_eq!(snapshot.request_time_ms, 8000);
        assert_eq!(snapshot.average_request_time_ms(), Some(1));
    }

    #[test]
    fn test_empty_snapshot_has_no_rates() {
        let snapshot = FetchStats::new().snapshot();
        assert_eq!(snapshot.hit_rate(), None);
        assert_eq!(snapshot.average_request_time_ms(), None);
    }

    #[test]
    fn test_outcomes_and_completeness() {
        let stats = FetchStats::new();
        stats.record_outcome(JobOutcome::Completed);
        stats.record_outcome(JobOutcome::Completed);
        stats.record_outcome(JobOutcome::Skipped);

        let result = SessionResult {
            stats: stats.snapshot(),
            total_partitions: 3,
            session_start: Utc::now(),
            total_duration: Duration::from_secs(90),
        };
        assert!(result.is_complete());
        assert_eq!(result.stats.total_processed(), 3);
        assert!(result.summary().contains("2 fetched, 1 resumed, 0 failed of 3"));

        stats.record_outcome(JobOutcome::Failed);
        let result = SessionResult {
            stats: stats.snapshot(),
            ..result
        };
        assert!(!result.is_complete());
        assert_eq!(stats.failed(), 1);
        assert!(matches!(
            result.ensure_complete(),
            Err(DownloadError::PartitionsFailed { failed: 1 })
        ));
    }

    #[test]
    fn test_report_lines() {
        let result = SessionResult {
            stats: StatsSnapshot {
                requests: 4,
                cache_hits: 3,
                cache_misses: 1,
                request_time_ms: 400,
                completed: 4,
                ..Default::default()
            },
            total_partitions: 4,
            session_start: Utc::now(),
            total_duration: Duration::from_secs(5),
        };
        let report = result.report();
        assert!(report.contains("Cloudflare hit rate:             75 %"));
        assert!(report.contains("Cloudflare request time average: 100 ms"));
    }

    #[test]
    fn test_duration_formatting() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m30s");
        assert_eq!(format_duration(Duration::from_secs(3665)), "1h1m");
    }
}
