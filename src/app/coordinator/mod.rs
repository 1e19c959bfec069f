//! Download orchestration
//!
//! The coordinator is the control plane of a run. It builds the shared partition
//! queue and worker context, installs the interrupt handler, drives the worker
//! pool to completion, and hands a [`SessionResult`] back to the CLI.
//!
//! # Architecture
//!
//! - [`config`] - run configuration and the failure policy
//! - [`stats`] - atomic fetch counters and the session result
//! - [`progress`] - the progress sink seam
//! - [`signals`] - CTRL-C handling
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hibp_fetcher::app::{Coordinator, CoordinatorConfig, DownloadTarget, RangeClient, TargetMode};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(RangeClient::new()?);
//! let target = DownloadTarget::new("ranges", TargetMode::MultiFile);
//! target.prepare(false, false).await?;
//!
//! let config = CoordinatorConfig::default().with_parallelism(16);
//! let result = Coordinator::new(config, client, target).run_downloads().await?;
//! println!("{}", result.report());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod progress;
pub mod signals;
pub mod stats;

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::app::cache::{DownloadTarget, ResumeGuard};
use crate::app::client::RangeClient;
use crate::app::queue::PartitionQueue;
use crate::app::worker::{WorkerContext, WorkerPool};
use crate::errors::{DownloadError, DownloadResult};

pub use config::{default_parallelism, CoordinatorConfig, FailurePolicy};
#[cfg(test)]
pub(crate) use progress::CountingProgress;
pub use progress::{NoopProgress, ProgressSink};
pub use signals::SignalHandler;
pub use stats::{FetchStats, SessionResult, StatsSnapshot};

/// Main coordinator for a download run
pub struct Coordinator {
    config: CoordinatorConfig,
    client: Arc<RangeClient>,
    target: Arc<DownloadTarget>,
    stats: Arc<FetchStats>,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
    handle_signals: bool,
}

impl Coordinator {
    /// Create a coordinator for an already prepared target
    pub fn new(config: CoordinatorConfig, client: Arc<RangeClient>, target: DownloadTarget) -> Self {
        Self {
            config,
            client,
            target: Arc::new(target),
            stats: Arc::new(FetchStats::new()),
            progress: Arc::new(NoopProgress),
            cancel: CancellationToken::new(),
            handle_signals: true,
        }
    }

    /// Report per-partition progress to `progress`
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Whether CTRL-C cancels the run (on by default)
    pub fn with_signal_handling(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }

    /// Shared counters, readable while the run is in flight
    pub fn stats(&self) -> Arc<FetchStats> {
        Arc::clone(&self.stats)
    }

    /// Download every partition of the configured range
    ///
    /// Under [`FailurePolicy::Continue`] failed partitions are counted in the
    /// returned result instead of ending the run; see
    /// [`SessionResult::ensure_complete`].
    ///
    /// # Errors
    ///
    /// - `DownloadError::InvalidConfiguration` for an empty partition range
    /// - the first fatal partition error under [`FailurePolicy::FailFast`]
    /// - `DownloadError::Cancelled` after an interrupt
    pub async fn run_downloads(&self) -> DownloadResult<SessionResult> {
        self.config
            .validate()
            .map_err(|reason| DownloadError::InvalidConfiguration { reason })?;

        let session_start = chrono::Utc::now();
        let started = Instant::now();
        let partitions = self.config.partitions;
        let worker_count = self.config.worker_count();
        let line_format = self
            .config
            .line_format
            .unwrap_or_else(|| self.target.default_line_format());

        info!(
            "Downloading {} {} partitions ({}) into {} with {} workers",
            partitions.len(),
            self.config.hash_mode,
            partitions,
            self.target.partition_dir().display(),
            worker_count
        );

        let context = Arc::new(WorkerContext {
            client: Arc::clone(&self.client),
            queue: Arc::new(PartitionQueue::new(partitions)),
            target: Arc::clone(&self.target),
            stats: Arc::clone(&self.stats),
            progress: Arc::clone(&self.progress),
            cancel: self.cancel.clone(),
            resume: ResumeGuard::new(self.config.resume),
            hash_mode: self.config.hash_mode,
            line_format,
            failure_policy: self.config.failure_policy,
            first_error: Mutex::new(None),
        });

        let signal_task = self
            .handle_signals
            .then(|| SignalHandler::new(self.cancel.clone()).setup());

        let outcome = WorkerPool::new(worker_count, context).run().await;

        if let Some(task) = signal_task {
            task.abort();
        }
        self.progress.finish();

        let result = SessionResult {
            stats: self.stats.snapshot(),
            total_partitions: u64::from(partitions.len()),
            session_start,
            total_duration: started.elapsed(),
        };

        match outcome {
            Ok(_) => {
                info!("Run finished: {}", result.summary());
                Ok(result)
            }
            Err(e) => {
                warn!("Run stopped: {} ({})", e, result.summary());
                Err(e)
            }
        }
    }
}
