//! Worker pool management
//!
//! The pool spawns a fixed number of [`PartitionWorker`] tasks onto a
//! `JoinSet`, waits for all of them, and turns the run's end state into a
//! single result: the first fatal error, a cancellation, or success.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::core::{PartitionWorker, WorkerContext};
use crate::errors::{DownloadError, DownloadResult};

/// Fixed-size pool of partition workers
#[derive(Debug)]
pub struct WorkerPool {
    worker_count: usize,
    context: Arc<WorkerContext>,
}

impl WorkerPool {
    pub fn new(worker_count: usize, context: Arc<WorkerContext>) -> Self {
        Self {
            worker_count: worker_count.max(1),
            context,
        }
    }

    /// Run all workers to completion
    ///
    /// # Errors
    ///
    /// - the first fatal partition error under fail-fast
    /// - `DownloadError::Cancelled` if the run was interrupted from outside
    /// - `DownloadError::TaskFailed` if a worker task panicked
    pub async fn run(self) -> DownloadResult<u64> {
        info!("Starting {} workers", self.worker_count);

        let mut workers = JoinSet::new();
        for worker_id in 0..self.worker_count {
            let worker = PartitionWorker::new(worker_id as u32, Arc::clone(&self.context));
            workers.spawn(worker.run());
        }

        let mut processed = 0u64;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(count) => processed += count,
                Err(e) => {
                    warn!("Worker task failed: {}", e);
                    self.context
                        .fail_run(DownloadError::TaskFailed {
                            reason: e.to_string(),
                        })
                        .await;
                }
            }
        }

        debug!("All workers stopped after {} partitions", processed);

        if let Some(error) = self.context.take_first_error().await {
            return Err(error);
        }
        if self.context.cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }
        Ok(processed)
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }
}
