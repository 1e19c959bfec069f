//! Core partition worker implementation
//!
//! A worker loops over the shared queue until it is drained or the run is
//! cancelled. For each partition it asks the resume guard first, then fetches,
//! decodes and writes it, and finally records the outcome in the shared
//! statistics and the progress sink.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::app::cache::{DownloadTarget, ResumeGuard, ResumeStatus};
use crate::app::client::RangeClient;
use crate::app::coordinator::{FailurePolicy, FetchStats, ProgressSink};
use crate::app::models::{HashMode, JobOutcome, LineFormat, Partition};
use crate::app::queue::PartitionQueue;
use crate::errors::DownloadError;

/// State every worker of a run shares
pub struct WorkerContext {
    pub client: Arc<RangeClient>,
    pub queue: Arc<PartitionQueue>,
    pub target: Arc<DownloadTarget>,
    pub stats: Arc<FetchStats>,
    pub progress: Arc<dyn ProgressSink>,
    pub cancel: CancellationToken,
    pub resume: ResumeGuard,
    pub hash_mode: HashMode,
    pub line_format: LineFormat,
    pub failure_policy: FailurePolicy,
    /// First fatal error of the run under fail-fast
    pub first_error: Mutex<Option<DownloadError>>,
}

impl std::fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerContext")
            .field("target", &self.target)
            .field("hash_mode", &self.hash_mode)
            .field("line_format", &self.line_format)
            .field("failure_policy", &self.failure_policy)
            .finish_non_exhaustive()
    }
}

impl WorkerContext {
    /// Remember `error` if it is the first one, then cancel the run
    pub async fn fail_run(&self, error: DownloadError) {
        let mut slot = self.first_error.lock().await;
        if slot.is_none() {
            *slot = Some(error);
        }
        drop(slot);
        self.cancel.cancel();
    }

    pub async fn take_first_error(&self) -> Option<DownloadError> {
        self.first_error.lock().await.take()
    }
}

/// Individual partition worker
#[derive(Debug)]
pub struct PartitionWorker {
    id: u32,
    context: Arc<WorkerContext>,
}

impl PartitionWorker {
    pub fn new(id: u32, context: Arc<WorkerContext>) -> Self {
        Self { id, context }
    }

    /// Process partitions until the queue is empty or the run is cancelled
    ///
    /// Returns how many partitions this worker brought to an outcome.
    pub async fn run(self) -> u64 {
        debug!("Worker {} starting", self.id);
        let mut processed = 0u64;

        loop {
            if self.context.cancel.is_cancelled() {
                debug!("Worker {} observed cancellation", self.id);
                break;
            }

            let Some(partition) = self.context.queue.next_partition() else {
                break;
            };

            if self.process(partition).await.is_some() {
                processed += 1;
            }
        }

        debug!("Worker {} finished after {} partitions", self.id, processed);
        processed
    }

    /// Run one partition through the pipeline
    ///
    /// Returns `None` when the partition was abandoned because the run was
    /// cancelled underneath it. Such partitions still advance progress by one
    /// but get no outcome in the statistics.
    pub async fn process(&self, partition: Partition) -> Option<JobOutcome> {
        let context = &self.context;
        let destination = context.target.partition_path(partition);

        if context.resume.check(&destination).await == ResumeStatus::AlreadyComplete {
            return Some(self.finish(JobOutcome::Skipped));
        }

        let result = context
            .client
            .download_partition(
                partition,
                context.hash_mode,
                &destination,
                context.line_format,
                &context.stats,
                &context.cancel,
            )
            .await;

        match result {
            Ok(written) => {
                debug!(
                    "Worker {} wrote partition {} ({} bytes)",
                    self.id, partition, written
                );
                Some(self.finish(JobOutcome::Completed))
            }
            Err(DownloadError::Cancelled) if context.cancel.is_cancelled() => {
                debug!("Worker {} abandoned partition {}", self.id, partition);
                context.progress.advance(1);
                None
            }
            Err(e) => {
                self.handle_failure(partition, e).await;
                Some(self.finish(JobOutcome::Failed))
            }
        }
    }

    async fn handle_failure(&self, partition: Partition, error: DownloadError) {
        match self.context.failure_policy {
            FailurePolicy::FailFast => {
                error!(
                    "Partition {} failed, cancelling run: {}",
                    partition, error
                );
                self.context.fail_run(error).await;
            }
            FailurePolicy::Continue => {
                warn!("Partition {} failed, continuing: {}", partition, error);
            }
        }
    }

    fn finish(&self, outcome: JobOutcome) -> JobOutcome {
        self.context.stats.record_outcome(outcome);
        self.context.progress.advance(1);
        outcome
    }

    pub fn id(&self) -> u32 {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::cache::TargetMode;
    use crate::app::client::download::brotli_compress;
    use crate::app::client::ClientConfig;
    use crate::app::coordinator::CountingProgress;
    use crate::app::models::PartitionRange;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Harness {
        context: Arc<WorkerContext>,
        progress: Arc<CountingProgress>,
        _dir: TempDir,
    }

    fn harness(server: &MockServer, policy: FailurePolicy, resume: bool) -> Harness {
        let dir = TempDir::new().unwrap();
        let target = DownloadTarget::new(dir.path().join("ranges"), TargetMode::MultiFile);
        std::fs::create_dir_all(target.partition_dir()).unwrap();

        let config = ClientConfig::default().with_base_url(format!("{}/range", server.uri()));
        let progress = Arc::new(CountingProgress::new());
        let context = Arc::new(WorkerContext {
            client: Arc::new(RangeClient::with_config(config).unwrap()),
            queue: Arc::new(PartitionQueue::new(PartitionRange::new(0..2))),
            target: Arc::new(target),
            stats: Arc::new(FetchStats::new()),
            progress: progress.clone(),
            cancel: CancellationToken::new(),
            resume: ResumeGuard::new(resume),
            hash_mode: HashMode::Sha1,
            line_format: LineFormat::Raw,
            failure_policy: policy,
            first_error: Mutex::new(None),
        });

        Harness {
            context,
            progress,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_fetches_missing_partition() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/range/00000"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(brotli_compress(b"ABC:1")))
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server, FailurePolicy::FailFast, true);
        let worker = PartitionWorker::new(0, h.context.clone());
        let outcome = worker.process(Partition::new(0).unwrap()).await;

        assert_eq!(outcome, Some(JobOutcome::Completed));
        assert_eq!(h.progress.position(), 1);
        let snapshot = h.context.stats.snapshot();
        assert_eq!(snapshot.completed, 1);
        assert_eq!(snapshot.requests, 1);
    }

    #[tokio::test]
    async fn test_resumed_partition_issues_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let h = harness(&server, FailurePolicy::FailFast, true);
        let partition = Partition::new(1).unwrap();
        std::fs::write(h.context.target.partition_path(partition), "DEF:2\n").unwrap();

        let worker = PartitionWorker::new(0, h.context.clone());
        assert_eq!(worker.process(partition).await, Some(JobOutcome::Skipped));

        let snapshot = h.context.stats.snapshot();
        assert_eq!(snapshot.skipped, 1);
        assert_eq!(snapshot.requests, 0);
        assert_eq!(h.progress.position(), 1);
    }

    #[tokio::test]
    async fn test_fail_fast_records_error_and_cancels() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let h = harness(&server, FailurePolicy::FailFast, false);
        let worker = PartitionWorker::new(0, h.context.clone());
        assert_eq!(worker.run().await, 1);

        assert!(h.context.cancel.is_cancelled());
        let error = h.context.take_first_error().await.unwrap();
        assert!(matches!(error, DownloadError::UnexpectedStatus { status: 404 }));
        assert_eq!(h.context.stats.failed(), 1);
        // The second partition was never started
        assert_eq!(h.context.queue.remaining(), 1);
    }

    #[tokio::test]
    async fn test_continue_policy_keeps_going() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(2)
            .mount(&server)
            .await;

        let h = harness(&server, FailurePolicy::Continue, false);
        let worker = PartitionWorker::new(0, h.context.clone());
        assert_eq!(worker.run().await, 2);

        assert!(!h.context.cancel.is_cancelled());
        assert!(h.context.take_first_error().await.is_none());
        assert_eq!(h.context.stats.failed(), 2);
        assert_eq!(h.progress.position(), 2);
    }

    #[tokio::test]
    async fn test_abandoned_partition_still_advances_progress() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let h = harness(&server, FailurePolicy::FailFast, false);
        h.context.cancel.cancel();

        let worker = PartitionWorker::new(0, h.context.clone());
        assert_eq!(worker.process(Partition::new(0).unwrap()).await, None);

        assert_eq!(h.progress.position(), 1);
        let snapshot = h.context.stats.snapshot();
        assert_eq!(snapshot.completed + snapshot.skipped + snapshot.failed, 0);
        assert!(h.context.take_first_error().await.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_run_takes_no_work() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let h = harness(&server, FailurePolicy::FailFast, false);
        h.context.cancel.cancel();

        let worker = PartitionWorker::new(3, h.context.clone());
        assert_eq!(worker.id(), 3);
        assert_eq!(worker.run().await, 0);
        assert_eq!(h.progress.position(), 0);
    }
}
