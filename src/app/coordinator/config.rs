//! Configuration structures for the download coordinator
//!
//! This module defines how many workers run, what happens when a partition
//! fails, and which partitions and hash flavour a run covers.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::app::models::{HashMode, LineFormat, PartitionRange};
use crate::constants::workers;

/// What a run does after a partition fails for good
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Cancel outstanding work and return the first error
    #[default]
    FailFast,
    /// Log and count failures, keep going, report them at the end
    Continue,
}

/// Configuration for the download coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Number of concurrent workers to spawn, 0 for the default
    pub parallelism: usize,
    /// Behaviour on a fatal partition error
    pub failure_policy: FailurePolicy,
    /// Hash flavour requested from the endpoint
    pub hash_mode: HashMode,
    /// Partitions covered by this run
    pub partitions: PartitionRange,
    /// Write shape of partition files, `None` lets the target decide
    pub line_format: Option<LineFormat>,
    /// Skip partitions already present on disk
    pub resume: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            failure_policy: FailurePolicy::default(),
            hash_mode: HashMode::default(),
            partitions: PartitionRange::default(),
            line_format: None,
            resume: false,
        }
    }
}

/// Eight workers per available CPU, capped
pub fn default_parallelism() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cpus * workers::WORKERS_PER_CPU).clamp(1, workers::MAX_WORKER_COUNT)
}

impl CoordinatorConfig {
    /// Set the number of workers
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_hash_mode(mut self, mode: HashMode) -> Self {
        self.hash_mode = mode;
        self
    }

    /// Restrict the run to a sub-range of keys
    pub fn with_partitions(mut self, partitions: PartitionRange) -> Self {
        self.partitions = partitions;
        self
    }

    pub fn with_line_format(mut self, format: LineFormat) -> Self {
        self.line_format = Some(format);
        self
    }

    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    /// Workers the run will actually start
    ///
    /// Zero means [`default_parallelism`]; anything above the worker cap is
    /// clamped to it.
    pub fn worker_count(&self) -> usize {
        match self.parallelism {
            0 => default_parallelism(),
            n if n > workers::MAX_WORKER_COUNT => {
                warn!(
                    "Parallelism {} exceeds the maximum of {}, using {}",
                    n,
                    workers::MAX_WORKER_COUNT,
                    workers::MAX_WORKER_COUNT
                );
                workers::MAX_WORKER_COUNT
            }
            n => n,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.partitions.is_empty() {
            return Err(format!("Partition range {} is empty", self.partitions));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CoordinatorConfig::default();
        assert!(config.parallelism >= 1);
        assert!(config.parallelism <= workers::MAX_WORKER_COUNT);
        assert_eq!(config.failure_policy, FailurePolicy::FailFast);
        assert!(config.partitions.is_full());
        assert!(config.line_format.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let config = CoordinatorConfig::default()
            .with_parallelism(4)
            .with_failure_policy(FailurePolicy::Continue)
            .with_hash_mode(HashMode::Ntlm)
            .with_partitions(PartitionRange::new(0..16))
            .with_line_format(LineFormat::Raw)
            .with_resume(true);

        assert_eq!(config.parallelism, 4);
        assert_eq!(config.failure_policy, FailurePolicy::Continue);
        assert_eq!(config.hash_mode, HashMode::Ntlm);
        assert_eq!(config.partitions.len(), 16);
        assert_eq!(config.line_format, Some(LineFormat::Raw));
        assert!(config.resume);
    }

    #[test]
    fn test_worker_count_defaults_and_caps() {
        let config = CoordinatorConfig::default().with_parallelism(0);
        assert_eq!(config.worker_count(), default_parallelism());
        assert!(config.validate().is_ok());

        let config = CoordinatorConfig::default().with_parallelism(workers::MAX_WORKER_COUNT + 36);
        assert_eq!(config.worker_count(), workers::MAX_WORKER_COUNT);
        assert!(config.validate().is_ok());

        assert_eq!(CoordinatorConfig::default().with_parallelism(7).worker_count(), 7);
    }

    #[test]
    fn test_empty_range_rejected() {
        let config = CoordinatorConfig::default().with_partitions(PartitionRange::new(16..16));
        assert!(config.validate().is_err());
    }
}
