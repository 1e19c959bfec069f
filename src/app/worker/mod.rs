//! Partition worker system
//!
//! A fixed pool of workers pulls partitions from a shared queue. Workers never
//! wait for a specific partition; they take the next one, run it through the
//! resume check and the fetch pipeline, and move on.
//!
//! # Module Organization
//!
//! - [`core`] - the per-partition pipeline and the state shared by workers
//! - [`pool`] - spawning workers and folding their end state into one result

pub mod core;
pub mod pool;

pub use core::{PartitionWorker, WorkerContext};
pub use pool::WorkerPool;
