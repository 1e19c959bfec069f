//! Shared partition queue
//!
//! Workers pull partitions from a single atomic cursor over the run's
//! [`PartitionRange`]. Each partition is handed out exactly once; the order is
//! ascending but completion order is not.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::app::models::{Partition, PartitionRange};

/// Lock-free dispenser of partitions
#[derive(Debug)]
pub struct PartitionQueue {
    range: PartitionRange,
    cursor: AtomicU64,
}

impl PartitionQueue {
    pub fn new(range: PartitionRange) -> Self {
        Self {
            range,
            cursor: AtomicU64::new(u64::from(range.start())),
        }
    }

    /// Take the next partition, or `None` once the range is drained
    pub fn next_partition(&self) -> Option<Partition> {
        let id = self.cursor.fetch_add(1, Ordering::Relaxed);
        if id >= u64::from(self.range.end()) {
            return None;
        }
        u32::try_from(id).ok().and_then(Partition::new)
    }

    /// Partitions not yet handed out
    pub fn remaining(&self) -> u64 {
        let cursor = self.cursor.load(Ordering::Relaxed);
        u64::from(self.range.end()).saturating_sub(cursor)
    }

    pub fn total(&self) -> u64 {
        u64::from(self.range.len())
    }

    pub fn range(&self) -> PartitionRange {
        self.range
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_hands_out_range_in_order() {
        let queue = PartitionQueue::new(PartitionRange::new(0x10..0x13));
        let keys: Vec<String> = std::iter::from_fn(|| queue.next_partition())
            .map(|p| p.key())
            .collect();
        assert_eq!(keys, vec!["00010", "00011", "00012"]);
        assert_eq!(queue.remaining(), 0);
        assert!(queue.next_partition().is_none());
    }

    #[test]
    fn test_empty_range() {
        let queue = PartitionQueue::new(PartitionRange::new(5..5));
        assert_eq!(queue.total(), 0);
        assert!(queue.next_partition().is_none());
    }

    #[test]
    fn test_full_range_ends_at_last_key() {
        let queue = PartitionQueue::new(PartitionRange::new(0xFFFFE..0x100000));
        assert_eq!(queue.next_partition().unwrap().key(), "FFFFE");
        assert_eq!(queue.next_partition().unwrap().key(), "FFFFF");
        assert!(queue.next_partition().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_each_partition_consumed_once() {
        let queue = Arc::new(PartitionQueue::new(PartitionRange::new(0..5000)));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let queue = Arc::clone(&queue);
            let seen = Arc::clone(&seen);
            handles.push(tokio::spawn(async move {
                while let Some(partition) = queue.next_partition() {
                    seen.lock().unwrap().push(partition.id());
                    tokio::task::yield_now().await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 5000);
        let unique: HashSet<u32> = seen.iter().copied().collect();
        assert_eq!(unique.len(), 5000);
    }
}
