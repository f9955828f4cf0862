//! Page Allocator Ledger - Aggregated Capacity Reporting
//!
//! The reporting face of the page allocator: capacity, usage and limits
//! summed across NUMA partitions. The surface is read-only by design -
//! the allocation path mutates individual partitions, this ledger only
//! aggregates what they report.

use crate::config::TrackerConfig;
use crate::contract_assert;
use crate::heap::partition::{Partition, PartitionStats};
use serde::Serialize;

/// PageAllocator - partitioned capacity ledger
///
/// # Examples
///
/// ```rust
/// use memtrack::heap::PageAllocator;
///
/// let allocator = PageAllocator::new(4, 256 * 1024 * 1024);
/// assert_eq!(allocator.max_capacity(), 1024 * 1024 * 1024);
/// assert_eq!(allocator.used(), 0);
/// ```
pub struct PageAllocator {
    /// Per-NUMA-node partitions
    partitions: Vec<Partition>,

    /// Fixed sum of partition maximums
    max_capacity: u64,
}

impl PageAllocator {
    /// Create a ledger with `partition_count` equal partitions
    pub fn new(partition_count: usize, partition_max_capacity: u64) -> Self {
        contract_assert!(partition_count > 0, "need at least one partition");

        let partitions = (0..partition_count)
            .map(|id| Partition::new(id, partition_max_capacity))
            .collect::<Vec<_>>();
        let max_capacity = partition_max_capacity * partition_count as u64;

        Self {
            partitions,
            max_capacity,
        }
    }

    /// Create a ledger from the tracker configuration
    pub fn from_config(config: &TrackerConfig) -> Self {
        Self::new(config.partition_count, config.partition_max_capacity)
    }

    /// Fixed maximum capacity across all partitions
    pub fn max_capacity(&self) -> u64 {
        self.max_capacity
    }

    /// Committed capacity summed across partitions
    pub fn capacity(&self) -> u64 {
        self.partitions.iter().map(|p| p.capacity()).sum()
    }

    /// Used bytes summed across partitions
    pub fn used(&self) -> u64 {
        self.partitions.iter().map(|p| p.used()).sum()
    }

    /// Number of partitions
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Access a partition by id
    pub fn partition(&self, id: usize) -> &Partition {
        contract_assert!(
            id < self.partitions.len(),
            "partition id {} out of range {}",
            id,
            self.partitions.len()
        );
        &self.partitions[id]
    }

    /// All partitions
    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    /// Point-in-time snapshot across all partitions
    pub fn stats(&self) -> PageAllocatorStats {
        PageAllocatorStats {
            max_capacity: self.max_capacity,
            capacity: self.capacity(),
            used: self.used(),
            partitions: self.partitions.iter().map(|p| p.stats()).collect(),
        }
    }
}

/// Snapshot of the whole page-allocator ledger
#[derive(Debug, Clone, Serialize)]
pub struct PageAllocatorStats {
    /// Fixed maximum capacity
    pub max_capacity: u64,
    /// Committed capacity
    pub capacity: u64,
    /// Bytes in use
    pub used: u64,
    /// Per-partition snapshots
    pub partitions: Vec<PartitionStats>,
}

impl std::fmt::Display for PageAllocatorStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PageAllocatorStats {{ max: {} bytes, capacity: {} bytes, used: {} bytes, partitions: {} }}",
            self.max_capacity,
            self.capacity,
            self.used,
            self.partitions.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::constants::MB;

    #[test]
    fn test_sums_across_partitions() {
        let allocator = PageAllocator::new(4, 64 * MB);

        allocator.partition(0).increase_capacity(16 * MB);
        allocator.partition(2).increase_capacity(8 * MB);
        allocator.partition(0).increase_used(4 * MB);
        allocator.partition(2).increase_used(8 * MB);

        assert_eq!(allocator.max_capacity(), 256 * MB);
        assert_eq!(allocator.capacity(), 24 * MB);
        assert_eq!(allocator.used(), 12 * MB);
    }

    #[test]
    fn test_max_capacity_is_constant() {
        let allocator = PageAllocator::new(2, 64 * MB);
        let before = allocator.max_capacity();

        allocator.partition(0).increase_capacity(64 * MB);
        allocator.partition(1).increase_capacity(64 * MB);

        assert_eq!(allocator.max_capacity(), before);
    }

    #[test]
    fn test_from_config_partition_layout() {
        let config = TrackerConfig {
            partition_count: 3,
            partition_max_capacity: 128 * MB,
            ..Default::default()
        };
        let allocator = PageAllocator::from_config(&config);

        assert_eq!(allocator.partition_count(), 3);
        assert_eq!(allocator.max_capacity(), 384 * MB);
        assert_eq!(allocator.partition(1).id(), 1);
    }

    #[test]
    fn test_stats_snapshot() {
        let allocator = PageAllocator::new(2, 64 * MB);
        allocator.partition(1).increase_capacity(32 * MB);
        allocator.partition(1).increase_used(16 * MB);

        let stats = allocator.stats();

        assert_eq!(stats.capacity, 32 * MB);
        assert_eq!(stats.used, 16 * MB);
        assert_eq!(stats.partitions.len(), 2);
        assert_eq!(stats.partitions[1].peak_used, 16 * MB);
        assert!(stats.to_string().contains("partitions: 2"));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_partition_id_bounds_checked() {
        let allocator = PageAllocator::new(2, 64 * MB);
        let _ = allocator.partition(2);
    }
}
