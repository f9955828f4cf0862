//! Partition - Per-NUMA-Node Capacity Accounting
//!
//! One partition per NUMA node. Capacity is the committed budget the
//! partition currently holds (bounded by its fixed maximum), used is
//! the portion handed out to pages. Counters are atomic so the
//! allocation path can update them without a partition-wide lock; the
//! reporting surface reads them relaxed.

use crate::contract_assert;
use crate::util::AtomicUtils;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Partition - capacity/used ledger for one NUMA node
#[derive(Debug)]
pub struct Partition {
    /// Partition (NUMA node) id
    id: usize,

    /// Hard capacity limit, fixed at construction
    max_capacity: u64,

    /// Currently committed capacity
    capacity: AtomicU64,

    /// Bytes in use by pages
    used: AtomicU64,

    /// High-water mark of `used`
    peak_used: AtomicU64,
}

impl Partition {
    /// Create a partition with a fixed maximum capacity
    pub fn new(id: usize, max_capacity: u64) -> Self {
        contract_assert!(max_capacity > 0, "partition max capacity must be non-zero");
        Self {
            id,
            max_capacity,
            capacity: AtomicU64::new(0),
            used: AtomicU64::new(0),
            peak_used: AtomicU64::new(0),
        }
    }

    /// Partition id
    pub fn id(&self) -> usize {
        self.id
    }

    /// Fixed maximum capacity
    pub fn max_capacity(&self) -> u64 {
        self.max_capacity
    }

    /// Currently committed capacity
    pub fn capacity(&self) -> u64 {
        self.capacity.load(Ordering::Relaxed)
    }

    /// Bytes in use
    pub fn used(&self) -> u64 {
        self.used.load(Ordering::Relaxed)
    }

    /// Committed capacity not yet in use
    pub fn available(&self) -> u64 {
        self.capacity().saturating_sub(self.used())
    }

    /// High-water mark of used bytes
    pub fn peak_used(&self) -> u64 {
        self.peak_used.load(Ordering::Relaxed)
    }

    /// Grow committed capacity by up to `bytes`, clamped at the maximum
    ///
    /// Returns the number of bytes actually granted. The allocation
    /// path treats a short grant as "commit less or steal from another
    /// partition".
    pub fn increase_capacity(&self, bytes: u64) -> u64 {
        let mut current = self.capacity.load(Ordering::Relaxed);
        loop {
            let granted = bytes.min(self.max_capacity - current);
            if granted == 0 {
                return 0;
            }
            match self.capacity.compare_exchange_weak(
                current,
                current + granted,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return granted,
                Err(actual) => current = actual,
            }
        }
    }

    /// Shrink committed capacity
    pub fn decrease_capacity(&self, bytes: u64) {
        let previous = AtomicUtils::saturating_sub(&self.capacity, bytes);
        debug_assert!(previous >= bytes, "capacity underflow on partition {}", self.id);
    }

    /// Account bytes handed out to a page
    pub fn increase_used(&self, bytes: u64) {
        let previous = self.used.fetch_add(bytes, Ordering::AcqRel);
        AtomicUtils::update_max(&self.peak_used, previous + bytes);
    }

    /// Account bytes returned by a freed page
    pub fn decrease_used(&self, bytes: u64) {
        let previous = AtomicUtils::saturating_sub(&self.used, bytes);
        debug_assert!(previous >= bytes, "used underflow on partition {}", self.id);
    }

    /// Point-in-time snapshot
    pub fn stats(&self) -> PartitionStats {
        PartitionStats {
            id: self.id,
            max_capacity: self.max_capacity,
            capacity: self.capacity(),
            used: self.used(),
            peak_used: self.peak_used(),
        }
    }
}

/// Snapshot of one partition's counters
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PartitionStats {
    /// Partition id
    pub id: usize,
    /// Fixed maximum capacity
    pub max_capacity: u64,
    /// Committed capacity
    pub capacity: u64,
    /// Bytes in use
    pub used: u64,
    /// High-water mark of used bytes
    pub peak_used: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::constants::MB;

    #[test]
    fn test_capacity_clamped_at_max() {
        let partition = Partition::new(0, 8 * MB);

        assert_eq!(partition.increase_capacity(6 * MB), 6 * MB);
        assert_eq!(partition.increase_capacity(6 * MB), 2 * MB);
        assert_eq!(partition.increase_capacity(MB), 0);
        assert_eq!(partition.capacity(), 8 * MB);
    }

    #[test]
    fn test_used_and_peak() {
        let partition = Partition::new(1, 8 * MB);
        partition.increase_capacity(8 * MB);

        partition.increase_used(3 * MB);
        partition.increase_used(2 * MB);
        partition.decrease_used(4 * MB);

        assert_eq!(partition.used(), MB);
        assert_eq!(partition.peak_used(), 5 * MB);
        assert_eq!(partition.available(), 7 * MB);
    }

    #[test]
    fn test_concurrent_capacity_grants_never_exceed_max() {
        use std::sync::Arc;
        use std::thread;

        let partition = Arc::new(Partition::new(0, 64 * MB));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let partition = Arc::clone(&partition);
            handles.push(thread::spawn(move || {
                let mut granted = 0u64;
                for _ in 0..64 {
                    granted += partition.increase_capacity(MB);
                }
                granted
            }));
        }

        let total: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(total, 64 * MB);
        assert_eq!(partition.capacity(), 64 * MB);
    }
}
