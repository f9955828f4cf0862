//! Memory Tracker - Reservation Registry and Event Facade
//!
//! The tracker owns every reserved range, keyed by base address, plus
//! the malloc-site table and the shared tracking context. Allocator
//! events (reserve/release, commit/uncommit, malloc) enter here; the
//! diagnostic tool reads snapshots back out.
//!
//! All mutation goes through one mutex. The ledgers themselves are
//! plain data structures; this lock is what provides the
//! single-writer-at-a-time discipline they require, and consistent
//! snapshots for readers.

use crate::config::TrackerConfig;
use crate::contract_assert;
use crate::error::Result;
use crate::tracking::report::{ReservationSummary, TrackingReport};
use crate::tracking::{MallocSiteTable, ReservedRange, TrackingContext, TrackingLevel};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

struct TrackerInner {
    /// Reservations keyed by base address
    reservations: BTreeMap<u64, ReservedRange>,

    /// Call-site accounting
    malloc_sites: MallocSiteTable,
}

/// MemoryTracker - entry point for the native-memory accounting side
///
/// # Examples
///
/// ```rust
/// use memtrack::{MemoryTracker, TrackerConfig};
///
/// let tracker = MemoryTracker::new(TrackerConfig::default())?;
/// tracker.reserve(0x1000_0000, 256 * 1024, "Code");
/// tracker.commit(0x1000_0000, 0, 64 * 1024);
/// assert_eq!(tracker.total_committed(), 64 * 1024);
/// # Ok::<(), memtrack::Error>(())
/// ```
pub struct MemoryTracker {
    inner: Mutex<TrackerInner>,
    context: Arc<TrackingContext>,
}

impl MemoryTracker {
    /// Create a tracker from a validated configuration
    ///
    /// # Errors
    /// `Configuration` if the configuration is invalid.
    pub fn new(config: TrackerConfig) -> Result<Self> {
        config.validate()?;

        let context = Arc::new(TrackingContext::new(config.tracking_level));
        let malloc_sites = MallocSiteTable::new(
            config.site_table_capacity,
            config.site_probe_limit,
            Arc::clone(&context),
        );

        Ok(Self {
            inner: Mutex::new(TrackerInner {
                reservations: BTreeMap::new(),
                malloc_sites,
            }),
            context,
        })
    }

    /// Register a reservation of `size` bytes at `base`
    ///
    /// Overlapping an existing reservation is a caller bug and panics.
    pub fn reserve(&self, base: u64, size: u64, tag: &str) {
        let range = ReservedRange::new(base, size, tag);
        let mut inner = self.inner.lock();

        // The new range must not intersect its address-space neighbors.
        if let Some((_, before)) = inner.reservations.range(..=base).next_back() {
            contract_assert!(
                before.base() + before.size() <= base,
                "reservation {:#x} overlaps existing {:#x}",
                base,
                before.base()
            );
        }
        if let Some((_, after)) = inner.reservations.range(base..).next() {
            contract_assert!(
                base + size <= after.base(),
                "reservation {:#x} overlaps existing {:#x}",
                base,
                after.base()
            );
        }

        log::debug!("reserve {:#x}+{:#x} tag={}", base, size, tag);
        inner.reservations.insert(base, range);
    }

    /// Release the reservation at `base`, dropping its committed regions
    pub fn release(&self, base: u64) {
        let mut inner = self.inner.lock();
        let removed = inner.reservations.remove(&base);
        contract_assert!(removed.is_some(), "release of unknown reservation {:#x}", base);
        log::debug!("release {:#x}", base);
    }

    /// Commit a range inside the reservation at `base`
    ///
    /// Offsets are relative to the reservation base.
    pub fn commit(&self, base: u64, offset: u64, length: u64) {
        let mut inner = self.inner.lock();
        let range = inner.reservations.get_mut(&base);
        contract_assert!(range.is_some(), "commit against unknown reservation {:#x}", base);
        range.unwrap().commit(offset, length);
    }

    /// Uncommit a range inside the reservation at `base`
    pub fn uncommit(&self, base: u64, offset: u64, length: u64) {
        let mut inner = self.inner.lock();
        let range = inner.reservations.get_mut(&base);
        contract_assert!(
            range.is_some(),
            "uncommit against unknown reservation {:#x}",
            base
        );
        range.unwrap().uncommit(offset, length);
    }

    /// Record a malloc event against a call-site fingerprint
    ///
    /// Site-table overflow degrades tracking but is swallowed here: the
    /// allocation that triggered it must proceed, and the condition is
    /// observable through `is_degraded()` and the report instead.
    pub fn record_malloc(&self, fingerprint: u64, size: u64) {
        let mut inner = self.inner.lock();
        if inner.malloc_sites.record(fingerprint, size).is_err() {
            log::trace!("malloc site {:#x} not tracked (degraded)", fingerprint);
        }
    }

    /// Sum of reserved bytes across all reservations
    pub fn total_reserved(&self) -> u64 {
        let inner = self.inner.lock();
        inner.reservations.values().map(|r| r.size()).sum()
    }

    /// Sum of committed bytes across all reservations
    pub fn total_committed(&self) -> u64 {
        let inner = self.inner.lock();
        inner.reservations.values().map(|r| r.total_committed()).sum()
    }

    /// Committed bytes of one reservation
    pub fn committed_of(&self, base: u64) -> u64 {
        let inner = self.inner.lock();
        let range = inner.reservations.get(&base);
        contract_assert!(range.is_some(), "query against unknown reservation {:#x}", base);
        range.unwrap().total_committed()
    }

    /// Current tracking level
    pub fn level(&self) -> TrackingLevel {
        self.context.level()
    }

    /// Check if tracking has degraded
    pub fn is_degraded(&self) -> bool {
        self.context.is_degraded()
    }

    /// Shared tracking context
    ///
    /// Hand this to components that need to observe the degraded flag
    /// without going through the tracker.
    pub fn context(&self) -> Arc<TrackingContext> {
        Arc::clone(&self.context)
    }

    /// Produce a diagnostic snapshot
    pub fn report(&self) -> TrackingReport {
        let inner = self.inner.lock();

        let reservations: Vec<ReservationSummary> = inner
            .reservations
            .values()
            .map(|r| ReservationSummary {
                tag: r.tag().to_string(),
                reserved: r.size(),
                committed: r.total_committed(),
            })
            .collect();

        TrackingReport {
            level: self.context.level(),
            degraded: self.context.is_degraded(),
            total_reserved: reservations.iter().map(|r| r.reserved).sum(),
            total_committed: reservations.iter().map(|r| r.committed).sum(),
            reservations,
            site_count: inner.malloc_sites.site_count(),
            site_allocated_bytes: inner.malloc_sites.total_allocated(),
        }
    }

    /// Validate every ledger's internal consistency
    ///
    /// # Errors
    /// `Internal` from the first inconsistent ledger found.
    pub fn validate(&self) -> Result<()> {
        let inner = self.inner.lock();
        for range in inner.reservations.values() {
            range.ledger().validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::constants::KB;

    fn tracker() -> MemoryTracker {
        MemoryTracker::new(TrackerConfig::default()).unwrap()
    }

    const BASE: u64 = 0x7f00_0000_0000;

    // ========================================================================
    // Reservation registry
    // ========================================================================

    #[test]
    fn test_reserve_commit_query() {
        let tracker = tracker();
        tracker.reserve(BASE, 256 * KB, "Internal");

        tracker.commit(BASE, 0, 96 * KB);

        assert_eq!(tracker.total_reserved(), 256 * KB);
        assert_eq!(tracker.total_committed(), 96 * KB);
        assert_eq!(tracker.committed_of(BASE), 96 * KB);
        assert!(tracker.validate().is_ok());
    }

    #[test]
    fn test_multiple_reservations_sum() {
        let tracker = tracker();
        tracker.reserve(BASE, 256 * KB, "Code");
        tracker.reserve(BASE + 1024 * KB, 512 * KB, "GC");

        tracker.commit(BASE, 0, 32 * KB);
        tracker.commit(BASE + 1024 * KB, 0, 64 * KB);

        assert_eq!(tracker.total_reserved(), 768 * KB);
        assert_eq!(tracker.total_committed(), 96 * KB);
    }

    #[test]
    fn test_release_drops_committed() {
        let tracker = tracker();
        tracker.reserve(BASE, 256 * KB, "Arena");
        tracker.commit(BASE, 0, 128 * KB);

        tracker.release(BASE);

        assert_eq!(tracker.total_reserved(), 0);
        assert_eq!(tracker.total_committed(), 0);
    }

    #[test]
    #[should_panic(expected = "contract violation")]
    fn test_overlapping_reservation_panics() {
        let tracker = tracker();
        tracker.reserve(BASE, 256 * KB, "A");
        tracker.reserve(BASE + 128 * KB, 256 * KB, "B");
    }

    #[test]
    fn test_adjacent_reservations_allowed() {
        let tracker = tracker();
        tracker.reserve(BASE, 256 * KB, "A");
        tracker.reserve(BASE + 256 * KB, 256 * KB, "B");

        assert_eq!(tracker.total_reserved(), 512 * KB);
    }

    #[test]
    #[should_panic(expected = "contract violation")]
    fn test_commit_unknown_base_panics() {
        let tracker = tracker();
        tracker.commit(0xdead, 0, 4 * KB);
    }

    #[test]
    #[should_panic(expected = "contract violation")]
    fn test_release_unknown_base_panics() {
        let tracker = tracker();
        tracker.release(0xdead);
    }

    // ========================================================================
    // Malloc-site routing
    // ========================================================================

    #[test]
    fn test_record_malloc_does_not_fail_on_overflow() {
        let config = TrackerConfig {
            site_table_capacity: 2,
            site_probe_limit: 2,
            ..Default::default()
        };
        let tracker = MemoryTracker::new(config).unwrap();

        // Third distinct site overflows the 2-slot table; the call
        // itself stays silent.
        tracker.record_malloc(1, 8);
        tracker.record_malloc(2, 8);
        tracker.record_malloc(3, 8);

        assert!(tracker.is_degraded());
        assert_eq!(tracker.level(), TrackingLevel::Off);
    }

    #[test]
    fn test_concurrent_commit_uncommit() {
        use std::thread;

        let tracker = Arc::new(tracker());
        for i in 0..4u64 {
            tracker.reserve(BASE + i * 1024 * KB, 512 * KB, "Thread");
        }

        let mut handles = Vec::new();
        for i in 0..4u64 {
            let tracker = Arc::clone(&tracker);
            handles.push(thread::spawn(move || {
                let base = BASE + i * 1024 * KB;
                for round in 0..100u64 {
                    tracker.commit(base, (round % 8) * 32 * KB, 32 * KB);
                    tracker.record_malloc(i * 1000 + round, 16);
                }
                for round in 0..8u64 {
                    tracker.uncommit(base, round * 32 * KB, 32 * KB);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(tracker.total_committed(), 0);
        assert!(tracker.validate().is_ok());
    }
}
