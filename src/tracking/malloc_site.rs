//! Malloc-Site Table - Call-Site Allocation Accounting
//!
//! A fixed-capacity open-addressing table from call-site fingerprints to
//! allocation counters. The table runs under a strict memory budget: it
//! never grows. When a probe sequence exceeds the configured bound the
//! table degrades the shared tracking context instead of expanding -
//! existing entries stay live, new sites are refused, and the rest of
//! the runtime carries on untracked.

use crate::error::{Error, Result};
use crate::tracking::{TrackingContext, DOWNGRADE_MESSAGE};
use crate::util::hash;
use serde::Serialize;
use std::sync::Arc;

/// Accounting entry for one allocation call site
///
/// The fingerprint is an opaque caller-supplied 64-bit hash of a
/// stack-trace-like identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MallocSiteEntry {
    /// Call-site fingerprint
    pub fingerprint: u64,
    /// Total bytes allocated from this site
    pub allocated_bytes: u64,
    /// Number of allocations from this site
    pub allocation_count: u32,
}

/// MallocSiteTable - fixed-bucket-count site accounting
///
/// Slots are probed linearly from `hash(fingerprint) mod capacity`.
/// Entries are only ever inserted within the probe bound, so a lookup
/// never needs to probe further than that either.
#[derive(Debug)]
pub struct MallocSiteTable {
    /// Slot array, fixed capacity
    slots: Vec<Option<MallocSiteEntry>>,

    /// Probe-sequence bound before a bucket counts as full
    probe_limit: usize,

    /// Live entry count
    site_count: usize,

    /// Shared tracking state, degraded on overflow
    context: Arc<TrackingContext>,
}

impl MallocSiteTable {
    /// Create a table with `capacity` slots and the given probe bound
    pub fn new(capacity: usize, probe_limit: usize, context: Arc<TrackingContext>) -> Self {
        crate::contract_assert!(capacity > 0, "site table capacity must be non-zero");
        crate::contract_assert!(
            probe_limit > 0 && probe_limit <= capacity,
            "probe limit {} must be in 1..={}",
            probe_limit,
            capacity
        );
        Self {
            slots: vec![None; capacity],
            probe_limit,
            site_count: 0,
            context,
        }
    }

    fn home_slot(&self, fingerprint: u64) -> usize {
        hash::uint64_to_uint32(fingerprint) as usize % self.slots.len()
    }

    /// Record an allocation of `size` bytes from `fingerprint`
    ///
    /// An existing entry is incremented; a new site is inserted into the
    /// first empty slot within the probe bound. If the bound is exceeded
    /// the shared context degrades (one-way) and `SiteTableOverflow` is
    /// returned. After degradation, existing sites keep accumulating but
    /// new sites are refused without probing.
    ///
    /// Overflow is a reported condition, not a failure of the
    /// allocation itself - callers must not propagate it as one.
    pub fn record(&mut self, fingerprint: u64, size: u64) -> Result<()> {
        let home = self.home_slot(fingerprint);
        let capacity = self.slots.len();
        let mut first_empty: Option<usize> = None;

        for probe in 0..self.probe_limit {
            let index = (home + probe) % capacity;
            match &mut self.slots[index] {
                Some(entry) if entry.fingerprint == fingerprint => {
                    entry.allocated_bytes += size;
                    entry.allocation_count += 1;
                    return Ok(());
                }
                Some(_) => {}
                None => {
                    if first_empty.is_none() {
                        first_empty = Some(index);
                    }
                }
            }
        }

        if self.context.is_degraded() {
            return Err(Error::SiteTableOverflow);
        }

        match first_empty {
            Some(index) => {
                self.slots[index] = Some(MallocSiteEntry {
                    fingerprint,
                    allocated_bytes: size,
                    allocation_count: 1,
                });
                self.site_count += 1;
                Ok(())
            }
            None => {
                if self.context.downgrade() {
                    log::warn!("{}", DOWNGRADE_MESSAGE);
                }
                Err(Error::SiteTableOverflow)
            }
        }
    }

    /// Look up the entry for a fingerprint
    pub fn site(&self, fingerprint: u64) -> Option<&MallocSiteEntry> {
        let home = self.home_slot(fingerprint);
        let capacity = self.slots.len();

        for probe in 0..self.probe_limit {
            let index = (home + probe) % capacity;
            if let Some(entry) = &self.slots[index] {
                if entry.fingerprint == fingerprint {
                    return Some(entry);
                }
            }
        }
        None
    }

    /// Check if tracking has degraded
    pub fn is_degraded(&self) -> bool {
        self.context.is_degraded()
    }

    /// Number of live entries
    pub fn site_count(&self) -> usize {
        self.site_count
    }

    /// Slot capacity
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Total bytes recorded across all live sites
    pub fn total_allocated(&self) -> u64 {
        self.slots
            .iter()
            .flatten()
            .map(|entry| entry.allocated_bytes)
            .sum()
    }

    /// Snapshot of all live entries
    pub fn sites(&self) -> Vec<MallocSiteEntry> {
        self.slots.iter().flatten().copied().collect()
    }
}
