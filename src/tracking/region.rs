//! Region Ledger - Committed-Range Accounting
//!
//! Tracks which sub-ranges of a reserved address range are committed.
//! The ledger stores regions sorted by start offset, non-overlapping and
//! coalesced: committing a range that overlaps or touches existing
//! regions always collapses the run into a single region, and
//! uncommitting can shrink, split or delete regions.
//!
//! The ledger itself is a plain data structure; the allocator serializes
//! access to it (see `tracker::MemoryTracker`, which wraps it in a
//! mutex). Readers needing a consistent snapshot take the same lock,
//! since a region can be mid-merge during commit.

use crate::contract_assert;
use crate::error::{Error, Result};
use crate::util::constants::KB;
use serde::Serialize;

/// One committed sub-range of a reserved range
///
/// Offsets are relative to the reservation base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommittedRegion {
    /// Start offset within the reservation
    pub start: u64,
    /// Length in bytes, always non-zero
    pub length: u64,
}

impl CommittedRegion {
    /// End offset (exclusive)
    pub fn end(&self) -> u64 {
        self.start + self.length
    }
}

/// RegionLedger - the committed-region set of one reserved range
///
/// Total committed bytes are kept as a running counter and cross-checked
/// against the region set by `validate()`.
#[derive(Debug)]
pub struct RegionLedger {
    /// Size of the owning reservation
    reserved_size: u64,

    /// Committed regions, sorted by start, coalesced
    regions: Vec<CommittedRegion>,

    /// Cached sum of region lengths
    committed: u64,
}

impl RegionLedger {
    /// Create an empty ledger for a reservation of `reserved_size` bytes
    pub fn new(reserved_size: u64) -> Self {
        contract_assert!(reserved_size > 0, "reserved size must be non-zero");
        Self {
            reserved_size,
            regions: Vec::new(),
            committed: 0,
        }
    }

    /// Commit `[offset, offset + length)`
    ///
    /// Merges with every existing region the new range overlaps or
    /// touches (touching at a boundary counts: committing `[0,3)` then
    /// `[3,6)` stores one region `[0,6)`). Committing an already
    /// committed sub-range is a no-op; a single call bridging several
    /// disjoint regions collapses them into one.
    ///
    /// Offsets outside the reservation are a caller bug and panic.
    pub fn commit(&mut self, offset: u64, length: u64) {
        if length == 0 {
            return;
        }

        let end = offset.checked_add(length);
        contract_assert!(
            end.is_some_and(|e| e <= self.reserved_size),
            "commit [{:#x}+{:#x}) outside reserved size {:#x}",
            offset,
            length,
            self.reserved_size
        );
        let end = offset + length;

        // The run of stored regions that overlap or touch the new range.
        let lo = self.regions.partition_point(|r| r.end() < offset);
        let hi = self.regions.partition_point(|r| r.start <= end);

        let new_start = if lo < hi {
            offset.min(self.regions[lo].start)
        } else {
            offset
        };
        let new_end = if lo < hi {
            end.max(self.regions[hi - 1].end())
        } else {
            end
        };

        let absorbed: u64 = self.regions[lo..hi].iter().map(|r| r.length).sum();
        let merged = CommittedRegion {
            start: new_start,
            length: new_end - new_start,
        };
        self.regions.splice(lo..hi, std::iter::once(merged));
        self.committed += merged.length - absorbed;

        log::trace!(
            "commit [{:#x}+{:#x}): {} regions, {} bytes committed",
            offset,
            length,
            self.regions.len(),
            self.committed
        );
    }

    /// Uncommit `[offset, offset + length)`
    ///
    /// Removes the range from every stored region it intersects: a
    /// region fully covered disappears, a region covered in the middle
    /// splits in two, a region covered at one end shrinks. Uncommitting
    /// a range with no tracked commitment is a no-op.
    ///
    /// Offsets outside the reservation are a caller bug and panic.
    pub fn uncommit(&mut self, offset: u64, length: u64) {
        if length == 0 {
            return;
        }

        let end = offset.checked_add(length);
        contract_assert!(
            end.is_some_and(|e| e <= self.reserved_size),
            "uncommit [{:#x}+{:#x}) outside reserved size {:#x}",
            offset,
            length,
            self.reserved_size
        );
        let end = offset + length;

        // Strict overlap only: a region ending exactly at `offset` or
        // starting exactly at `end` is untouched.
        let lo = self.regions.partition_point(|r| r.end() <= offset);
        let hi = self.regions.partition_point(|r| r.start < end);
        if lo >= hi {
            return;
        }

        let mut kept: Vec<CommittedRegion> = Vec::with_capacity(2);
        let mut removed = 0u64;
        for region in &self.regions[lo..hi] {
            let overlap_start = region.start.max(offset);
            let overlap_end = region.end().min(end);
            removed += overlap_end - overlap_start;

            if region.start < offset {
                kept.push(CommittedRegion {
                    start: region.start,
                    length: offset - region.start,
                });
            }
            if region.end() > end {
                kept.push(CommittedRegion {
                    start: end,
                    length: region.end() - end,
                });
            }
        }

        self.regions.splice(lo..hi, kept);
        self.committed -= removed;

        log::trace!(
            "uncommit [{:#x}+{:#x}): {} regions, {} bytes committed",
            offset,
            length,
            self.regions.len(),
            self.committed
        );
    }

    /// Total committed bytes
    pub fn total_committed(&self) -> u64 {
        self.committed
    }

    /// Check if a single offset lies in a committed region
    pub fn is_committed(&self, offset: u64) -> bool {
        let idx = self.regions.partition_point(|r| r.end() <= offset);
        self.regions
            .get(idx)
            .is_some_and(|r| r.start <= offset && offset < r.end())
    }

    /// Committed regions, sorted by start offset
    pub fn regions(&self) -> &[CommittedRegion] {
        &self.regions
    }

    /// Number of stored regions
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Size of the owning reservation
    pub fn reserved_size(&self) -> u64 {
        self.reserved_size
    }

    /// Validate internal consistency
    ///
    /// Checks the region set is sorted, coalesced, in bounds, and that
    /// the cached committed counter matches the sum of region lengths.
    ///
    /// # Errors
    /// `Internal` describing the first broken invariant found.
    pub fn validate(&self) -> Result<()> {
        let mut previous_end: Option<u64> = None;
        let mut sum = 0u64;

        for region in &self.regions {
            if region.length == 0 {
                return Err(Error::Internal(format!(
                    "zero-length region at {:#x}",
                    region.start
                )));
            }
            if region.end() > self.reserved_size {
                return Err(Error::Internal(format!(
                    "region [{:#x}+{:#x}) exceeds reserved size {:#x}",
                    region.start, region.length, self.reserved_size
                )));
            }
            if let Some(prev) = previous_end {
                // Equal would mean two touching regions that were never merged.
                if region.start <= prev {
                    return Err(Error::Internal(format!(
                        "regions not coalesced at {:#x}",
                        region.start
                    )));
                }
            }
            previous_end = Some(region.end());
            sum += region.length;
        }

        if sum != self.committed {
            return Err(Error::Internal(format!(
                "committed counter {} does not match region sum {}",
                self.committed, sum
            )));
        }

        Ok(())
    }
}

/// ReservedRange - one reservation and its committed-region ledger
///
/// Created once per reservation, destroyed when the reservation is
/// released. Commit and uncommit offsets are relative to `base`.
#[derive(Debug)]
pub struct ReservedRange {
    /// Base address of the reservation
    base: u64,

    /// Diagnostic tag, e.g. the subsystem that owns the reservation
    tag: String,

    /// Committed-region ledger
    ledger: RegionLedger,
}

impl ReservedRange {
    /// Create a reservation of `size` bytes at `base`
    pub fn new(base: u64, size: u64, tag: impl Into<String>) -> Self {
        contract_assert!(
            base.checked_add(size).is_some(),
            "reservation [{:#x}+{:#x}) wraps the address space",
            base,
            size
        );
        Self {
            base,
            tag: tag.into(),
            ledger: RegionLedger::new(size),
        }
    }

    /// Base address
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Reserved size in bytes
    pub fn size(&self) -> u64 {
        self.ledger.reserved_size()
    }

    /// Diagnostic tag
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Commit a range, offsets relative to the reservation base
    pub fn commit(&mut self, offset: u64, length: u64) {
        self.ledger.commit(offset, length);
    }

    /// Uncommit a range, offsets relative to the reservation base
    pub fn uncommit(&mut self, offset: u64, length: u64) {
        self.ledger.uncommit(offset, length);
    }

    /// Total committed bytes
    pub fn total_committed(&self) -> u64 {
        self.ledger.total_committed()
    }

    /// Access the underlying ledger
    pub fn ledger(&self) -> &RegionLedger {
        &self.ledger
    }

    /// One-line diagnostic summary
    ///
    /// The format is parsed by external tooling and must stay exactly
    /// `"<tag> (reserved=<N>KB, committed=<M>KB)"`.
    pub fn summary(&self) -> String {
        format!(
            "{} (reserved={}KB, committed={}KB)",
            self.tag,
            self.size() / KB,
            self.total_committed() / KB
        )
    }
}
