//! Tracking Report - Diagnostic Snapshots
//!
//! Read-only snapshots of the tracker's state, rendered either as the
//! human-readable summary the diagnostic tool prints or as JSON for
//! tooling that wants structure.

use crate::tracking::{TrackingLevel, DOWNGRADE_MESSAGE};
use crate::util::constants::KB;
use serde::Serialize;

/// Per-reservation summary
#[derive(Debug, Clone, Serialize)]
pub struct ReservationSummary {
    /// Diagnostic tag of the reservation
    pub tag: String,
    /// Reserved bytes
    pub reserved: u64,
    /// Committed bytes
    pub committed: u64,
}

impl std::fmt::Display for ReservationSummary {
    /// The exact `"<tag> (reserved=<N>KB, committed=<M>KB)"` line that
    /// external tooling matches on.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (reserved={}KB, committed={}KB)",
            self.tag,
            self.reserved / KB,
            self.committed / KB
        )
    }
}

/// Snapshot of the whole tracking subsystem
#[derive(Debug, Clone, Serialize)]
pub struct TrackingReport {
    /// Tracking level at snapshot time
    pub level: TrackingLevel,
    /// True once tracking has degraded
    pub degraded: bool,
    /// Sum of reserved bytes
    pub total_reserved: u64,
    /// Sum of committed bytes
    pub total_committed: u64,
    /// Per-reservation summaries, ordered by base address
    pub reservations: Vec<ReservationSummary>,
    /// Live malloc-site entries
    pub site_count: usize,
    /// Bytes recorded across all malloc sites
    pub site_allocated_bytes: u64,
}

impl TrackingReport {
    /// Render as JSON for tooling
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl std::fmt::Display for TrackingReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Memory tracking (level={}, reserved={}KB, committed={}KB)",
            self.level,
            self.total_reserved / KB,
            self.total_committed / KB
        )?;
        for reservation in &self.reservations {
            writeln!(f, "  {}", reservation)?;
        }
        writeln!(
            f,
            "  malloc sites: {} ({}KB)",
            self.site_count,
            self.site_allocated_bytes / KB
        )?;
        if self.degraded {
            writeln!(f, "{}", DOWNGRADE_MESSAGE)?;
        }
        Ok(())
    }
}
