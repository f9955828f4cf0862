//! Tracking Module - Native Memory Accounting
//!
//! This module tracks native memory the way a runtime's diagnostics
//! subsystem does: which parts of each reserved address range are
//! actually committed, and which call sites allocate how much.
//!
//! Components:
//! - `region`: committed-region ledger per reserved range
//! - `malloc_site`: fixed-capacity call-site accounting table
//! - `tracker`: reservation registry and facade for allocator events
//! - `report`: read-only diagnostic snapshots
//!
//! Tracking level state machine:
//! ```text
//! Detail ──┐
//!          ├──(site-table overflow)──► Off   (one-way, no recovery)
//! Summary ─┘
//! ```

pub mod malloc_site;
pub mod region;
pub mod report;
pub mod tracker;

pub use malloc_site::{MallocSiteEntry, MallocSiteTable};
pub use region::{CommittedRegion, RegionLedger, ReservedRange};
pub use report::{ReservationSummary, TrackingReport};
pub use tracker::MemoryTracker;

use serde::Serialize;
use std::sync::atomic::{AtomicU8, Ordering};

/// Message surfaced by diagnostic output once tracking has degraded
pub const DOWNGRADE_MESSAGE: &str =
    "Tracking level has been downgraded due to lack of resources";

/// Tracking level
///
/// `Detail` and `Summary` differ only in how much the diagnostic tool
/// renders; both feed the same ledgers. `Off` is the degraded terminal
/// state entered on site-table overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrackingLevel {
    /// Per-site and per-region detail
    Detail,
    /// Totals only
    Summary,
    /// Degraded - new sites are no longer tracked
    Off,
}

impl TrackingLevel {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Detail,
            1 => Self::Summary,
            _ => Self::Off,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Detail => 0,
            Self::Summary => 1,
            Self::Off => 2,
        }
    }

    /// Check if this level still admits new tracking data
    pub fn is_tracking(self) -> bool {
        self != Self::Off
    }
}

impl std::fmt::Display for TrackingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Detail => write!(f, "detail"),
            Self::Summary => write!(f, "summary"),
            Self::Off => write!(f, "off"),
        }
    }
}

/// Shared tracking state
///
/// Holds the current tracking level. Passed by `Arc` to every component
/// that can observe or trigger the downgrade, instead of living in a
/// process-wide static. The transition to `Off` is one-way; there is no
/// re-upgrade without building a new tracker.
#[derive(Debug)]
pub struct TrackingContext {
    level: AtomicU8,
}

impl TrackingContext {
    /// Create a context at the given starting level
    pub fn new(level: TrackingLevel) -> Self {
        Self {
            level: AtomicU8::new(level.as_u8()),
        }
    }

    /// Current tracking level
    pub fn level(&self) -> TrackingLevel {
        TrackingLevel::from_u8(self.level.load(Ordering::Acquire))
    }

    /// Check if tracking has degraded to `Off`
    pub fn is_degraded(&self) -> bool {
        self.level() == TrackingLevel::Off
    }

    /// Degrade tracking to `Off`
    ///
    /// Returns true if this call performed the transition, false if the
    /// context was already degraded.
    pub fn downgrade(&self) -> bool {
        let previous = self
            .level
            .swap(TrackingLevel::Off.as_u8(), Ordering::AcqRel);
        previous != TrackingLevel::Off.as_u8()
    }
}
