//! # Memtrack - Memory Bookkeeping Engines
//!
//! Memtrack implements the two bookkeeping engines a managed runtime's
//! memory subsystem leans on, as standalone data structures:
//!
//! - **Native memory tracking**: which sub-ranges of each reserved
//!   virtual-memory range are committed, and which call sites allocate
//!   how much - the state a diagnostic tool renders as
//!   `"<tag> (reserved=<N>KB, committed=<M>KB)"` lines.
//! - **Relocation forwarding**: per-page tables translating stale object
//!   addresses to their post-compaction locations, safe for lock-free
//!   readers racing the single relocating thread.
//!
//! The crate does not map memory and does not run a collector. Commit,
//! uncommit, malloc and relocation events arrive from the outside as
//! plain integers; memtrack accounts for them.
//!
//! ## Quick Start
//!
//! ```rust
//! fn main() -> Result<(), memtrack::Error> {
//!     let tracker = memtrack::init()?;
//!
//!     // The allocator reports a 256KB reservation, then commits
//!     // three 32KB-unit ranges that merge into one region.
//!     tracker.reserve(0x1000_0000, 256 * 1024, "Test");
//!     tracker.commit(0x1000_0000, 0, 96 * 1024);
//!     tracker.commit(0x1000_0000, 128 * 1024, 96 * 1024);
//!     tracker.commit(0x1000_0000, 64 * 1024, 96 * 1024);
//!
//!     assert_eq!(tracker.total_committed(), 224 * 1024);
//!     println!("{}", tracker.report());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────┐   ┌──────────────────────────────┐
//! │       Allocator (external)    │   │   Collector (external)       │
//! │  reserve/commit/uncommit      │   │  relocation phase            │
//! │  malloc events                │   │                              │
//! └──────────────┬───────────────┘   └──────────────┬───────────────┘
//!                │                                   │
//!                ▼                                   ▼
//! ┌──────────────────────────────┐   ┌──────────────────────────────┐
//! │        MemoryTracker          │   │            Page              │
//! │  ┌────────────────────────┐  │   │  ┌────────────────────────┐  │
//! │  │ ReservedRange          │  │   │  │ ForwardingTable        │  │
//! │  │   └─ RegionLedger      │  │   │  │  (single writer,       │  │
//! │  ├────────────────────────┤  │   │  │   lock-free readers)   │  │
//! │  │ MallocSiteTable        │  │   │  └────────────────────────┘  │
//! │  ├────────────────────────┤  │   │  forward_object (strict)     │
//! │  │ TrackingContext        │  │   │  relocate_object (lenient)   │
//! │  └────────────────────────┘  │   └──────────────────────────────┘
//! │        report() ──► tooling   │   ┌──────────────────────────────┐
//! └──────────────────────────────┘   │  PageAllocator ── Partitions  │
//!                                     │  capacity()/used() sums      │
//!                                     └──────────────────────────────┘
//! ```
//!
//! ## Concurrency
//!
//! - `MemoryTracker` is `Send + Sync`; one internal mutex serializes all
//!   ledger mutation and gives readers consistent snapshots.
//! - `ForwardingTable` reads are lock-free: entries are single packed
//!   words published with release stores, so a racing reader sees
//!   either "empty" or a complete entry, never a torn one.
//! - Partition counters are atomics updated by the external allocation
//!   path; the reporting surface only reads.
//!
//! ## Modules
//!
//! - [`config`]: tracker configuration and validation
//! - [`error`]: error types and the contract-assert macro
//! - [`heap`]: pages, address translation, partitioned allocator ledger
//! - [`relocate`]: forwarding tables
//! - [`tracking`]: region ledgers, malloc-site table, tracker, reports
//! - [`util`]: alignment, atomic and hash helpers

pub mod config;
pub mod error;
pub mod heap;
pub mod relocate;
pub mod tracking;
pub mod util;

pub use config::TrackerConfig;
pub use error::{Error, Result};
pub use heap::{Page, PageAllocator, PageKind, VirtualRange};
pub use relocate::ForwardingTable;
pub use tracking::{MemoryTracker, TrackingLevel};

/// Memtrack version string from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Create a memory tracker with default configuration
///
/// # Errors
/// `Configuration` if the default configuration is invalid for this
/// platform (should not happen).
pub fn init() -> Result<MemoryTracker> {
    MemoryTracker::new(TrackerConfig::default())
}

/// Create a memory tracker with custom configuration
///
/// # Arguments
/// * `config` - Tracker configuration parameters
///
/// # Errors
/// `Configuration` if the configuration fails validation.
pub fn init_with_config(config: TrackerConfig) -> Result<MemoryTracker> {
    MemoryTracker::new(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_default() {
        assert!(init().is_ok());
    }

    #[test]
    fn test_init_rejects_invalid_config() {
        let config = TrackerConfig {
            site_table_capacity: 0,
            ..Default::default()
        };
        assert!(init_with_config(config).is_err());
    }

    #[test]
    fn test_version_not_empty() {
        assert!(!VERSION.is_empty());
    }
}
