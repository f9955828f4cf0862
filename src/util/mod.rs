//! Util Module - Shared Utilities
//!
//! Utilities and helper functions used throughout memtrack.

pub mod alignment;
pub mod atomic;
pub mod hash;

pub use alignment::Alignment;
pub use atomic::AtomicUtils;

/// Constants for memtrack
pub mod constants {
    /// 1 Kilobyte
    pub const KB: u64 = 1024;
    /// 1 Megabyte
    pub const MB: u64 = 1024 * 1024;
    /// 1 Gigabyte
    pub const GB: u64 = 1024 * 1024 * 1024;

    /// Small page size: 2MB
    pub const SMALL_PAGE_SIZE: u64 = 2 * MB;
    /// Medium page size: 32MB
    pub const MEDIUM_PAGE_SIZE: u64 = 32 * MB;
    /// Granule for large pages: 2MB
    pub const LARGE_PAGE_GRANULE: u64 = 2 * MB;

    /// Object alignment shift in small pages (8 bytes)
    pub const SMALL_ALIGNMENT_SHIFT: u32 = 3;
    /// Object alignment shift in medium pages (512 bytes)
    pub const MEDIUM_ALIGNMENT_SHIFT: u32 = 9;
    /// Object alignment shift in large pages (2MB)
    pub const LARGE_ALIGNMENT_SHIFT: u32 = 21;
}
