//! Configuration Module - Tracker Tuning Parameters
//!
//! Manages all configuration parameters for memtrack.
//! Most parameters have sensible defaults.

use crate::error::{Error, Result};
use crate::tracking::TrackingLevel;
use crate::util::constants::{MB, SMALL_PAGE_SIZE};
use crate::util::Alignment;

/// Main configuration for the memory tracker and page-allocator ledger
///
/// # Examples
///
/// ```rust
/// use memtrack::TrackerConfig;
///
/// // Use default configuration
/// let config = TrackerConfig::default();
///
/// // Custom configuration for a small deployment
/// let config = TrackerConfig {
///     site_table_capacity: 64,
///     site_probe_limit: 8,
///     partition_count: 2,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Number of slots in the malloc-site table
    ///
    /// Fixed for the lifetime of the tracker; the table never grows.
    /// Default: 511
    pub site_table_capacity: usize,

    /// Probe-sequence bound for the malloc-site table
    ///
    /// A record() that probes this many slots without finding space
    /// overflows the bucket and downgrades tracking. The real threshold
    /// is platform-dependent in the system this models, so it is a
    /// parameter rather than a constant.
    ///
    /// Default: 16
    pub site_probe_limit: usize,

    /// Initial tracking level
    ///
    /// Either `Detail` or `Summary`; both degrade to `Off` on
    /// site-table overflow and never recover.
    ///
    /// Default: `Detail`
    pub tracking_level: TrackingLevel,

    /// Number of NUMA partitions in the page-allocator ledger
    ///
    /// Default: min(available CPUs, 8)
    pub partition_count: usize,

    /// Maximum capacity per partition in bytes
    ///
    /// Must be a multiple of the small page size.
    /// Default: 256MB
    pub partition_max_capacity: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            site_table_capacity: 511,
            site_probe_limit: 16,
            tracking_level: TrackingLevel::Detail,
            partition_count: num_cpus::get().clamp(1, 8),
            partition_max_capacity: 256 * MB,
        }
    }
}

impl TrackerConfig {
    /// Validate configuration parameters
    ///
    /// # Errors
    /// `Configuration` describing the first invalid parameter found.
    pub fn validate(&self) -> Result<()> {
        if self.site_table_capacity == 0 {
            return Err(Error::Configuration(
                "site_table_capacity must be greater than zero".to_string(),
            ));
        }

        if self.site_probe_limit == 0 || self.site_probe_limit > self.site_table_capacity {
            return Err(Error::Configuration(format!(
                "site_probe_limit {} must be in 1..={}",
                self.site_probe_limit, self.site_table_capacity
            )));
        }

        if self.tracking_level == TrackingLevel::Off {
            return Err(Error::Configuration(
                "tracking_level cannot start at Off".to_string(),
            ));
        }

        if self.partition_count == 0 {
            return Err(Error::Configuration(
                "partition_count must be at least 1".to_string(),
            ));
        }

        if self.partition_max_capacity == 0
            || !Alignment::is_aligned(self.partition_max_capacity, SMALL_PAGE_SIZE)
        {
            return Err(Error::Configuration(format!(
                "partition_max_capacity {} must be a non-zero multiple of {}",
                self.partition_max_capacity, SMALL_PAGE_SIZE
            )));
        }

        Ok(())
    }
}
