//! Error Module - Memtrack Error Types
//!
//! Defines all error types used in memtrack.
//!
//! # Error Categories
//!
//! ## Reported conditions
//! - `SiteTableOverflow` - malloc-site bucket exhaustion, degrades tracking
//!
//! ## Configuration errors
//! - `Configuration` - invalid configuration
//! - `InvalidArgument` - invalid function argument
//!
//! ## Bugs
//! - `Internal` - invariant violation detected by a consistency check
//!
//! Contract violations (out-of-range commit/uncommit, unknown reservation
//! base, strict lookup of an absent forwarding entry) are caller bugs, not
//! runtime conditions, and fail fast through [`contract_assert!`] rather
//! than flowing through this type.

use thiserror::Error;

/// Main error type for all memtrack operations
#[derive(Debug, Error)]
pub enum Error {
    /// Malloc-site table bucket overflow
    ///
    /// **When returned:** A probe sequence exceeded the configured bound
    /// while recording a new call site, or a new site arrived after the
    /// table already degraded.
    ///
    /// **Recovery strategy:** None required - tracking degrades, the
    /// allocation that triggered the overflow proceeds normally.
    #[error("Malloc-site table overflow: probe bound exceeded")]
    SiteTableOverflow,

    /// Configuration error
    ///
    /// **When returned:** Invalid tracker configuration detected
    ///
    /// **Recovery strategy:** Use default configuration or fail fast
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid argument
    ///
    /// **When returned:** Function argument fails validation
    ///
    /// **Recovery strategy:** Fix caller to provide valid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Internal error - indicates a bug in memtrack
    ///
    /// **When returned:** A consistency check found a broken invariant
    ///
    /// **Recovery strategy:** Cannot recover - this is a bug
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::SiteTableOverflow)
    }

    /// Check if this error indicates a bug in the code
    pub fn is_bug(&self) -> bool {
        matches!(self, Error::Internal(_))
    }
}

/// Result type alias for memtrack operations
pub type Result<T> = std::result::Result<T, Error>;

/// Assert a caller contract, panicking with context on violation
///
/// Used on consistency-critical paths where a bad argument means the
/// caller is buggy and continuing would corrupt bookkeeping state.
#[macro_export]
macro_rules! contract_assert {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            panic!("contract violation ({}): {}", stringify!($cond), format!($($arg)+));
        }
    };
}
