//! Atomic Utilities
//!
//! Helper functions for atomic counter maintenance.

use std::sync::atomic::{AtomicU64, Ordering};

/// AtomicUtils - utility for atomic operations
pub struct AtomicUtils;

impl AtomicUtils {
    /// Atomic fetch-add with saturation
    ///
    /// Does not overflow, saturates at max value.
    /// Returns the previous value.
    pub fn saturating_add(atomic: &AtomicU64, value: u64) -> u64 {
        let mut current = atomic.load(Ordering::Relaxed);

        loop {
            let new_value = current.saturating_add(value);

            match atomic.compare_exchange_weak(
                current,
                new_value,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return current,
                Err(actual) => current = actual,
            }
        }
    }

    /// Atomic fetch-sub with saturation
    ///
    /// Does not underflow, saturates at zero.
    /// Returns the previous value.
    pub fn saturating_sub(atomic: &AtomicU64, value: u64) -> u64 {
        let mut current = atomic.load(Ordering::Relaxed);

        loop {
            let new_value = current.saturating_sub(value);

            match atomic.compare_exchange_weak(
                current,
                new_value,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return current,
                Err(actual) => current = actual,
            }
        }
    }

    /// Raise a high-water mark to `candidate` if it is larger
    pub fn update_max(atomic: &AtomicU64, candidate: u64) {
        let mut current = atomic.load(Ordering::Relaxed);
        while candidate > current {
            match atomic.compare_exchange_weak(
                current,
                candidate,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }
}
