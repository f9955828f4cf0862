//! Forwarding Table - Offset Mapping During Relocation
//!
//! A fixed-size, power-of-two, open-addressed table from an object's
//! pre-relocation offset index to its post-relocation offset. One table
//! per page under relocation.
//!
//! Structure:
//! - Each slot is a single `AtomicU64` holding a packed entry
//! - Linear probing with `& (len - 1)` masking, wrapping
//! - Slots transition once from empty to populated and never change
//!
//! Concurrency:
//! - Exactly one writer per table (the relocating thread)
//! - Any number of lock-free readers racing the writer
//! - An entry is published with one `Release` store of the whole packed
//!   word; an `Acquire` load therefore observes either "empty" or a
//!   complete entry, never a torn one
//!
//! Entry layout:
//! ```text
//! ┌────────────────┬──────────────────────┬───────────┐
//! │ from_index     │ to_offset            │ populated │
//! │ bits 46-63     │ bits 1-45            │ bit 0     │
//! └────────────────┴──────────────────────┴───────────┘
//! ```

use crate::contract_assert;
use crate::util::hash;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

const POPULATED_BIT: u64 = 1;

const TO_OFFSET_SHIFT: u32 = 1;
const TO_OFFSET_BITS: u32 = 45;
const TO_OFFSET_MASK: u64 = (1 << TO_OFFSET_BITS) - 1;

const FROM_INDEX_SHIFT: u32 = 46;
const FROM_INDEX_BITS: u32 = 18;
const FROM_INDEX_MASK: u64 = (1 << FROM_INDEX_BITS) - 1;

/// Maximum from_index a table entry can hold
pub const MAX_FROM_INDEX: u64 = FROM_INDEX_MASK;

/// Maximum to_offset a table entry can hold
pub const MAX_TO_OFFSET: u64 = TO_OFFSET_MASK;

#[inline]
fn encode(from_index: u64, to_offset: u64) -> u64 {
    POPULATED_BIT | (to_offset << TO_OFFSET_SHIFT) | (from_index << FROM_INDEX_SHIFT)
}

#[inline]
fn entry_from_index(raw: u64) -> u64 {
    (raw >> FROM_INDEX_SHIFT) & FROM_INDEX_MASK
}

#[inline]
fn entry_to_offset(raw: u64) -> u64 {
    (raw >> TO_OFFSET_SHIFT) & TO_OFFSET_MASK
}

/// ForwardingTable - per-page relocation offset map
///
/// Sized before relocation starts via [`ForwardingTable::for_live_objects`]
/// so that at least half the slots stay empty; probes for absent
/// indices then always terminate at an empty slot.
pub struct ForwardingTable {
    /// Packed entries; length is a power of two
    slots: Box<[AtomicU64]>,

    /// `len - 1`, for mask-based wrapping
    mask: u64,
}

impl ForwardingTable {
    /// Create a table with exactly `len` slots
    ///
    /// `len` must be a non-zero power of two.
    pub fn new(len: usize) -> Self {
        contract_assert!(
            len > 0 && len.is_power_of_two(),
            "forwarding table length {} must be a power of two",
            len
        );
        let slots = (0..len).map(|_| AtomicU64::new(0)).collect::<Vec<_>>();
        Self {
            slots: slots.into_boxed_slice(),
            mask: (len - 1) as u64,
        }
    }

    /// Create a table sized for `live_objects` relocations
    ///
    /// Allocates the next power of two at or above twice the live
    /// count, keeping the load factor at or below one half.
    pub fn for_live_objects(live_objects: usize) -> Self {
        let len = (live_objects.max(1) * 2).next_power_of_two();
        Self::new(len)
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the table has no populated slots
    pub fn is_empty(&self) -> bool {
        self.entry_count() == 0
    }

    #[inline]
    fn first_slot(&self, from_index: u64) -> u64 {
        // The hash deliberately mixes only the low 32 bits of the index.
        u64::from(hash::uint64_to_uint32(from_index)) & self.mask
    }

    #[inline]
    fn next_slot(&self, slot: u64) -> u64 {
        (slot + 1) & self.mask
    }

    /// Look up the relocated offset for `from_index`
    ///
    /// Probes linearly from the home slot until a matching entry (hit)
    /// or an empty slot (miss). Lock-free; safe to call while the
    /// writer is inserting. A miss means the object has not been
    /// relocated yet - callers fall back to the original address.
    pub fn find(&self, from_index: u64) -> Option<u64> {
        let mut slot = self.first_slot(from_index);

        for _ in 0..self.slots.len() {
            let raw = self.slots[slot as usize].load(Ordering::Acquire);
            if raw == 0 {
                return None;
            }
            if entry_from_index(raw) == from_index {
                return Some(entry_to_offset(raw));
            }
            slot = self.next_slot(slot);
        }

        // Full cycle without an empty slot; only reachable if the
        // table was filled to capacity, which sizing prevents.
        None
    }

    /// Insert the mapping `from_index -> to_offset`
    ///
    /// Called by the single relocating thread for this table's page,
    /// once per relocated live object. Uses the same probe sequence as
    /// `find` and publishes the packed entry with a `Release` store
    /// into the first empty slot.
    ///
    /// Inserting a duplicate `from_index`, overflowing the field
    /// widths, or filling the table completely are caller bugs.
    pub fn insert(&self, from_index: u64, to_offset: u64) {
        contract_assert!(
            from_index <= MAX_FROM_INDEX,
            "from_index {:#x} exceeds field width",
            from_index
        );
        contract_assert!(
            to_offset <= MAX_TO_OFFSET,
            "to_offset {:#x} exceeds field width",
            to_offset
        );

        let mut slot = self.first_slot(from_index);

        for _ in 0..self.slots.len() {
            let raw = self.slots[slot as usize].load(Ordering::Relaxed);
            if raw == 0 {
                self.slots[slot as usize].store(encode(from_index, to_offset), Ordering::Release);
                return;
            }
            contract_assert!(
                entry_from_index(raw) != from_index,
                "duplicate insert of from_index {:#x}",
                from_index
            );
            slot = self.next_slot(slot);
        }

        panic!(
            "contract violation: forwarding table of {} slots is full",
            self.slots.len()
        );
    }

    /// Count populated slots
    ///
    /// Diagnostic only; may race an in-flight insert and miss it.
    pub fn entry_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.load(Ordering::Relaxed) != 0)
            .count()
    }

    /// Enumerate populated entries with probe diagnostics
    ///
    /// For tooling, not the hot path. Recomputes each entry's home slot
    /// from the hash so probe displacement is visible. May benignly
    /// race the writer and miss an in-flight insert.
    pub fn dump(&self) -> Vec<ForwardingDump> {
        let len = self.slots.len() as u64;
        let mut entries = Vec::new();

        for (index, slot) in self.slots.iter().enumerate() {
            let raw = slot.load(Ordering::Acquire);
            if raw == 0 {
                continue;
            }

            let from_index = entry_from_index(raw);
            let home_slot = self.first_slot(from_index);
            let probe_distance = (index as u64).wrapping_sub(home_slot) & self.mask;

            entries.push(ForwardingDump {
                slot: index,
                home_slot: home_slot as usize,
                probe_distance: probe_distance as usize,
                from_index,
                to_offset: entry_to_offset(raw),
            });
            debug_assert!(probe_distance < len);
        }

        entries
    }
}

/// One populated slot as reported by [`ForwardingTable::dump`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ForwardingDump {
    /// Slot the entry landed in
    pub slot: usize,
    /// Slot the hash maps the index to
    pub home_slot: usize,
    /// Distance probed past the home slot
    pub probe_distance: usize,
    /// Original offset index
    pub from_index: u64,
    /// Relocated offset
    pub to_offset: u64,
}
