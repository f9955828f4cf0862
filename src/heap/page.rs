//! Page - Relocation Unit and Address Translation
//!
//! A page is the unit the collector relocates. While a page is being
//! compacted away, stale pointers into it are translated through the
//! page's forwarding table:
//!
//! - `forward_object` is the strict path: the caller already knows the
//!   object was relocated, so a missing entry is a bug.
//! - `relocate_object` is the lenient path: a missing entry means the
//!   object has not moved (or is pinned) and the original address is
//!   still authoritative.
//!
//! Table lifecycle: installed by `begin_relocation` (exclusive access,
//! the surrounding collector's pause), populated concurrently by the
//! single relocating thread via `record_relocation`, torn down by
//! `complete_relocation` once every live object has moved and no stale
//! pointers remain.

use crate::contract_assert;
use crate::heap::VirtualRange;
use crate::relocate::ForwardingTable;
use crate::util::constants::{
    LARGE_ALIGNMENT_SHIFT, LARGE_PAGE_GRANULE, MEDIUM_ALIGNMENT_SHIFT, MEDIUM_PAGE_SIZE,
    SMALL_ALIGNMENT_SHIFT, SMALL_PAGE_SIZE,
};
use crate::util::Alignment;
use serde::Serialize;

/// Page size class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PageKind {
    /// 2MB page, 8-byte object alignment
    Small,
    /// 32MB page, 512-byte object alignment
    Medium,
    /// One object, sized in 2MB granules, 2MB object alignment
    Large,
}

impl PageKind {
    /// Object alignment shift for this size class
    ///
    /// `from_index = (address - page_start) >> shift`. The shifts are
    /// chosen so the largest per-page index fits the forwarding table's
    /// from_index field.
    pub fn alignment_shift(self) -> u32 {
        match self {
            Self::Small => SMALL_ALIGNMENT_SHIFT,
            Self::Medium => MEDIUM_ALIGNMENT_SHIFT,
            Self::Large => LARGE_ALIGNMENT_SHIFT,
        }
    }

    /// Fixed page size, if this class has one
    pub fn fixed_size(self) -> Option<u64> {
        match self {
            Self::Small => Some(SMALL_PAGE_SIZE),
            Self::Medium => Some(MEDIUM_PAGE_SIZE),
            Self::Large => None,
        }
    }
}

/// Page - one relocatable unit of the heap
pub struct Page {
    /// Size class
    kind: PageKind,

    /// Address range backing this page
    virtual_range: VirtualRange,

    /// Forwarding table, present only during relocation
    forwarding: Option<ForwardingTable>,
}

impl Page {
    /// Create a page over `virtual_range`
    ///
    /// The range must match the size class: exactly 2MB for small,
    /// exactly 32MB for medium, a non-zero multiple of the 2MB granule
    /// for large. The start address must be aligned to the class's
    /// object alignment.
    pub fn new(kind: PageKind, virtual_range: VirtualRange) -> Self {
        match kind.fixed_size() {
            Some(size) => {
                contract_assert!(
                    virtual_range.size == size,
                    "{:?} page must span exactly {:#x} bytes, got {:#x}",
                    kind,
                    size,
                    virtual_range.size
                );
            }
            None => {
                contract_assert!(
                    Alignment::is_aligned(virtual_range.size, LARGE_PAGE_GRANULE),
                    "large page size {:#x} must be a multiple of the {:#x} granule",
                    virtual_range.size,
                    LARGE_PAGE_GRANULE
                );
            }
        }
        contract_assert!(
            Alignment::is_shift_aligned(virtual_range.start, kind.alignment_shift()),
            "page start {:#x} not aligned for {:?}",
            virtual_range.start,
            kind
        );

        Self {
            kind,
            virtual_range,
            forwarding: None,
        }
    }

    /// Size class
    pub fn kind(&self) -> PageKind {
        self.kind
    }

    /// Start address
    pub fn start(&self) -> u64 {
        self.virtual_range.start
    }

    /// Size in bytes
    pub fn size(&self) -> u64 {
        self.virtual_range.size
    }

    /// Backing address range
    pub fn virtual_range(&self) -> VirtualRange {
        self.virtual_range
    }

    /// Object alignment shift for this page
    pub fn alignment_shift(&self) -> u32 {
        self.kind.alignment_shift()
    }

    /// Check if an address lies inside this page
    pub fn contains(&self, address: u64) -> bool {
        self.virtual_range.contains(address)
    }

    /// Compute the forwarding index of an in-page address
    fn from_index(&self, address: u64) -> u64 {
        contract_assert!(
            self.contains(address),
            "address {:#x} outside page [{:#x}+{:#x})",
            address,
            self.start(),
            self.size()
        );
        (address - self.start()) >> self.alignment_shift()
    }

    /// Install the forwarding table for a relocation cycle
    ///
    /// Takes `&mut self`: the table is installed while the collector
    /// holds the world paused, before any concurrent reader can probe
    /// it. Installing twice is a bug.
    pub fn begin_relocation(&mut self, live_objects: usize) {
        contract_assert!(
            self.forwarding.is_none(),
            "page {:#x} already relocating",
            self.start()
        );
        self.forwarding = Some(ForwardingTable::for_live_objects(live_objects));
        log::debug!(
            "page {:#x} begins relocation ({} live objects)",
            self.start(),
            live_objects
        );
    }

    /// Tear down the forwarding table after relocation completes
    pub fn complete_relocation(&mut self) {
        contract_assert!(
            self.forwarding.is_some(),
            "page {:#x} is not relocating",
            self.start()
        );
        let table = self.forwarding.take();
        log::debug!(
            "page {:#x} completes relocation ({} entries)",
            self.start(),
            table.map(|t| t.entry_count()).unwrap_or(0)
        );
    }

    /// Check if a relocation cycle is in progress
    pub fn is_relocating(&self) -> bool {
        self.forwarding.is_some()
    }

    /// The page's forwarding table, if relocating
    pub fn forwarding(&self) -> Option<&ForwardingTable> {
        self.forwarding.as_ref()
    }

    /// Record that the object at `from_address` now lives at `to_address`
    ///
    /// Called once per live object by the single relocating thread.
    /// `to_address` must be aligned to this page's object alignment so
    /// it round-trips through the table's offset field.
    pub fn record_relocation(&self, from_address: u64, to_address: u64) {
        let table = self.forwarding.as_ref();
        contract_assert!(
            table.is_some(),
            "page {:#x} has no relocation in progress",
            self.start()
        );
        contract_assert!(
            Alignment::is_shift_aligned(to_address, self.alignment_shift()),
            "relocated address {:#x} not aligned for {:?}",
            to_address,
            self.kind
        );

        let index = self.from_index(from_address);
        table
            .unwrap()
            .insert(index, to_address >> self.alignment_shift());
    }

    /// Translate an address known to have been relocated
    ///
    /// Strict path: asserts the forwarding entry exists. Only call this
    /// when the caller has already guaranteed relocation happened.
    pub fn forward_object(&self, address: u64) -> u64 {
        let table = self.forwarding.as_ref();
        contract_assert!(
            table.is_some(),
            "page {:#x} has no relocation in progress",
            self.start()
        );

        let index = self.from_index(address);
        let to_offset = table.unwrap().find(index);
        contract_assert!(
            to_offset.is_some(),
            "object at {:#x} (index {:#x}) was never relocated",
            address,
            index
        );
        to_offset.unwrap() << self.alignment_shift()
    }

    /// Translate an address that may or may not have been relocated
    ///
    /// Lenient path: a missing entry (or no relocation in progress)
    /// means the object has not moved - possibly pinned - and the
    /// original address is returned unchanged.
    pub fn relocate_object(&self, address: u64) -> u64 {
        let table = match &self.forwarding {
            Some(table) => table,
            None => return address,
        };

        match table.find(self.from_index(address)) {
            Some(to_offset) => to_offset << self.alignment_shift(),
            None => address,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::constants::MB;

    const SMALL_BASE: u64 = 0x2000_0000;
    const DEST_BASE: u64 = 0x4000_0000;

    fn small_page() -> Page {
        Page::new(PageKind::Small, VirtualRange::new(SMALL_BASE, 2 * MB))
    }

    // ========================================================================
    // Construction contracts
    // ========================================================================

    #[test]
    fn test_page_kinds_have_expected_shifts() {
        assert_eq!(PageKind::Small.alignment_shift(), 3);
        assert_eq!(PageKind::Medium.alignment_shift(), 9);
        assert_eq!(PageKind::Large.alignment_shift(), 21);
    }

    #[test]
    #[should_panic(expected = "contract violation")]
    fn test_small_page_wrong_size_panics() {
        let _ = Page::new(PageKind::Small, VirtualRange::new(SMALL_BASE, MB));
    }

    #[test]
    #[should_panic(expected = "contract violation")]
    fn test_large_page_granule_enforced() {
        let _ = Page::new(PageKind::Large, VirtualRange::new(0x4020_0000, 3 * MB));
    }

    #[test]
    fn test_large_page_multiple_granules() {
        let page = Page::new(PageKind::Large, VirtualRange::new(0x4020_0000, 6 * MB));
        assert_eq!(page.size(), 6 * MB);
    }

    // ========================================================================
    // Relocation lifecycle
    // ========================================================================

    #[test]
    fn test_relocation_lifecycle() {
        let mut page = small_page();
        assert!(!page.is_relocating());

        page.begin_relocation(16);
        assert!(page.is_relocating());
        assert!(page.forwarding().is_some());

        page.complete_relocation();
        assert!(!page.is_relocating());
    }

    #[test]
    #[should_panic(expected = "already relocating")]
    fn test_double_begin_relocation_panics() {
        let mut page = small_page();
        page.begin_relocation(16);
        page.begin_relocation(16);
    }

    // ========================================================================
    // Address translation
    // ========================================================================

    #[test]
    fn test_forward_object_returns_relocated_address() {
        let mut page = small_page();
        page.begin_relocation(4);

        let old = SMALL_BASE + 0x40;
        let new = DEST_BASE + 0x80;
        page.record_relocation(old, new);

        assert_eq!(page.forward_object(old), new);
    }

    #[test]
    fn test_relocate_object_falls_back_to_original() {
        let mut page = small_page();
        page.begin_relocation(4);

        let moved = SMALL_BASE + 0x40;
        let pinned = SMALL_BASE + 0x80;
        page.record_relocation(moved, DEST_BASE + 0x100);

        // Relocated object translates; the untouched one is treated as
        // pinned and keeps its address.
        assert_eq!(page.relocate_object(moved), DEST_BASE + 0x100);
        assert_eq!(page.relocate_object(pinned), pinned);
    }

    #[test]
    fn test_relocate_object_before_relocation_is_identity() {
        let page = small_page();
        let address = SMALL_BASE + 0x100;
        assert_eq!(page.relocate_object(address), address);
    }

    #[test]
    #[should_panic(expected = "never relocated")]
    fn test_forward_object_missing_entry_panics() {
        let mut page = small_page();
        page.begin_relocation(4);
        let _ = page.forward_object(SMALL_BASE + 0x40);
    }

    #[test]
    #[should_panic(expected = "no relocation in progress")]
    fn test_forward_object_without_table_panics() {
        let page = small_page();
        let _ = page.forward_object(SMALL_BASE + 0x40);
    }

    #[test]
    #[should_panic(expected = "outside page")]
    fn test_translation_outside_page_panics() {
        let mut page = small_page();
        page.begin_relocation(4);
        let _ = page.relocate_object(SMALL_BASE + 2 * MB);
    }

    #[test]
    fn test_medium_page_alignment_shift_in_translation() {
        let base = 0x6000_0000;
        let mut page = Page::new(PageKind::Medium, VirtualRange::new(base, 32 * MB));
        page.begin_relocation(8);

        // 512-byte object alignment: index strides are 512 bytes.
        let old = base + 3 * 512;
        let new = DEST_BASE + 7 * 512;
        page.record_relocation(old, new);

        assert_eq!(page.forward_object(old), new);
    }

    #[test]
    fn test_translation_under_concurrent_lookups() {
        use std::sync::Arc;

        let mut page = small_page();
        page.begin_relocation(256);
        let page = Arc::new(page);

        let mut readers = Vec::new();
        for _ in 0..2 {
            let page = Arc::clone(&page);
            readers.push(std::thread::spawn(move || {
                for _ in 0..20 {
                    for i in 0..256u64 {
                        let old = SMALL_BASE + i * 8;
                        let translated = page.relocate_object(old);
                        // Either still in place or at its final address.
                        assert!(translated == old || translated == DEST_BASE + i * 8);
                    }
                }
            }));
        }

        for i in 0..256u64 {
            page.record_relocation(SMALL_BASE + i * 8, DEST_BASE + i * 8);
        }

        for reader in readers {
            reader.join().unwrap();
        }
    }
}
