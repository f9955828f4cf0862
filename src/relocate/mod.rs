//! Relocate Module - Object Relocation Bookkeeping
//!
//! During concurrent compaction, objects move while mutators keep
//! running. The forwarding table is the bookkeeping that makes this
//! safe: one table per page under relocation, mapping each relocated
//! object's original offset to its new location.
//!
//! Read paths are lock-free. A single relocating thread populates the
//! table; any number of readers translate possibly-stale pointers
//! through it concurrently. A reader that finds no entry treats the
//! object as not yet moved and keeps using the original address.

pub mod forwarding;

pub use forwarding::{ForwardingDump, ForwardingTable};
