//! Per-process page table entries.

use serde::{Deserialize, Serialize};

/// One entry of a process's page table, indexed by virtual page number.
///
/// A non-present entry still means the process owns the virtual page —
/// only residence (a backing physical frame) is lost. `arrival_order` is
/// the FIFO timestamp from the last time this page was loaded; it is
/// meaningless while `present` is `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageTableEntry {
    pub present: bool,
    pub frame_number: Option<u32>,
    pub dirty: bool,
    pub referenced: bool,
    pub arrival_order: u64,
}

impl PageTableEntry {
    pub const fn vacant() -> Self {
        Self {
            present: false,
            frame_number: None,
            dirty: false,
            referenced: false,
            arrival_order: 0,
        }
    }
}

impl Default for PageTableEntry {
    fn default() -> Self {
        Self::vacant()
    }
}
