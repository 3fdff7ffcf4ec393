//! Textual listings of core memory.

use crate::MemoryCore;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One listed cell.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ListingRow {
    /// Absolute address.
    pub address: usize,
    /// Canonical instruction text, e.g. `MOV.I $0, $1`.
    pub text: String,
    /// Pid of the last writer.
    pub owner: u32,
}

/// Lists `count` cells starting at `start`, wrapping at the end of the core.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn listing(core: &MemoryCore, start: usize, count: usize) -> Vec<ListingRow> {
    (0..count.min(core.size()))
        .map(|offset| {
            let address = core.relative_address(start, offset as i64, 0);
            let cell = core.load_relative(address, 0, 0);
            ListingRow {
                address,
                text: cell.to_string(),
                owner: cell.pid,
            }
        })
        .collect()
}

/// Lists `before` cells before `center`, the center cell and `after` cells after it.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn listing_around(core: &MemoryCore, center: usize, before: usize, after: usize) -> Vec<ListingRow> {
    let start = core.relative_address(center, -(before as i64), 0);
    listing(core, start, before + 1 + after)
}
