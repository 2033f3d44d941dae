//! Core identifiers, constants and the packed branch layout.
//!
//! This module defines the small, copyable numeric types shared by every
//! other part of the engine, together with the bit layout of the
//! hierarchy path ("branch") carried by each component identity.
//!
//! ## Branch layout
//!
//! A branch is a `u64` split into eight sibling-index bytes. Level 0 lives in
//! the most significant byte, level 7 in the least significant byte:
//!
//! ```text
//! | level 0 | level 1 | level 2 | level 3 | level 4 | level 5 | level 6 | level 7 |
//! | [63:56] | [55:48] | [47:40] | [39:32] | [31:24] | [23:16] | [15:8]  | [7:0]   |
//! ```
//!
//! An entity at depth `d` has bytes `0..d` populated and every lower byte
//! zero. Each populated byte is in `1..=255` and unique among the siblings of
//! the same parent, so:
//!
//! - an ancestor's branch is a numeric prefix of its descendants' branches,
//! - ancestors sort before descendants, and a sibling sorts after every
//!   descendant of the siblings allocated before it.
//!
//! The layout is a hard structural limit: at most [`MAX_DEPTH`] levels and at
//! most [`MAX_SIBLINGS`] entity children per parent. Exceeding either is
//! reported as an error, never wrapped.

/// Unique identifier of a component or entity.
pub type ComponentId = u64;

/// Identifier of a tree. Always the id of the tree's root record.
pub type TreeId = ComponentId;

/// Cross-tree ordering key. Lower values sort first.
pub type Priority = u64;

/// Packed sibling path, see the module docs.
pub type Branch = u64;

/// Distance from the tree root.
pub type Depth = u8;

/// Sibling index byte stored at one branch level.
pub type SiblingIndex = u8;

/// Position of a store inside a context's catalog.
pub type StoreIndex = usize;

/// Backward offset, within one store, to the nearest strict ancestor record.
/// Zero means the record has no ancestor of the same type.
pub type ParentLoc = usize;

/// Backing capacity of a freshly created store.
pub const DEFAULT_STORE_CAPACITY: usize = 4;

/// Priority assigned to trees that never had one set. Sorts last.
pub const LOWEST_PRIORITY: Priority = Priority::MAX;

/// Number of sibling-index levels available in a [`Branch`].
pub const MAX_DEPTH: Depth = 8;

/// Number of distinct sibling indices per level (`1..=255`).
pub const MAX_SIBLINGS: usize = 255;

const LEVEL_BITS: u32 = 8;

const _: () = assert!((MAX_DEPTH as u32) * LEVEL_BITS == Branch::BITS);

/// Bit offset of the byte for `level` inside a branch.
#[inline]
const fn level_shift(level: Depth) -> u32 {
    Branch::BITS - LEVEL_BITS * (level as u32 + 1)
}

/// Returns the mask that keeps the top `depth` levels of a branch.
///
/// `prefix_mask(0)` is zero (every branch shares the empty prefix) and
/// `prefix_mask(MAX_DEPTH)` keeps the whole value.
#[inline]
pub const fn prefix_mask(depth: Depth) -> Branch {
    if depth == 0 {
        0
    } else if depth >= MAX_DEPTH {
        Branch::MAX
    } else {
        !(Branch::MAX >> (LEVEL_BITS * depth as u32))
    }
}

/// Reads the sibling index stored at `level`.
#[inline]
pub const fn sibling_at(branch: Branch, level: Depth) -> SiblingIndex {
    debug_assert!(level < MAX_DEPTH);
    ((branch >> level_shift(level)) & 0xFF) as SiblingIndex
}

/// Returns `branch` with the byte at `level` replaced by `index`.
#[inline]
pub const fn with_sibling(branch: Branch, level: Depth, index: SiblingIndex) -> Branch {
    debug_assert!(level < MAX_DEPTH);
    let shift = level_shift(level);
    (branch & !(0xFF << shift)) | ((index as Branch) << shift)
}
