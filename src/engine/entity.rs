//! Entity bookkeeping and id allocation.
//!
//! ## Purpose
//! Entities are stored like any other component: their identity record lives
//! in the entity store and their payload is an [`EntityData`] holding the
//! direct children and the sibling-index byte allocated to each entity child.
//!
//! Ids come from an [`IdAllocator`]. Allocators are plain values owned by a
//! context; contexts that exchange records clone one allocator so their ids
//! never collide.
//!
//! ## Invariants
//! - Sibling-index bytes are in `1..=255` and unique among the children of
//!   one entity.
//! - Only entity children hold a sibling-index byte. Leaf components share
//!   their owner's branch.

use std::cell::Cell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use crate::engine::error::{EcsError, EcsResult};
use crate::engine::types::{ComponentId, SiblingIndex};

/// Payload of an entity: its children and their sibling indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityData {
    children: BTreeSet<ComponentId>,
    branches: HashMap<ComponentId, SiblingIndex>,
}

impl EntityData {
    /// Creates an entity payload with no children.
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct children in id order.
    pub fn children(&self) -> impl DoubleEndedIterator<Item = ComponentId> + '_ {
        self.children.iter().copied()
    }

    /// Number of direct children, entity or not.
    #[inline]
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Returns `true` if `child` is a direct child.
    #[inline]
    pub fn has_child(&self, child: ComponentId) -> bool {
        self.children.contains(&child)
    }

    /// Sibling-index byte allocated to `child`, if it is an entity child.
    #[inline]
    pub fn sibling_index(&self, child: ComponentId) -> Option<SiblingIndex> {
        self.branches.get(&child).copied()
    }

    pub(crate) fn add_child(&mut self, child: ComponentId) -> bool {
        self.children.insert(child)
    }

    /// Removes `child` and frees its sibling-index byte.
    pub(crate) fn remove_child(&mut self, child: ComponentId) -> bool {
        self.branches.remove(&child);
        self.children.remove(&child)
    }

    /// Returns the byte of `child`, allocating the smallest free one if the
    /// child has none yet.
    ///
    /// ## Errors
    /// [`EcsError::SiblingLimit`] when all 255 indices are taken.

    pub(crate) fn allocate_branch(&mut self, parent: ComponentId, child: ComponentId) -> EcsResult<SiblingIndex> {
        if let Some(index) = self.sibling_index(child) {
            return Ok(index);
        }
        let index = self.next_free_index().ok_or(EcsError::SiblingLimit { parent })?;
        self.branches.insert(child, index);
        Ok(index)
    }

    /// Smallest index in `1..=255` not held by any child.
    pub(crate) fn next_free_index(&self) -> Option<SiblingIndex> {
        let mut used = [false; 256];
        for &index in self.branches.values() {
            used[index as usize] = true;
        }
        (1..=SiblingIndex::MAX).find(|&index| !used[index as usize])
    }

    /// Forgets every allocated byte so they can be reassigned.
    pub(crate) fn reset_branches(&mut self) {
        self.branches.clear();
    }
}

/// Source of unique component and entity ids.
///
/// Cloning shares the counter. Handles are single-threaded, like the
/// contexts that hold them.

#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    next: Rc<Cell<ComponentId>>,
}

impl IdAllocator {
    /// Creates an allocator starting at id 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an allocator whose first id is `first`.
    pub fn starting_at(first: ComponentId) -> Self {
        Self { next: Rc::new(Cell::new(first)) }
    }

    /// Returns a fresh id.
    #[inline]
    pub fn next_id(&self) -> ComponentId {
        let id = self.next.get();
        self.next.set(id + 1);
        id
    }

    /// Id the next call to [`next_id`](Self::next_id) would return.
    pub fn peek(&self) -> ComponentId {
        self.next.get()
    }

    /// Returns `true` if both handles draw from the same counter.
    pub fn shares_counter_with(&self, other: &IdAllocator) -> bool {
        Rc::ptr_eq(&self.next, &other.next)
    }
}
