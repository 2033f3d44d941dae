//! Component identity records and hierarchy ordering.
//!
//! Every component and entity carries a [`ComponentInfo`]: its id, the
//! parent that owns it, and where it sits inside its tree. Stores keep their
//! records sorted by [`SortKey`], which is derived from the info plus the
//! priority of the record's tree.
//!
//! Priorities live outside the record in a [`TreePriorities`] table owned by
//! the context, so reprioritizing a whole tree is a single table write plus
//! one block move per store.

use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::engine::types::{
    Branch, ComponentId, Depth, Priority, TreeId, LOWEST_PRIORITY, prefix_mask,
};

/// Identity and hierarchy position of one component or entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ComponentInfo {
    /// Unique id.
    pub id: ComponentId,
    /// Owning entity, if attached.
    pub parent: Option<ComponentId>,
    /// Entities own a child set and may be parents.
    pub is_entity: bool,
    /// Id of the root of the tree this record belongs to.
    pub tree: TreeId,
    /// Distance from the tree root. Leaf components share their owner's depth.
    pub depth: Depth,
    /// Packed sibling path, see [`crate::engine::types`].
    pub branch: Branch,
}

impl ComponentInfo {
    /// Creates a detached, non-entity record that is the root of its own tree.
    #[inline]
    pub fn new(id: ComponentId) -> Self {
        Self { id, parent: None, is_entity: false, tree: id, depth: 0, branch: 0 }
    }

    /// Creates a detached entity record.
    #[inline]
    pub fn entity(id: ComponentId) -> Self {
        Self { is_entity: true, ..Self::new(id) }
    }

    /// Returns `true` when the record heads its own tree.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.tree == self.id
    }

    /// Puts the record back at the root of its own tree.
    pub fn reset_to_root(&mut self) {
        self.parent = None;
        self.tree = self.id;
        self.depth = 0;
        self.branch = 0;
    }

    /// Returns `true` if `self` lies strictly below `other` in the same tree.
    ///
    /// Holds when both share a tree, `self` is deeper, and the top
    /// `other.depth` branch levels agree.
    #[inline]
    pub fn is_descendant_of(&self, other: &ComponentInfo) -> bool {
        if self.tree != other.tree || self.depth <= other.depth {
            return false;
        }
        let mask = prefix_mask(other.depth);
        (self.branch & mask) == (other.branch & mask)
    }

    /// Sort key of this record under the given tree priority.
    #[inline]
    pub fn sort_key(&self, priority: Priority) -> SortKey {
        SortKey { priority, tree: self.tree, branch: self.branch }
    }
}

/// Total order of records inside a store.
///
/// Field order drives the derived `Ord`: priority first, then tree, then
/// branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SortKey {
    /// Priority of the record's tree.
    pub priority: Priority,
    /// Tree id.
    pub tree: TreeId,
    /// Position within the tree.
    pub branch: Branch,
}

impl SortKey {
    /// Bucket part of the key, shared by every record of one tree.
    #[inline]
    pub fn bucket(&self) -> (Priority, TreeId) {
        (self.priority, self.tree)
    }
}

/// Side table mapping trees to their priority.
///
/// Unknown trees report [`LOWEST_PRIORITY`], so freshly created trees sort
/// after every prioritized one.
#[derive(Debug, Clone, Default)]
pub struct TreePriorities {
    priorities: HashMap<TreeId, Priority>,
}

impl TreePriorities {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Priority of `tree`.
    #[inline]
    pub fn get(&self, tree: TreeId) -> Priority {
        self.priorities.get(&tree).copied().unwrap_or(LOWEST_PRIORITY)
    }

    /// Sets the priority of `tree`, returning the previous value.
    pub fn set(&mut self, tree: TreeId, priority: Priority) -> Priority {
        self.priorities.insert(tree, priority).unwrap_or(LOWEST_PRIORITY)
    }

    /// Forgets `tree`, so it falls back to [`LOWEST_PRIORITY`].
    pub fn remove(&mut self, tree: TreeId) -> Option<Priority> {
        self.priorities.remove(&tree)
    }

    /// Returns `true` if `tree` has an explicit priority.
    pub fn contains(&self, tree: TreeId) -> bool {
        self.priorities.contains_key(&tree)
    }

    /// Iterates over explicitly prioritized trees.
    pub fn iter(&self) -> impl Iterator<Item = (TreeId, Priority)> + '_ {
        self.priorities.iter().map(|(&tree, &priority)| (tree, priority))
    }
}
