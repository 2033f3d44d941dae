//! Sorted per-type component storage and type-erased access.
//!
//! This module implements [`ComponentStore<T>`], a dense container holding
//! every component of one type together with its [`ComponentInfo`], and the
//! [`ErasedStore`] trait used by the context to manage heterogeneous stores
//! behind `Box<dyn ErasedStore>`.
//!
//! # Storage model
//!
//! A store keeps four parallel vectors indexed by position:
//!
//! ```text
//! infos:       [ComponentInfo; len]
//! data:        [T; len]
//! keys:        [SortKey; len]      cached (priority, tree, branch)
//! parent_locs: [ParentLoc; len]
//! ```
//!
//! Records are ordered by [`SortKey`]. Within one tree this is a depth-first
//! preorder, so each tree occupies a single contiguous span. Records with
//! identical keys keep their insertion order.
//!
//! Side maps track membership:
//!
//! - `trees`: tree id to the priority the tree is sorted under and the number
//!   of records it has in this store,
//! - `tree_of`: component id to tree id, used to jump to the tree's span,
//! - `owners`: owner entity id to the component of this type it owns.
//!
//! # Core operations
//!
//! - **Insert** binary searches the tree bucket, then the branch inside it.
//! - **Lookup by id** binary searches the bucket, then scans the span.
//! - **Relocate** swaps in a changed identity record and moves it to its new
//!   slot by rotating the range between the old and new position.
//! - **Tree priority change** moves the whole span of a tree as one block.
//!
//! Every operation that changes a tree's span recomputes the parent offsets
//! of that span.
//!
//! # Type erasure
//!
//! [`ErasedStore`] exposes the identity records, hierarchy bookkeeping and
//! transfer operations without knowing `T`. Typed access goes through
//! `as_any` / `as_any_mut` downcasting. Moving records into a store of a
//! different element type fails with [`EcsError::TypeMismatch`].

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::ops::Range;

use log::trace;

use crate::engine::error::{EcsError, EcsResult, Lookup};
use crate::engine::info::{ComponentInfo, SortKey, TreePriorities};
use crate::engine::types::{
    ComponentId, ParentLoc, Priority, TreeId, DEFAULT_STORE_CAPACITY, LOWEST_PRIORITY,
};

/// Per-tree bookkeeping of one store.
#[derive(Debug, Clone, Copy)]
struct TreeEntry {
    priority: Priority,
    members: usize,
}

/// Dense, sorted storage for every component of type `T`.
///
/// ## Invariants
/// - `infos`, `data`, `keys` and `parent_locs` always have the same length.
/// - `keys[i] == infos[i].sort_key(trees[infos[i].tree].priority)`.
/// - `keys` is non-decreasing.
/// - `tree_of` holds exactly the ids present in `infos`.
/// - `trees[t].members` equals the number of records of tree `t`.

pub struct ComponentStore<T> {
    infos: Vec<ComponentInfo>,
    data: Vec<T>,
    keys: Vec<SortKey>,
    parent_locs: Vec<ParentLoc>,
    trees: HashMap<TreeId, TreeEntry>,
    tree_of: HashMap<ComponentId, TreeId>,
    owners: HashMap<ComponentId, ComponentId>,
    cloner: Option<fn(&T) -> T>,
}

impl<T> Default for ComponentStore<T> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_STORE_CAPACITY)
    }
}

impl<T> ComponentStore<T> {
    /// Creates an empty store with the default capacity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store able to hold `capacity` records before growing.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            infos: Vec::with_capacity(capacity),
            data: Vec::with_capacity(capacity),
            keys: Vec::with_capacity(capacity),
            parent_locs: Vec::with_capacity(capacity),
            trees: HashMap::new(),
            tree_of: HashMap::new(),
            owners: HashMap::new(),
            cloner: None,
        }
    }

    /// Number of records.
    #[inline]
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// Returns `true` if records can be copied out of this store.
    #[inline]
    pub fn can_copy(&self) -> bool {
        self.cloner.is_some()
    }

    /// Returns `true` if the store holds no records.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// Identity records in sorted order.
    #[inline]
    pub fn infos(&self) -> &[ComponentInfo] {
        &self.infos
    }

    /// Payloads, parallel to [`infos`](Self::infos).
    #[inline]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Mutable payloads. The order cannot be changed through this view.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Cached ancestor offsets, parallel to [`infos`](Self::infos).
    #[inline]
    pub fn parent_locs(&self) -> &[ParentLoc] {
        &self.parent_locs
    }

    /// Splits the store into its read-only bookkeeping and mutable payloads.
    #[inline]
    pub fn split_mut(&mut self) -> (&[ComponentInfo], &mut [T], &[ParentLoc]) {
        (&self.infos, &mut self.data, &self.parent_locs)
    }

    /// Every column at once, for merge-join traversal.
    #[inline]
    pub(crate) fn columns_mut(&mut self) -> (&[SortKey], &[ComponentInfo], &mut [T], &[ParentLoc]) {
        (&self.keys, &self.infos, &mut self.data, &self.parent_locs)
    }

    /// Iterates over `(info, value)` pairs in sorted order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&ComponentInfo, &T)> + '_ {
        self.infos.iter().zip(self.data.iter())
    }

    /// Iterates over `(info, value)` pairs with mutable payloads.
    pub fn iter_mut(&mut self) -> impl DoubleEndedIterator<Item = (&ComponentInfo, &mut T)> + '_ {
        self.infos.iter().zip(self.data.iter_mut())
    }

    /// Returns `true` if `id` is stored here.
    #[inline]
    pub fn contains(&self, id: ComponentId) -> bool {
        self.tree_of.contains_key(&id)
    }

    /// Returns `true` if at least one record of `tree` is stored here.
    #[inline]
    pub fn has_tree(&self, tree: TreeId) -> bool {
        self.trees.contains_key(&tree)
    }

    /// Priority `tree` is currently sorted under, if present.
    #[inline]
    pub fn priority_of(&self, tree: TreeId) -> Option<Priority> {
        self.trees.get(&tree).map(|entry| entry.priority)
    }

    /// Position range occupied by `tree`. Empty if the tree is absent.
    pub fn tree_span(&self, tree: TreeId) -> Range<usize> {
        let Some(entry) = self.trees.get(&tree) else {
            return 0..0;
        };
        let span = self.bucket_range((entry.priority, tree));
        assert_eq!(span.len(), entry.members, "store is not sorted properly");
        span
    }

    fn bucket_range(&self, bucket: (Priority, TreeId)) -> Range<usize> {
        let start = self.keys.partition_point(|key| key.bucket() < bucket);
        let end = start + self.keys[start..].partition_point(|key| key.bucket() <= bucket);
        start..end
    }

    fn missing(id: ComponentId) -> EcsError {
        EcsError::NotFound { id, kind: Lookup::Store(type_name::<T>()) }
    }

    /// Current position of `id`.
    ///
    /// Binary searches the tree bucket, then scans the bucket linearly.
    pub fn index_of(&self, id: ComponentId) -> EcsResult<usize> {
        let tree = *self.tree_of.get(&id).ok_or_else(|| Self::missing(id))?;
        let span = self.tree_span(tree);
        self.infos[span.clone()]
            .iter()
            .position(|info| info.id == id)
            .map(|offset| span.start + offset)
            .ok_or(EcsError::InvariantViolation("id is registered but missing from its tree span"))
    }

    /// Identity record of `id`.
    pub fn get_info(&self, id: ComponentId) -> EcsResult<&ComponentInfo> {
        let index = self.index_of(id)?;
        Ok(&self.infos[index])
    }

    /// Payload of `id`.
    pub fn get_data(&self, id: ComponentId) -> EcsResult<&T> {
        let index = self.index_of(id)?;
        Ok(&self.data[index])
    }

    /// Mutable payload of `id`.
    pub fn get_data_mut(&mut self, id: ComponentId) -> EcsResult<&mut T> {
        let index = self.index_of(id)?;
        Ok(&mut self.data[index])
    }

    /// Id of the component of this type owned by `parent`.
    #[inline]
    pub fn owned_by(&self, parent: ComponentId) -> Option<ComponentId> {
        self.owners.get(&parent).copied()
    }

    /// Current position of the component of this type owned by `parent`.
    pub fn get_by_parent(&self, parent: ComponentId) -> Option<usize> {
        let id = self.owned_by(parent)?;
        self.index_of(id).ok()
    }

    /// Inserts a record under the priority its tree already has in this
    /// store, or [`LOWEST_PRIORITY`] for a tree new to the store.
    ///
    /// ## Returns
    /// The position the record landed at.
    ///
    /// ## Errors
    /// [`EcsError::InvalidState`] if the id is already stored.

    pub fn add(&mut self, info: ComponentInfo, value: T) -> EcsResult<usize> {
        let priority = self.priority_of(info.tree).unwrap_or(LOWEST_PRIORITY);
        self.insert(info, value, priority)
    }

    /// Inserts a record and makes `priority` the priority of its tree.
    ///
    /// If the tree is already present under another priority, its span is
    /// moved first.

    pub fn add_prioritized(&mut self, info: ComponentInfo, value: T, priority: Priority) -> EcsResult<usize> {
        self.set_tree_priority(info.tree, priority);
        self.insert(info, value, priority)
    }

    fn insert(&mut self, info: ComponentInfo, value: T, priority: Priority) -> EcsResult<usize> {
        if self.contains(info.id) {
            return Err(EcsError::invalid(info.id, "id is already stored"));
        }

        let key = info.sort_key(priority);
        let bucket = self.bucket_range(key.bucket());
        let index = bucket.start
            + self.keys[bucket].partition_point(|existing| existing.branch <= key.branch);

        self.infos.insert(index, info);
        self.data.insert(index, value);
        self.keys.insert(index, key);
        self.parent_locs.insert(index, 0);

        self.trees.entry(info.tree).or_insert(TreeEntry { priority, members: 0 }).members += 1;
        self.tree_of.insert(info.id, info.tree);
        if let Some(parent) = info.parent {
            self.owners.insert(parent, info.id);
        }

        self.recompute_parent_locs(info.tree);
        trace!("store<{}>: inserted {} at {index}", type_name::<T>(), info.id);
        Ok(index)
    }

    /// Removes `id`, compacting the store.
    ///
    /// ## Returns
    /// The removed identity record and payload.

    pub fn remove(&mut self, id: ComponentId) -> EcsResult<(ComponentInfo, T)> {
        let index = self.index_of(id)?;

        let info = self.infos.remove(index);
        let value = self.data.remove(index);
        self.keys.remove(index);
        self.parent_locs.remove(index);
        self.tree_of.remove(&id);

        self.leave_tree(info.tree);
        if let Some(parent) = info.parent {
            self.release_owner(parent, id, info.tree);
        }

        trace!("store<{}>: removed {id} from {index}", type_name::<T>());
        Ok((info, value))
    }

    /// Drops one member from `tree`, forgetting the tree when it empties.
    fn leave_tree(&mut self, tree: TreeId) {
        let emptied = match self.trees.get_mut(&tree) {
            Some(entry) => {
                entry.members -= 1;
                entry.members == 0
            }
            None => false,
        };
        if emptied {
            self.trees.remove(&tree);
        } else {
            self.recompute_parent_locs(tree);
        }
    }

    /// Clears the owner mapping of `parent` if it pointed at `id`, falling
    /// back to another component of the same owner still in `tree`.
    fn release_owner(&mut self, parent: ComponentId, id: ComponentId, tree: TreeId) {
        if self.owners.get(&parent) != Some(&id) {
            return;
        }
        let span = self.tree_span(tree);
        match self.infos[span].iter().rev().find(|info| info.parent == Some(parent)) {
            Some(other) => {
                let other = other.id;
                self.owners.insert(parent, other);
            }
            None => {
                self.owners.remove(&parent);
            }
        }
    }

    /// Replaces the identity record stored under `info.id` and resorts it.
    ///
    /// ## Parameters
    /// - `info`: new record; the id selects the record to replace.
    /// - `priority`: priority of `info.tree`. If the tree is already present
    ///   under another priority its span is moved first.
    ///
    /// ## Returns
    /// The record's new position.

    pub fn relocate(&mut self, info: ComponentInfo, priority: Priority) -> EcsResult<usize> {
        if !self.contains(info.id) {
            return Err(Self::missing(info.id));
        }
        self.set_tree_priority(info.tree, priority);

        let index = self.index_of(info.id)?;
        let old = self.infos[index];

        if old.tree != info.tree {
            self.trees.entry(info.tree).or_insert(TreeEntry { priority, members: 0 }).members += 1;
            self.tree_of.insert(info.id, info.tree);
        }
        if old.parent != info.parent {
            if let Some(parent) = old.parent {
                if self.owners.get(&parent) == Some(&info.id) {
                    self.owners.remove(&parent);
                }
            }
            if let Some(parent) = info.parent {
                self.owners.insert(parent, info.id);
            }
        }

        let priority = self.priority_of(info.tree).unwrap_or(priority);
        self.infos[index] = info;
        self.keys[index] = info.sort_key(priority);
        let index = self.move_to_sorted(index);

        if old.tree != info.tree {
            self.leave_tree(old.tree);
        }
        if let Some(parent) = old.parent.filter(|&parent| old.parent != info.parent && !self.owners.contains_key(&parent)) {
            self.adopt_owner(parent, old.tree);
        }
        self.recompute_parent_locs(info.tree);

        trace!("store<{}>: relocated {} to {index}", type_name::<T>(), info.id);
        Ok(index)
    }

    /// Restores an owner mapping from another record of `tree`, if any.
    fn adopt_owner(&mut self, parent: ComponentId, tree: TreeId) {
        let span = self.tree_span(tree);
        if let Some(other) = self.infos[span].iter().rev().find(|info| info.parent == Some(parent)) {
            let other = other.id;
            self.owners.insert(parent, other);
        }
    }

    /// Applies `f` to the identity record of `id` and resorts it.
    ///
    /// ## Errors
    /// [`EcsError::InvariantViolation`] if `f` changes the id.

    pub fn update_info(&mut self, id: ComponentId, f: impl FnOnce(&mut ComponentInfo)) -> EcsResult<usize> {
        let mut info = *self.get_info(id)?;
        f(&mut info);
        if info.id != id {
            return Err(EcsError::InvariantViolation("update_info must not change the record id"));
        }
        let priority = self.priority_of(info.tree).unwrap_or(LOWEST_PRIORITY);
        self.relocate(info, priority)
    }

    /// Moves the record at `index` to the slot its cached key dictates.
    fn move_to_sorted(&mut self, index: usize) -> usize {
        let key = self.keys[index];
        if index > 0 && self.keys[index - 1] > key {
            let target = self.keys[..index].partition_point(|existing| *existing <= key);
            self.rotate_right(target..index + 1, 1);
            target
        } else if index + 1 < self.keys.len() && self.keys[index + 1] < key {
            let target = index + 1 + self.keys[index + 1..].partition_point(|existing| *existing < key);
            self.rotate_left(index..target, 1);
            target - 1
        } else {
            index
        }
    }

    fn rotate_left(&mut self, range: Range<usize>, by: usize) {
        self.infos[range.clone()].rotate_left(by);
        self.data[range.clone()].rotate_left(by);
        self.keys[range.clone()].rotate_left(by);
        self.parent_locs[range].rotate_left(by);
    }

    fn rotate_right(&mut self, range: Range<usize>, by: usize) {
        self.infos[range.clone()].rotate_right(by);
        self.data[range.clone()].rotate_right(by);
        self.keys[range.clone()].rotate_right(by);
        self.parent_locs[range].rotate_right(by);
    }

    /// Moves every record of `tree` to the position implied by `priority`.
    ///
    /// The tree's span is moved as one block; intra-tree order and parent
    /// offsets are untouched.
    ///
    /// ## Returns
    /// `false` if the tree is absent or already sorted under `priority`.

    pub fn set_tree_priority(&mut self, tree: TreeId, priority: Priority) -> bool {
        let Some(current) = self.priority_of(tree) else {
            return false;
        };
        if current == priority {
            return false;
        }

        let span = self.tree_span(tree);
        let len = span.len();
        if let Some(entry) = self.trees.get_mut(&tree) {
            entry.priority = priority;
        }
        for key in &mut self.keys[span.clone()] {
            key.priority = priority;
        }

        let bucket = (priority, tree);
        if priority < current {
            let target = self.keys[..span.start].partition_point(|key| key.bucket() < bucket);
            self.rotate_right(target..span.end, len);
        } else {
            let target = span.end + self.keys[span.end..].partition_point(|key| key.bucket() < bucket);
            self.rotate_left(span.start..target, len);
        }

        trace!("store<{}>: tree {tree} moved from priority {current} to {priority}", type_name::<T>());
        true
    }

    /// Recomputes the parent offsets of every record of `tree`.
    ///
    /// The span is a preorder, so a stack of open ancestors yields the
    /// nearest one for each record.
    fn recompute_parent_locs(&mut self, tree: TreeId) {
        let span = self.tree_span(tree);
        let mut open: Vec<usize> = Vec::new();
        for index in span {
            let info = self.infos[index];
            while let Some(&top) = open.last() {
                if info.is_descendant_of(&self.infos[top]) {
                    break;
                }
                open.pop();
            }
            self.parent_locs[index] = open.last().map_or(0, |&top| index - top);
            open.push(index);
        }
    }

    /// Returns `true` if keys are non-decreasing and match the records.
    pub fn is_sorted(&self) -> bool {
        let ordered = self.keys.windows(2).all(|pair| pair[0] <= pair[1]);
        ordered
            && self.infos.iter().zip(&self.keys).all(|(info, key)| {
                self.priority_of(info.tree).is_some_and(|priority| info.sort_key(priority) == *key)
            })
    }

    /// Panics if the store's order invariant is broken.
    pub fn assert_sorted(&self) {
        assert!(self.is_sorted(), "store is not sorted properly");
    }
}

impl<T: Clone> ComponentStore<T> {
    /// Lets [`ErasedStore::copy_into`] clone records of this store.
    pub fn enable_copies(&mut self) {
        let clone: fn(&T) -> T = T::clone;
        self.cloner = Some(clone);
    }
}

#[cfg(test)]
impl<T> ComponentStore<T> {
    /// Reverses the cached keys, breaking the order on purpose.
    pub(crate) fn reverse_keys(&mut self) {
        self.keys.reverse();
    }
}

/// Type-erased interface over [`ComponentStore<T>`].
///
/// ## Purpose
/// Lets the context keep one store per component type in a single catalog,
/// resolve any id to its identity record, and apply hierarchy changes
/// without knowing the element type.
///
/// ## Design
/// - Typed access goes through `as_any` / `as_any_mut` downcasting.
/// - `empty_like` is the factory used to create a matching store in another
///   context during a transfer or copy. The new store inherits the ability
///   to copy records.

pub trait ErasedStore: Any {
    /// Returns an immutable type-erased reference for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Returns a mutable type-erased reference for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Returns the `TypeId` of the element type.
    fn element_type_id(&self) -> TypeId;

    /// Returns the human-readable name of the element type.
    fn element_type_name(&self) -> &'static str;

    /// Number of records.
    fn len(&self) -> usize;

    /// Returns `true` if the store holds no records.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identity records in sorted order.
    fn infos(&self) -> &[ComponentInfo];

    /// Cached ancestor offsets.
    fn parent_locs(&self) -> &[ParentLoc];

    /// Returns `true` if `id` is stored here.
    fn contains(&self, id: ComponentId) -> bool;

    /// Identity record of `id`.
    fn info_of(&self, id: ComponentId) -> EcsResult<&ComponentInfo>;

    /// Replaces the identity record of `info.id` and resorts it.
    fn relocate(&mut self, info: ComponentInfo, priority: Priority) -> EcsResult<usize>;

    /// Removes `id`, returning its record and boxed payload.
    fn remove_dyn(&mut self, id: ComponentId) -> EcsResult<(ComponentInfo, Box<dyn Any>)>;

    /// Moves the span of `tree` to `priority`. See [`ComponentStore::set_tree_priority`].
    fn resort_tree(&mut self, tree: TreeId, priority: Priority) -> bool;

    /// Returns `true` if `tree` has records here.
    fn has_tree(&self, tree: TreeId) -> bool;

    /// Returns `true` if [`copy_into`](Self::copy_into) can clone records.
    fn can_copy(&self) -> bool;

    /// Panics if the order invariant is broken.
    fn assert_sorted(&self);

    /// Creates an empty store of the same element type.
    fn empty_like(&self, capacity: usize) -> Box<dyn ErasedStore>;

    /// Moves every record accepted by `filter` into `target`.
    ///
    /// ## Errors
    /// - [`EcsError::TypeMismatch`] if `target` holds another element type.
    /// - [`EcsError::InvalidState`] if an id is already present in `target`.
    ///
    /// Both checks run before any record moves.
    fn drain_into(
        &mut self,
        target: &mut dyn ErasedStore,
        filter: &dyn Fn(&ComponentInfo) -> bool,
        priorities: &TreePriorities,
    ) -> EcsResult<Vec<ComponentId>>;

    /// Clones every record accepted by `filter` into `target`, keeping the
    /// originals.
    ///
    /// ## Errors
    /// - [`EcsError::TypeMismatch`] if `target` holds another element type.
    /// - [`EcsError::NotCopyable`] if records are selected but copies were
    ///   never enabled for this store.
    /// - [`EcsError::InvalidState`] if an id is already present in `target`.
    ///
    /// All checks run before any record is copied.
    fn copy_into(
        &self,
        target: &mut dyn ErasedStore,
        filter: &dyn Fn(&ComponentInfo) -> bool,
        priorities: &TreePriorities,
    ) -> EcsResult<Vec<ComponentId>>;
}

impl<T: 'static> ErasedStore for ComponentStore<T> {
    fn as_any(&self) -> &dyn Any { self }
    fn as_any_mut(&mut self) -> &mut dyn Any { self }

    fn element_type_id(&self) -> TypeId { TypeId::of::<T>() }
    fn element_type_name(&self) -> &'static str { type_name::<T>() }

    fn len(&self) -> usize { ComponentStore::len(self) }
    fn infos(&self) -> &[ComponentInfo] { ComponentStore::infos(self) }
    fn parent_locs(&self) -> &[ParentLoc] { ComponentStore::parent_locs(self) }
    fn contains(&self, id: ComponentId) -> bool { ComponentStore::contains(self, id) }
    fn has_tree(&self, tree: TreeId) -> bool { ComponentStore::has_tree(self, tree) }
    fn can_copy(&self) -> bool { ComponentStore::can_copy(self) }
    fn assert_sorted(&self) { ComponentStore::assert_sorted(self) }

    fn info_of(&self, id: ComponentId) -> EcsResult<&ComponentInfo> {
        self.get_info(id)
    }

    fn relocate(&mut self, info: ComponentInfo, priority: Priority) -> EcsResult<usize> {
        ComponentStore::relocate(self, info, priority)
    }

    fn remove_dyn(&mut self, id: ComponentId) -> EcsResult<(ComponentInfo, Box<dyn Any>)> {
        let (info, value) = self.remove(id)?;
        Ok((info, Box::new(value)))
    }

    fn resort_tree(&mut self, tree: TreeId, priority: Priority) -> bool {
        self.set_tree_priority(tree, priority)
    }

    fn empty_like(&self, capacity: usize) -> Box<dyn ErasedStore> {
        let mut store = ComponentStore::<T>::with_capacity(capacity);
        store.cloner = self.cloner;
        Box::new(store)
    }

    fn drain_into(
        &mut self,
        target: &mut dyn ErasedStore,
        filter: &dyn Fn(&ComponentInfo) -> bool,
        priorities: &TreePriorities,
    ) -> EcsResult<Vec<ComponentId>> {
        let expected = target.element_type_name();
        let Some(target) = target.as_any_mut().downcast_mut::<ComponentStore<T>>() else {
            return Err(EcsError::TypeMismatch { expected, actual: type_name::<T>() });
        };

        let moving: Vec<ComponentId> = self
            .infos
            .iter()
            .filter(|info| filter(info))
            .map(|info| info.id)
            .collect();
        if let Some(&id) = moving.iter().find(|&&id| target.contains(id)) {
            return Err(EcsError::invalid(id, "id is already present in the target store"));
        }

        for &id in &moving {
            let (info, value) = self.remove(id)?;
            target.add_prioritized(info, value, priorities.get(info.tree))?;
        }
        Ok(moving)
    }

    fn copy_into(
        &self,
        target: &mut dyn ErasedStore,
        filter: &dyn Fn(&ComponentInfo) -> bool,
        priorities: &TreePriorities,
    ) -> EcsResult<Vec<ComponentId>> {
        let expected = target.element_type_name();
        let Some(target) = target.as_any_mut().downcast_mut::<ComponentStore<T>>() else {
            return Err(EcsError::TypeMismatch { expected, actual: type_name::<T>() });
        };

        let selected: Vec<usize> = (0..self.infos.len()).filter(|&index| filter(&self.infos[index])).collect();
        if selected.is_empty() {
            return Ok(Vec::new());
        }
        let clone = self.cloner.ok_or(EcsError::NotCopyable(type_name::<T>()))?;
        if let Some(&index) = selected.iter().find(|&&index| target.contains(self.infos[index].id)) {
            return Err(EcsError::invalid(self.infos[index].id, "id is already present in the target store"));
        }

        let mut copied = Vec::with_capacity(selected.len());
        for index in selected {
            let info = self.infos[index];
            target.add_prioritized(info, clone(&self.data[index]), priorities.get(info.tree))?;
            copied.push(info.id);
        }
        Ok(copied)
    }
}
