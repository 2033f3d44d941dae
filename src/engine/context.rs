//! # Context
//!
//! The context owns every store of one world and is the only code that
//! changes their structure.
//!
//! ## Purpose
//! - Keep one sorted store per component type and map any id to its store.
//! - Maintain the hierarchy: attach, detach, subtree removal, branch
//!   re-derivation and tree priorities.
//! - Defer structural requests made while a traversal pass is active.
//! - Move or copy closed selections of records into another context.
//!
//! ## Design
//! Every structural request is expressed as a [`Command`] and routed through
//! one entry point. Outside a pass the command is applied immediately;
//! inside a pass it is queued and applied, in submission order, at the next
//! synchronization point.
//!
//! Hierarchy changes never touch store internals directly. The context
//! computes the new [`ComponentInfo`] of each moved record and hands it to
//! the record's store, which re-places it and refreshes parent offsets.
//!
//! ## Invariants
//! - A record without a parent is the root of its own tree.
//! - An entity's children share its tree. Entity children are one level
//!   deeper than their parent and carry a unique sibling byte; leaf
//!   components share their owner's depth and branch.
//! - When [`ContextConfig::verify_order`] is set, every store is checked for
//!   order after each structural mutation.

use std::any::type_name;
use std::collections::BTreeSet;

use log::{debug, warn};

use crate::engine::borrow::PassGuard;
use crate::engine::commands::{Command, Commands};
use crate::engine::component::{Catalog, ENTITY_STORE};
use crate::engine::config::ContextConfig;
use crate::engine::entity::{EntityData, IdAllocator};
use crate::engine::error::{child_depth, EcsError, EcsResult, Lookup};
use crate::engine::info::{ComponentInfo, TreePriorities};
use crate::engine::query::View;
use crate::engine::storage::ComponentStore;
use crate::engine::types::{ComponentId, Priority, TreeId, MAX_DEPTH, with_sibling};

/// Selects the records moved by [`Context::transfer_to`].
pub type TransferFilter<'f> = &'f dyn Fn(&ComponentInfo) -> bool;

/// Catalog of stores plus the hierarchy manager and deferred queue.
pub struct Context {
    config: ContextConfig,
    catalog: Catalog,
    priorities: TreePriorities,
    ids: IdAllocator,
    commands: Commands,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Creates an empty context with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ContextConfig::default())
    }

    /// Creates an empty context with its own id allocator.
    pub fn with_config(config: ContextConfig) -> Self {
        Self::with_allocator(config, IdAllocator::new())
    }

    /// Creates an empty context drawing ids from `ids`.
    ///
    /// Contexts that exchange records through [`transfer_to`](Self::transfer_to)
    /// should share one allocator so their ids never collide.
    pub fn with_allocator(config: ContextConfig, ids: IdAllocator) -> Self {
        Self {
            config,
            catalog: Catalog::new(config.initial_store_capacity),
            priorities: TreePriorities::new(),
            commands: Commands::new(ids.clone(), config.max_deferred),
            ids,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Configuration this context was built with.
    #[inline]
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Id allocator of this context.
    #[inline]
    pub fn ids(&self) -> &IdAllocator {
        &self.ids
    }

    /// Tree priority table.
    #[inline]
    pub fn priorities(&self) -> &TreePriorities {
        &self.priorities
    }

    /// Store catalog, read-only.
    #[inline]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Deferred command queue.
    #[inline]
    pub fn commands(&self) -> &Commands {
        &self.commands
    }

    /// Returns `true` while a pass is active.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.commands.is_locked()
    }

    /// Number of stored entities and components.
    #[inline]
    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    /// Returns `true` if nothing is stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }

    /// Returns `true` if `id` is stored in this context.
    #[inline]
    pub fn contains(&self, id: ComponentId) -> bool {
        self.catalog.contains(id)
    }

    /// Identity record of any id.
    pub fn info(&self, id: ComponentId) -> EcsResult<ComponentInfo> {
        self.catalog.info(id).copied()
    }

    /// Identity record of an entity.
    ///
    /// ## Errors
    /// [`EcsError::NotFound`] if `id` is unknown or not an entity.

    pub fn entity_info(&self, id: ComponentId) -> EcsResult<ComponentInfo> {
        match self.catalog.info(id) {
            Ok(info) if info.is_entity => Ok(*info),
            _ => Err(EcsError::entity(id)),
        }
    }

    /// Children bookkeeping of an entity.
    pub fn entity_data(&self, id: ComponentId) -> EcsResult<&EntityData> {
        self.entity_info(id)?;
        self.catalog.entities()?.get_data(id).map_err(|_| EcsError::entity(id))
    }

    fn entity_data_mut(&mut self, id: ComponentId) -> EcsResult<&mut EntityData> {
        self.entity_info(id)?;
        self.catalog.entities_mut()?.get_data_mut(id).map_err(|_| EcsError::entity(id))
    }

    /// Direct children of `entity` in id order.
    pub fn children(&self, entity: ComponentId) -> EcsResult<impl DoubleEndedIterator<Item = ComponentId> + '_> {
        Ok(self.entity_data(entity)?.children())
    }

    /// The component of type `T` owned by `entity`.
    ///
    /// ## Errors
    /// - [`EcsError::NotFound`] with [`Lookup::Entity`] if `entity` is unknown.
    /// - [`EcsError::NotFound`] with [`Lookup::Owned`] if it owns no `T`.

    pub fn get_component<T: 'static>(&self, entity: ComponentId) -> EcsResult<&T> {
        self.entity_info(entity)?;
        let missing = || EcsError::NotFound { id: entity, kind: Lookup::Owned(type_name::<T>()) };
        let store = self.catalog.store::<T>().ok_or_else(missing)?;
        let index = store.get_by_parent(entity).ok_or_else(missing)?;
        Ok(&store.data()[index])
    }

    /// Mutable access to the component of type `T` owned by `entity`.
    pub fn get_component_mut<T: 'static>(&mut self, entity: ComponentId) -> EcsResult<&mut T> {
        self.entity_info(entity)?;
        let missing = || EcsError::NotFound { id: entity, kind: Lookup::Owned(type_name::<T>()) };
        let store = self.catalog.store_mut::<T>().ok_or_else(missing)?;
        let index = store.get_by_parent(entity).ok_or_else(missing)?;
        Ok(&mut store.data_mut()[index])
    }

    /// Typed store for `T`, if any `T` was ever added.
    #[inline]
    pub fn store<T: 'static>(&self) -> Option<&ComponentStore<T>> {
        self.catalog.store::<T>()
    }

    /// Traversal view over every store.
    #[inline]
    pub fn view(&mut self) -> View<'_> {
        View::new(&mut self.catalog)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Creation
    // ─────────────────────────────────────────────────────────────────────────

    /// Creates a detached entity.
    ///
    /// During a pass the entity is created at the next flush; the returned
    /// id is reserved immediately.

    pub fn add_entity(&mut self) -> EcsResult<ComponentId> {
        if self.is_locked() {
            return self.commands.create_entity();
        }
        let id = self.ids.next_id();
        self.insert_entity(id)?;
        Ok(id)
    }

    /// Same as [`add_entity`](Self::add_entity).
    #[inline]
    pub fn create_entity(&mut self) -> EcsResult<ComponentId> {
        self.add_entity()
    }

    /// Stores `value` as a new component owned by `entity`.
    ///
    /// ## Returns
    /// Id of the new component.
    ///
    /// ## Errors
    /// [`EcsError::NotFound`] if `entity` is not an entity. During a pass the
    /// check runs at the next flush.

    pub fn add_component<T: 'static>(&mut self, entity: ComponentId, value: T) -> EcsResult<ComponentId> {
        if self.is_locked() {
            return self.commands.add_component(entity, value);
        }
        let id = self.ids.next_id();
        self.insert_component(entity, id, value)?;
        Ok(id)
    }

    /// Stores `value` as a detached component heading its own tree.
    pub fn create_component<T: 'static>(&mut self, value: T) -> EcsResult<ComponentId> {
        let id = self.ids.next_id();
        if self.is_locked() {
            self.commands.custom(move |context: &mut Context| context.insert_detached(id, value))?;
        } else {
            self.insert_detached(id, value)?;
        }
        Ok(id)
    }

    pub(crate) fn insert_component<T: 'static>(&mut self, entity: ComponentId, id: ComponentId, value: T) -> EcsResult<()> {
        self.entity_info(entity)?;
        self.insert_detached(id, value)?;
        self.attach_now(entity, id)
    }

    fn insert_entity(&mut self, id: ComponentId) -> EcsResult<()> {
        self.insert_record(ComponentInfo::entity(id), EntityData::new())?;
        debug!("created entity {id}");
        Ok(())
    }

    fn insert_detached<T: 'static>(&mut self, id: ComponentId, value: T) -> EcsResult<()> {
        self.insert_record(ComponentInfo::new(id), value)
    }

    fn insert_record<T: 'static>(&mut self, info: ComponentInfo, value: T) -> EcsResult<()> {
        if self.catalog.contains(info.id) {
            return Err(EcsError::invalid(info.id, "id is already registered"));
        }
        let index = self.catalog.ensure_store::<T>();
        debug_assert!(!info.is_entity || index == ENTITY_STORE);
        let priority = self.priorities.get(info.tree);
        self.catalog.typed_mut::<T>(index)?.add_prioritized(info, value, priority)?;
        self.catalog.track(info.id, index);
        self.verify();
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Structural facade
    // ─────────────────────────────────────────────────────────────────────────

    /// Attaches `child` (a component or entity) to the entity `parent`.
    ///
    /// ## Errors
    /// - [`EcsError::NotFound`] if either id is unknown or `parent` is not an
    ///   entity.
    /// - [`EcsError::InvalidState`] if `child` already has a parent, or is
    ///   `parent` itself or one of its ancestors.
    /// - [`EcsError::DepthLimit`] if `child`'s subtree would end up deeper
    ///   than the branch encoding allows.
    /// - [`EcsError::SiblingLimit`] if `parent` has no free sibling byte.
    ///
    /// Nothing changes when an error is returned.

    pub fn add_component_to_entity(&mut self, parent: ComponentId, child: ComponentId) -> EcsResult<()> {
        self.submit(Command::Attach { parent, child })
    }

    /// Same as [`add_component_to_entity`](Self::add_component_to_entity).
    #[inline]
    pub fn attach(&mut self, parent: ComponentId, child: ComponentId) -> EcsResult<()> {
        self.add_component_to_entity(parent, child)
    }

    /// Detaches `child` from `parent`. The child becomes the root of its own
    /// tree and keeps its subtree.
    pub fn detach(&mut self, parent: ComponentId, child: ComponentId) -> EcsResult<()> {
        self.submit(Command::Detach { parent, child })
    }

    /// Removes `component`, which must be a child of `entity`, together with
    /// its whole subtree.
    pub fn remove_component_from_entity(&mut self, entity: ComponentId, component: ComponentId) -> EcsResult<()> {
        self.submit(Command::Remove { parent: Some(entity), id: component })
    }

    /// Removes `id` and its whole subtree, detaching it from its parent first.
    pub fn remove_component_tree(&mut self, id: ComponentId) -> EcsResult<()> {
        self.submit(Command::Remove { parent: None, id })
    }

    /// Re-derives tree, depth and branch of every descendant of `entity`.
    ///
    /// Sibling bytes below each entity are reassigned in child id order.
    pub fn update_tree(&mut self, entity: ComponentId) -> EcsResult<()> {
        self.submit(Command::UpdateTree { entity })
    }

    /// Sets the priority of `tree` and moves its records in every store.
    pub fn set_tree_priority(&mut self, tree: TreeId, priority: Priority) -> EcsResult<()> {
        self.submit(Command::SetPriority { tree, priority })
    }

    /// Sets the priority of the tree `entity` belongs to.
    pub fn set_priority(&mut self, entity: ComponentId, priority: Priority) -> EcsResult<()> {
        let tree = self.entity_info(entity)?.tree;
        self.set_tree_priority(tree, priority)
    }

    /// Applies `command` now, or queues it while a pass is active.
    pub fn submit(&mut self, command: Command) -> EcsResult<()> {
        if self.is_locked() {
            return self.commands.push(command);
        }
        self.apply(command)
    }

    fn apply(&mut self, command: Command) -> EcsResult<()> {
        match command {
            Command::CreateEntity { id } => self.insert_entity(id),
            Command::Attach { parent, child } => self.attach_now(parent, child),
            Command::Detach { parent, child } => self.detach_now(parent, child),
            Command::Remove { parent, id } => self.remove_now(parent, id),
            Command::UpdateTree { entity } => {
                self.entity_info(entity)?;
                self.rederive(entity)
            }
            Command::SetPriority { tree, priority } => {
                self.set_priority_now(tree, priority);
                Ok(())
            }
            Command::Custom(f) => f(self),
        }?;
        self.verify();
        Ok(())
    }

    fn verify(&self) {
        if self.config.verify_order {
            self.catalog.assert_sorted();
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Passes
    // ─────────────────────────────────────────────────────────────────────────

    /// Applies every queued command in submission order.
    ///
    /// ## Returns
    /// The number of commands applied.
    ///
    /// ## Errors
    /// - [`EcsError::InvalidState`] if called during a pass.
    /// - The first error raised by a queued command. That command is
    ///   dropped and the commands after it stay queued.

    pub fn flush_deferred(&mut self) -> EcsResult<usize> {
        if self.is_locked() {
            return Err(EcsError::misuse("cannot flush deferred commands during a pass"));
        }
        let mut applied = 0;
        while let Some(command) = self.commands.pop() {
            if let Err(error) = self.apply(command) {
                warn!("deferred command failed after {applied} applied, {} still queued: {error}", self.commands.len());
                return Err(error);
            }
            applied += 1;
        }
        if applied > 0 {
            debug!("flushed {applied} deferred commands");
        }
        Ok(applied)
    }

    /// Flushes the queue and starts a pass.
    ///
    /// Structural requests made through the guard are queued until the
    /// guard is dropped and the queue flushed again.

    pub fn begin_pass(&mut self) -> EcsResult<PassGuard<'_>> {
        self.flush_deferred()?;
        Ok(PassGuard::new(self))
    }

    pub(crate) fn lock(&mut self) {
        self.commands.lock();
    }

    pub(crate) fn unlock(&mut self) {
        self.commands.unlock();
    }

    pub(crate) fn split_for_pass(&mut self) -> (View<'_>, &mut Commands) {
        (View::new(&mut self.catalog), &mut self.commands)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Hierarchy
    // ─────────────────────────────────────────────────────────────────────────

    fn attach_now(&mut self, parent: ComponentId, child: ComponentId) -> EcsResult<()> {
        let owner = self.entity_info(parent)?;
        let mut info = self.info(child)?;
        if info.parent.is_some() {
            return Err(EcsError::invalid(child, "component already has a parent"));
        }
        if owner.tree == info.id {
            return Err(EcsError::invalid(child, "attaching would create a cycle"));
        }

        if info.is_entity {
            let depth = child_depth(child, owner.depth)?;
            let deepest = depth as usize + self.subtree_height(child)?;
            if deepest > MAX_DEPTH as usize {
                return Err(EcsError::DepthLimit { id: child, depth: deepest });
            }
            let index = self.entity_data_mut(parent)?.allocate_branch(parent, child)?;
            info.depth = depth;
            info.branch = with_sibling(owner.branch, owner.depth, index);
        } else {
            info.depth = owner.depth;
            info.branch = owner.branch;
        }
        info.parent = Some(parent);
        info.tree = owner.tree;

        self.entity_data_mut(parent)?.add_child(child);
        self.place(info)?;
        if info.is_entity {
            self.rederive(child)?;
        }
        debug!("attached {child} to {parent} (tree {}, depth {})", info.tree, info.depth);
        Ok(())
    }

    fn detach_now(&mut self, parent: ComponentId, child: ComponentId) -> EcsResult<()> {
        self.entity_info(parent)?;
        let mut info = self.info(child)?;
        if info.parent != Some(parent) {
            return Err(EcsError::invalid(child, "component is not a child of that entity"));
        }

        self.entity_data_mut(parent)?.remove_child(child);
        info.reset_to_root();
        self.place(info)?;
        if info.is_entity {
            self.rederive(child)?;
        }
        debug!("detached {child} from {parent}");
        Ok(())
    }

    fn remove_now(&mut self, parent: Option<ComponentId>, id: ComponentId) -> EcsResult<()> {
        let info = self.info(id)?;
        if parent.is_some_and(|expected| info.parent != Some(expected)) {
            return Err(EcsError::invalid(id, "component is not a child of that entity"));
        }

        let members = self.collect_subtree(id)?;
        if let Some(owner) = info.parent {
            self.entity_data_mut(owner)?.remove_child(id);
        }
        for &member in &members {
            let index = self.catalog.location(member)?;
            self.catalog.erased_mut(index)?.remove_dyn(member)?;
            self.catalog.untrack(member);
            self.priorities.remove(member);
        }
        debug!("removed {id} and {} descendants", members.len() - 1);
        Ok(())
    }

    fn set_priority_now(&mut self, tree: TreeId, priority: Priority) {
        self.priorities.set(tree, priority);
        let moved = self
            .catalog
            .stores_mut()
            .filter(|store| store.has_tree(tree))
            .map(|store| store.resort_tree(tree, priority))
            .filter(|&moved| moved)
            .count();
        debug!("tree {tree} set to priority {priority}, {moved} stores resorted");
    }

    /// Hands `info` to its store, sorted under its tree's priority.
    fn place(&mut self, info: ComponentInfo) -> EcsResult<()> {
        let index = self.catalog.location(info.id)?;
        let priority = self.priorities.get(info.tree);
        self.catalog.erased_mut(index)?.relocate(info, priority)?;
        Ok(())
    }

    /// Recomputes the position of every descendant of `entity` from its
    /// current record, reassigning sibling bytes in child id order.
    fn rederive(&mut self, entity: ComponentId) -> EcsResult<()> {
        let mut pending = vec![entity];
        while let Some(owner_id) = pending.pop() {
            let owner = self.info(owner_id)?;
            let data = self.entity_data_mut(owner_id)?;
            data.reset_branches();
            let children: Vec<ComponentId> = data.children().collect();

            for child in children {
                let mut info = self.info(child)?;
                info.parent = Some(owner_id);
                info.tree = owner.tree;
                if info.is_entity {
                    let index = self.entity_data_mut(owner_id)?.allocate_branch(owner_id, child)?;
                    info.depth = child_depth(child, owner.depth)?;
                    info.branch = with_sibling(owner.branch, owner.depth, index);
                    pending.push(child);
                } else {
                    info.depth = owner.depth;
                    info.branch = owner.branch;
                }
                self.place(info)?;
            }
        }
        Ok(())
    }

    /// `id` followed by every descendant, parents before children.
    fn collect_subtree(&self, id: ComponentId) -> EcsResult<Vec<ComponentId>> {
        let mut members = vec![id];
        let mut next = 0;
        while next < members.len() {
            let current = members[next];
            next += 1;
            if self.info(current)?.is_entity {
                members.extend(self.entity_data(current)?.children());
            }
        }
        Ok(members)
    }

    /// Number of entity levels below `entity`.
    fn subtree_height(&self, entity: ComponentId) -> EcsResult<usize> {
        let mut height = 0;
        let mut pending = vec![(entity, 0)];
        while let Some((current, level)) = pending.pop() {
            height = height.max(level);
            for child in self.entity_data(current)?.children() {
                if self.info(child)?.is_entity {
                    pending.push((child, level + 1));
                }
            }
        }
        Ok(height)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transfer
    // ─────────────────────────────────────────────────────────────────────────

    /// Moves records into `target`.
    ///
    /// ## Parameters
    /// - `target`: receiving context. Missing stores are created there from
    ///   the source stores.
    /// - `filter`: selects records to move; `None` moves everything.
    ///
    /// The selection must be closed under the hierarchy: a selected record's
    /// parent and an entity's children must be selected too. Priorities of
    /// moved trees travel with them.
    ///
    /// ## Returns
    /// Ids of the moved records.
    ///
    /// ## Errors
    /// - [`EcsError::InvalidState`] if either context is in a pass, an id
    ///   already exists in `target`, or the selection splits a hierarchy.
    /// - [`EcsError::TypeMismatch`] if a target store holds another type.
    ///
    /// Ids and hierarchy closure are validated before anything moves.

    pub fn transfer_to(&mut self, target: &mut Context, filter: Option<TransferFilter<'_>>) -> EcsResult<Vec<ComponentId>> {
        if self.is_locked() || target.is_locked() {
            return Err(EcsError::misuse("cannot transfer during a pass"));
        }

        let selected = self.select(filter);
        self.check_transfer(target, &selected)?;

        for &id in &selected {
            if let Some(priority) = self.priorities.remove(id) {
                target.priorities.set(id, priority);
            }
        }

        let mut moved = Vec::with_capacity(selected.len());
        for index in 0..self.catalog.registry().len() {
            let Some(source) = self.catalog.erased(index) else { continue };
            if !source.infos().iter().any(|info| selected.contains(&info.id)) {
                continue;
            }
            let desc = *self
                .catalog
                .registry()
                .description(index)
                .ok_or(EcsError::InvariantViolation("store without a registry entry"))?;
            let target_index = target.catalog.ensure_store_like(desc, source);

            let ids = self.catalog.erased_mut(index)?.drain_into(
                target.catalog.erased_mut(target_index)?,
                &|info: &ComponentInfo| selected.contains(&info.id),
                &target.priorities,
            )?;
            for &id in &ids {
                self.catalog.untrack(id);
                target.catalog.track(id, target_index);
            }
            moved.extend(ids);
        }

        self.verify();
        target.verify();
        debug!("transferred {} records", moved.len());
        Ok(moved)
    }

    /// Moves every record of `tree` into `target`.
    pub fn transfer_tree(&mut self, target: &mut Context, tree: TreeId) -> EcsResult<Vec<ComponentId>> {
        self.transfer_to(target, Some(&|info: &ComponentInfo| info.tree == tree))
    }

    /// Enables copies of `T` records, creating the store if needed.
    ///
    /// Entity records always support copies.
    pub fn register_copyable<T: Clone + 'static>(&mut self) -> EcsResult<()> {
        self.catalog.ensure_copyable_store::<T>()?;
        Ok(())
    }

    /// Copies records into `target`, leaving this context unchanged.
    ///
    /// Selection rules match [`transfer_to`](Self::transfer_to). Priorities
    /// of copied trees are copied too.
    ///
    /// ## Returns
    /// Ids of the copied records, which now resolve in both contexts.
    ///
    /// ## Errors
    /// - [`EcsError::InvalidState`] if `target` is in a pass, an id already
    ///   exists in `target`, or the selection splits a hierarchy.
    /// - [`EcsError::NotCopyable`] if a selected record's type was never
    ///   registered with [`register_copyable`](Self::register_copyable).
    /// - [`EcsError::TypeMismatch`] if a target store holds another type.
    ///
    /// Ids, hierarchy closure and copy support are validated before anything
    /// is copied.

    pub fn copy_to(&self, target: &mut Context, filter: Option<TransferFilter<'_>>) -> EcsResult<Vec<ComponentId>> {
        if target.is_locked() {
            return Err(EcsError::misuse("cannot copy into a context during a pass"));
        }

        let selected = self.select(filter);
        self.check_transfer(target, &selected)?;
        if let Some(store) = self
            .catalog
            .stores()
            .find(|store| !store.can_copy() && store.infos().iter().any(|info| selected.contains(&info.id)))
        {
            return Err(EcsError::NotCopyable(store.element_type_name()));
        }

        for &id in &selected {
            if self.priorities.contains(id) {
                target.priorities.set(id, self.priorities.get(id));
            }
        }

        let mut copied = Vec::with_capacity(selected.len());
        for (index, source) in self.catalog.stores().enumerate() {
            if !source.infos().iter().any(|info| selected.contains(&info.id)) {
                continue;
            }
            let desc = *self
                .catalog
                .registry()
                .description(index)
                .ok_or(EcsError::InvariantViolation("store without a registry entry"))?;
            let target_index = target.catalog.ensure_store_like(desc, source);

            let ids = source.copy_into(
                target.catalog.erased_mut(target_index)?,
                &|info: &ComponentInfo| selected.contains(&info.id),
                &target.priorities,
            )?;
            for &id in &ids {
                target.catalog.track(id, target_index);
            }
            copied.extend(ids);
        }

        target.verify();
        debug!("copied {} records", copied.len());
        Ok(copied)
    }

    /// Copies every record of `tree` into `target`.
    pub fn copy_tree(&self, target: &mut Context, tree: TreeId) -> EcsResult<Vec<ComponentId>> {
        self.copy_to(target, Some(&|info: &ComponentInfo| info.tree == tree))
    }

    /// Ids of every record accepted by `filter`.
    fn select(&self, filter: Option<TransferFilter<'_>>) -> BTreeSet<ComponentId> {
        self.catalog
            .stores()
            .flat_map(|store| store.infos().iter())
            .filter(|info| filter.is_none_or(|keep| keep(*info)))
            .map(|info| info.id)
            .collect()
    }

    fn check_transfer(&self, target: &Context, selected: &BTreeSet<ComponentId>) -> EcsResult<()> {
        for &id in selected {
            if target.contains(id) {
                return Err(EcsError::invalid(id, "id is already present in the target context"));
            }
            let info = self.info(id)?;
            if info.parent.is_some_and(|parent| !selected.contains(&parent)) {
                return Err(EcsError::invalid(id, "transfer would split a hierarchy"));
            }
            if info.is_entity {
                if let Some(child) = self.entity_data(id)?.children().find(|child| !selected.contains(child)) {
                    return Err(EcsError::invalid(child, "transfer would split a hierarchy"));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::LOWEST_PRIORITY;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Mass(f32);

    fn context() -> Context {
        Context::with_config(ContextConfig::default().with_verify_order(true))
    }

    #[test]
    fn components_inherit_owner_position() {
        let mut ctx = context();
        let root = ctx.create_entity().unwrap();
        let child = ctx.create_entity().unwrap();
        ctx.attach(root, child).unwrap();
        let mass = ctx.add_component(child, Mass(2.0)).unwrap();

        let child_info = ctx.info(child).unwrap();
        let mass_info = ctx.info(mass).unwrap();
        assert_eq!(child_info.tree, root);
        assert_eq!(child_info.depth, 1);
        assert_eq!(child_info.branch, with_sibling(0, 0, 1));
        assert_eq!(mass_info.parent, Some(child));
        assert_eq!((mass_info.tree, mass_info.depth, mass_info.branch), (root, 1, child_info.branch));
        assert_eq!(ctx.get_component::<Mass>(child), Ok(&Mass(2.0)));
    }

    #[test]
    #[should_panic(expected = "store is not sorted properly")]
    fn order_checks_cover_untouched_stores() {
        let mut ctx = context();
        for n in 0..2 {
            let entity = ctx.create_entity().unwrap();
            ctx.add_component(entity, Mass(n as f32)).unwrap();
        }
        if let Some(store) = ctx.catalog.store_mut::<Mass>() {
            store.reverse_keys();
        }
        ctx.create_entity().unwrap();
    }

    #[test]
    fn attaching_a_parented_component_fails() {
        let mut ctx = context();
        let a = ctx.create_entity().unwrap();
        let b = ctx.create_entity().unwrap();
        let mass = ctx.add_component(a, Mass(1.0)).unwrap();
        assert_eq!(ctx.attach(b, mass), Err(EcsError::invalid(mass, "component already has a parent")));
    }

    #[test]
    fn cycles_are_rejected() {
        let mut ctx = context();
        let root = ctx.create_entity().unwrap();
        let child = ctx.create_entity().unwrap();
        ctx.attach(root, child).unwrap();

        assert_eq!(ctx.attach(child, root), Err(EcsError::invalid(root, "attaching would create a cycle")));
        assert_eq!(ctx.attach(root, root), Err(EcsError::invalid(root, "attaching would create a cycle")));
    }

    #[test]
    fn unknown_parent_is_not_found() {
        let mut ctx = context();
        let entity = ctx.create_entity().unwrap();
        let loose = ctx.create_component(Mass(1.0)).unwrap();
        assert_eq!(ctx.attach(99, entity), Err(EcsError::entity(99)));
        assert_eq!(ctx.attach(loose, entity), Err(EcsError::entity(loose)));
        assert!(ctx.get_component::<Mass>(entity).unwrap_err().is_not_found());
    }

    #[test]
    fn detach_makes_child_a_root_with_its_subtree() {
        let mut ctx = context();
        let root = ctx.create_entity().unwrap();
        let mid = ctx.create_entity().unwrap();
        let leaf = ctx.create_entity().unwrap();
        ctx.attach(root, mid).unwrap();
        ctx.attach(mid, leaf).unwrap();
        let mass = ctx.add_component(leaf, Mass(3.0)).unwrap();

        ctx.detach(root, mid).unwrap();
        let mid_info = ctx.info(mid).unwrap();
        assert!(mid_info.is_root());
        assert_eq!((mid_info.depth, mid_info.branch), (0, 0));
        let leaf_info = ctx.info(leaf).unwrap();
        assert_eq!((leaf_info.tree, leaf_info.depth), (mid, 1));
        assert_eq!(ctx.info(mass).unwrap().tree, mid);
        assert_eq!(ctx.entity_data(root).unwrap().child_count(), 0);
    }

    #[test]
    fn remove_tree_drops_every_descendant() {
        let mut ctx = context();
        let root = ctx.create_entity().unwrap();
        let mid = ctx.create_entity().unwrap();
        let leaf = ctx.create_entity().unwrap();
        ctx.attach(root, mid).unwrap();
        ctx.attach(mid, leaf).unwrap();
        let a = ctx.add_component(mid, Mass(1.0)).unwrap();
        let b = ctx.add_component(leaf, Mass(2.0)).unwrap();

        ctx.remove_component_from_entity(root, mid).unwrap();
        for id in [mid, leaf, a, b] {
            assert!(!ctx.contains(id));
        }
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.children(root).unwrap().count(), 0);
        assert_eq!(ctx.store::<Mass>().map(ComponentStore::len), Some(0));
    }

    #[test]
    fn remove_checks_the_expected_parent() {
        let mut ctx = context();
        let a = ctx.create_entity().unwrap();
        let b = ctx.create_entity().unwrap();
        let mass = ctx.add_component(a, Mass(1.0)).unwrap();
        assert_eq!(
            ctx.remove_component_from_entity(b, mass),
            Err(EcsError::invalid(mass, "component is not a child of that entity"))
        );
        assert!(ctx.contains(mass));
    }

    #[test]
    fn priority_moves_whole_tree_first() {
        let mut ctx = context();
        let first = ctx.create_entity().unwrap();
        let second = ctx.create_entity().unwrap();
        ctx.add_component(first, Mass(1.0)).unwrap();
        ctx.add_component(second, Mass(2.0)).unwrap();

        ctx.set_priority(second, 0).unwrap();
        let masses: Vec<f32> = ctx.store::<Mass>().unwrap().data().iter().map(|m| m.0).collect();
        assert_eq!(masses, vec![2.0, 1.0]);
        assert_eq!(ctx.priorities().get(second), 0);
        assert_eq!(ctx.priorities().get(first), LOWEST_PRIORITY);
    }

    #[test]
    fn structural_requests_wait_for_the_next_flush() {
        let mut ctx = context();
        let root = ctx.create_entity().unwrap();
        let (child, mass) = {
            let mut pass = ctx.begin_pass().unwrap();
            let child = pass.create_entity().unwrap();
            pass.attach(root, child).unwrap();
            let mass = pass.add_component(child, Mass(5.0)).unwrap();
            assert!(!pass.contains(child));
            assert_eq!(pass.commands().len(), 3);
            (child, mass)
        };
        assert!(!ctx.is_locked());
        assert_eq!(ctx.flush_deferred(), Ok(3));
        assert_eq!(ctx.info(child).unwrap().parent, Some(root));
        assert_eq!(ctx.info(mass).unwrap().parent, Some(child));
    }

    #[test]
    fn failed_command_leaves_the_rest_queued() {
        let mut ctx = context();
        let root = ctx.create_entity().unwrap();
        {
            let mut pass = ctx.begin_pass().unwrap();
            pass.detach(root, 77).unwrap();
            pass.set_tree_priority(root, 3).unwrap();
        }
        assert_eq!(ctx.flush_deferred(), Err(EcsError::component(77)));
        assert_eq!(ctx.commands().len(), 1);
        assert_eq!(ctx.flush_deferred(), Ok(1));
        assert_eq!(ctx.priorities().get(root), 3);
    }

    #[test]
    fn flushing_inside_a_pass_is_rejected() {
        let mut ctx = context();
        let mut pass = ctx.begin_pass().unwrap();
        assert_eq!(pass.flush_deferred(), Err(EcsError::misuse("cannot flush deferred commands during a pass")));
    }
}
