//! # Commands
//!
//! This module defines deferred commands used to mutate the hierarchy.
//!
//! ## Purpose
//! Commands provide an explicit, ordered representation of structural
//! mutations such as entity creation, attaching, detaching and removal.
//!
//! While a traversal pass is active the context's lock flag is set and every
//! structural request is recorded as a `Command` instead of being applied.
//! The queue is drained at the next synchronization point.
//!
//! ## Design
//! - Commands are plain data describing *what* change should occur, not *how*.
//! - Execution is handled by the context in submission order.
//! - Ids of entities and components created through the queue are reserved
//!   up front, so callers can refer to them before the command runs.
//!
//! ## Invariants
//! - Commands are executed in the order they are recorded.
//! - Validation happens at execution time against the state at that moment.

use std::collections::VecDeque;
use std::fmt;

use crate::engine::context::Context;
use crate::engine::entity::IdAllocator;
use crate::engine::error::{EcsError, EcsResult};
use crate::engine::types::{ComponentId, Priority, TreeId};

/// Deferred closure run against the context.
pub type CustomCommand = Box<dyn FnOnce(&mut Context) -> EcsResult<()>>;

/// Represents a deferred structural mutation.
///
/// ## Invariants
/// - Commands must be applied in the order they are issued.
/// - Ids must be valid at execution time, except for reserved ids of
///   entities being created.

pub enum Command {
    /// Creates an entity under a reserved id.
    CreateEntity {
        /// Reserved id of the new entity.
        id: ComponentId,
    },

    /// Attaches `child` to the entity `parent`.
    Attach {
        /// Owning entity.
        parent: ComponentId,
        /// Component or entity being attached.
        child: ComponentId,
    },

    /// Detaches `child` from `parent`; the child becomes a root.
    Detach {
        /// Current owner.
        parent: ComponentId,
        /// Component or entity being detached.
        child: ComponentId,
    },

    /// Removes `id` and its whole subtree.
    ///
    /// ## Behavior
    /// - When `parent` is set, `id` must currently be owned by it.
    Remove {
        /// Expected owner, if checked.
        parent: Option<ComponentId>,
        /// Root of the removed subtree.
        id: ComponentId,
    },

    /// Re-derives positions below `entity`.
    UpdateTree {
        /// Entity whose descendants are recomputed.
        entity: ComponentId,
    },

    /// Changes the priority of a whole tree.
    SetPriority {
        /// Tree id.
        tree: TreeId,
        /// New priority.
        priority: Priority,
    },

    /// Arbitrary deferred work, such as inserting a typed component value.
    Custom(CustomCommand),
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::CreateEntity { id } => f.debug_struct("CreateEntity").field("id", id).finish(),
            Command::Attach { parent, child } => {
                f.debug_struct("Attach").field("parent", parent).field("child", child).finish()
            }
            Command::Detach { parent, child } => {
                f.debug_struct("Detach").field("parent", parent).field("child", child).finish()
            }
            Command::Remove { parent, id } => {
                f.debug_struct("Remove").field("parent", parent).field("id", id).finish()
            }
            Command::UpdateTree { entity } => f.debug_struct("UpdateTree").field("entity", entity).finish(),
            Command::SetPriority { tree, priority } => {
                f.debug_struct("SetPriority").field("tree", tree).field("priority", priority).finish()
            }
            Command::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// FIFO of deferred commands plus the pass lock flag.
///
/// Systems receive `&mut Commands` during a pass and record structural
/// changes through it.

pub struct Commands {
    queue: VecDeque<Command>,
    locked: bool,
    limit: Option<usize>,
    ids: IdAllocator,
}

impl Commands {
    /// Creates an empty, unlocked queue drawing ids from `ids`.
    pub fn new(ids: IdAllocator, limit: Option<usize>) -> Self {
        Self { queue: VecDeque::new(), locked: false, limit, ids }
    }

    /// Records `command`.
    ///
    /// ## Errors
    /// [`EcsError::InvalidState`] if the queue is at its configured limit.

    pub fn push(&mut self, command: Command) -> EcsResult<()> {
        if self.limit.is_some_and(|limit| self.queue.len() >= limit) {
            return Err(EcsError::misuse("deferred command queue is full"));
        }
        self.queue.push_back(command);
        Ok(())
    }

    /// Queues the creation of an entity and returns its reserved id.
    pub fn create_entity(&mut self) -> EcsResult<ComponentId> {
        let id = self.ids.next_id();
        self.push(Command::CreateEntity { id })?;
        Ok(id)
    }

    /// Queues adding `value` as a new component of `entity` and returns the
    /// component's reserved id.
    pub fn add_component<T: 'static>(&mut self, entity: ComponentId, value: T) -> EcsResult<ComponentId> {
        let id = self.ids.next_id();
        self.push(Command::Custom(Box::new(move |context: &mut Context| {
            context.insert_component(entity, id, value)
        })))?;
        Ok(id)
    }

    /// Queues attaching `child` to `parent`.
    pub fn attach(&mut self, parent: ComponentId, child: ComponentId) -> EcsResult<()> {
        self.push(Command::Attach { parent, child })
    }

    /// Queues detaching `child` from `parent`.
    pub fn detach(&mut self, parent: ComponentId, child: ComponentId) -> EcsResult<()> {
        self.push(Command::Detach { parent, child })
    }

    /// Queues removing `id` and its subtree.
    pub fn remove(&mut self, id: ComponentId) -> EcsResult<()> {
        self.push(Command::Remove { parent: None, id })
    }

    /// Queues a tree priority change.
    pub fn set_tree_priority(&mut self, tree: TreeId, priority: Priority) -> EcsResult<()> {
        self.push(Command::SetPriority { tree, priority })
    }

    /// Queues an arbitrary closure.
    pub fn custom(&mut self, f: impl FnOnce(&mut Context) -> EcsResult<()> + 'static) -> EcsResult<()> {
        self.push(Command::Custom(Box::new(f)))
    }

    /// Number of queued commands.
    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns `true` if nothing is queued.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns `true` while a pass is active.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub(crate) fn lock(&mut self) {
        debug_assert!(!self.locked, "pass started while another pass is active");
        self.locked = true;
    }

    pub(crate) fn unlock(&mut self) {
        self.locked = false;
    }

    pub(crate) fn pop(&mut self) -> Option<Command> {
        self.queue.pop_front()
    }
}
