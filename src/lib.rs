//! # Arbor ECS
//!
//! In-memory store for hierarchical entities and their typed components,
//! built for repeated whole-collection traversal.
//!
//! ## Design Goals
//! - One dense, sorted store per component type
//! - Hierarchy-aware order: every tree is a contiguous depth-first span
//! - Cross-type joins by merge, without per-query indexes
//! - Single-threaded passes with deferred structural mutation
//!
//! ## Quick start
//! ```rust
//! use arbor_ecs::prelude::*;
//!
//! # fn main() -> EcsResult<()> {
//! let mut ctx = Context::new();
//! let root = ctx.create_entity()?;
//! let child = ctx.create_entity()?;
//! ctx.attach(root, child)?;
//! ctx.add_component(root, 1.0f32)?;
//! ctx.add_component(child, 2.0f32)?;
//!
//! let mut sums = Vec::new();
//! ctx.view().each_with_parent::<f32>(|_, value, parent| {
//!     sums.push(*value + parent.copied().unwrap_or(0.0));
//! });
//! assert_eq!(sums, vec![1.0, 3.0]);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![allow(clippy::module_inception)]
#![deny(dead_code)]

pub mod engine;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (Public API)
// ─────────────────────────────────────────────────────────────────────────────

pub use engine::context::{Context, TransferFilter};
pub use engine::config::ContextConfig;

pub use engine::info::{
    ComponentInfo,
    SortKey,
    TreePriorities,
};

pub use engine::entity::{
    EntityData,
    IdAllocator,
};

pub use engine::storage::{
    ComponentStore,
    ErasedStore,
};

pub use engine::component::{
    Catalog,
    ComponentDesc,
    ComponentRegistry,
    ENTITY_STORE,
};

pub use engine::query::{JoinOrder, View};
pub use engine::borrow::PassGuard;

pub use engine::systems::{FnSystem, System};
pub use engine::scheduler::Schedule;

pub use engine::commands::{Command, Commands};

pub use engine::error::{
    EcsResult,
    EcsError,
    Lookup,
};

pub use engine::types::{
    ComponentId,
    TreeId,
    Priority,
    Branch,
    Depth,
    SiblingIndex,
    LOWEST_PRIORITY,
    MAX_DEPTH,
    MAX_SIBLINGS,
};

// ─────────────────────────────────────────────────────────────────────────────
// Prelude
// ─────────────────────────────────────────────────────────────────────────────

/// Commonly used types.
///
/// Import with:
/// ```rust
/// use arbor_ecs::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Context,
        ContextConfig,
        ComponentId,
        ComponentInfo,
        Commands,
        EcsError,
        EcsResult,
        FnSystem,
        JoinOrder,
        Schedule,
        System,
        View,
    };
}
