//! Error types for the component store and hierarchy manager.
//!
//! Every fallible operation in the engine returns [`EcsResult`]. Failures are
//! local and synchronous: nothing is retried internally and nothing is
//! silently dropped. Callers either pre-validate (for example check that a
//! component has no parent before attaching it) or treat the error as fatal
//! to the current operation.
//!
//! ## Taxonomy
//! * [`EcsError::NotFound`]: an id is not present where it was looked up.
//! * [`EcsError::InvalidState`]: the request contradicts the current
//!   hierarchy or context state (re-parenting an attached component, cycles,
//!   duplicate ids, self joins, a full command queue).
//! * [`EcsError::TypeMismatch`]: two stores of different element types were
//!   asked to merge.
//! * [`EcsError::NotCopyable`]: a copy selected records of a type that never
//!   had copies enabled.
//! * [`EcsError::DepthLimit`] / [`EcsError::SiblingLimit`]: the packed branch
//!   encoding ran out of levels or sibling indices.
//! * [`EcsError::InvariantViolation`]: internal bookkeeping disagrees with
//!   itself. This is a bug signal, not a runtime condition.
//!
//! A store whose sort order has been broken is not reported through this
//! type: binary searching it would silently misbehave, so the store panics.
//!
//! ## Typical flow
//! ```ignore
//! fn reparent(ctx: &mut Context, parent: ComponentId, child: ComponentId) -> EcsResult<()> {
//!     if let Some(old_parent) = ctx.info(child)?.parent {
//!         ctx.detach(old_parent, child)?;
//!     }
//!     ctx.attach(parent, child)
//! }
//! ```

use crate::engine::types::{ComponentId, Depth, MAX_DEPTH, MAX_SIBLINGS};

/// Shorthand result type used across the engine.
pub type EcsResult<T> = Result<T, EcsError>;

/// Where a lookup failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// Any registered component or entity.
    Component,
    /// A record of the entity store.
    Entity,
    /// A record of one typed store.
    Store(&'static str),
    /// A component of the given type owned by an entity.
    Owned(&'static str),
}

impl std::fmt::Display for Lookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lookup::Component => f.write_str("component"),
            Lookup::Entity => f.write_str("entity"),
            Lookup::Store(name) => write!(f, "record in store `{name}`"),
            Lookup::Owned(name) => write!(f, "component `{name}` owned by entity"),
        }
    }
}

/// Aggregate error for every store, context and query operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EcsError {
    /// The id is unknown to the structure it was looked up in.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Offending id.
        id: ComponentId,
        /// What was being looked up.
        kind: Lookup,
    },

    /// The operation is not valid for the current state of the hierarchy.
    #[error("invalid state{}: {reason}", subject(.id))]
    InvalidState {
        /// Component or entity the operation targeted, if any.
        id: Option<ComponentId>,
        /// Short description of the conflict.
        reason: &'static str,
    },

    /// Two stores holding different element types were asked to merge.
    #[error("type mismatch: expected `{expected}`, got `{actual}`")]
    TypeMismatch {
        /// Element type of the destination store.
        expected: &'static str,
        /// Element type of the source store.
        actual: &'static str,
    },

    /// Records of a type without copy support were selected for a copy.
    #[error("component type `{0}` does not support copies")]
    NotCopyable(&'static str),

    /// Attaching would push an entity below the deepest branch level.
    #[error("entity {id} would sit at depth {depth}; at most {} levels are supported", MAX_DEPTH)]
    DepthLimit {
        /// Entity being attached.
        id: ComponentId,
        /// Depth it would have reached.
        depth: usize,
    },

    /// A parent has no free sibling index left for another entity child.
    #[error("entity {parent} already has {} entity children", MAX_SIBLINGS)]
    SiblingLimit {
        /// Parent whose sibling indices are exhausted.
        parent: ComponentId,
    },

    /// Internal bookkeeping is inconsistent.
    #[error("internal invariant violated: {0}")]
    InvariantViolation(&'static str),
}

impl EcsError {
    /// Builds a [`EcsError::NotFound`] for a component id.
    #[inline]
    pub fn component(id: ComponentId) -> Self {
        EcsError::NotFound { id, kind: Lookup::Component }
    }

    /// Builds a [`EcsError::NotFound`] for an entity id.
    #[inline]
    pub fn entity(id: ComponentId) -> Self {
        EcsError::NotFound { id, kind: Lookup::Entity }
    }

    /// Builds a [`EcsError::InvalidState`] about one id.
    #[inline]
    pub fn invalid(id: ComponentId, reason: &'static str) -> Self {
        EcsError::InvalidState { id: Some(id), reason }
    }

    /// Builds a [`EcsError::InvalidState`] not tied to an id.
    #[inline]
    pub fn misuse(reason: &'static str) -> Self {
        EcsError::InvalidState { id: None, reason }
    }

    /// Returns `true` for [`EcsError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, EcsError::NotFound { .. })
    }
}

fn subject(id: &Option<ComponentId>) -> String {
    id.map(|id| format!(" for {id}")).unwrap_or_default()
}

/// Depth an entity would reach below a parent at `parent_depth`, or an error
/// when the branch has no level left.
pub(crate) fn child_depth(id: ComponentId, parent_depth: Depth) -> EcsResult<Depth> {
    if parent_depth >= MAX_DEPTH {
        return Err(EcsError::DepthLimit { id, depth: parent_depth as usize + 1 });
    }
    Ok(parent_depth + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_single_line() {
        let messages = [
            EcsError::component(7).to_string(),
            EcsError::invalid(3, "component already has a parent").to_string(),
            EcsError::TypeMismatch { expected: "u32", actual: "f32" }.to_string(),
            EcsError::NotCopyable("u32").to_string(),
            EcsError::DepthLimit { id: 1, depth: 9 }.to_string(),
            EcsError::SiblingLimit { parent: 2 }.to_string(),
            EcsError::InvariantViolation("id map points to the wrong store").to_string(),
        ];
        for message in messages {
            assert!(!message.contains('\n'), "{message}");
        }
        assert_eq!(EcsError::component(7).to_string(), "component 7 not found");
        assert_eq!(
            EcsError::invalid(3, "component already has a parent").to_string(),
            "invalid state for 3: component already has a parent"
        );
        assert_eq!(
            EcsError::misuse("deferred command queue is full").to_string(),
            "invalid state: deferred command queue is full"
        );
    }

    #[test]
    fn child_depth_rejects_ninth_level() {
        assert_eq!(child_depth(1, 0), Ok(1));
        assert_eq!(child_depth(1, 7), Ok(8));
        assert_eq!(child_depth(1, 8), Err(EcsError::DepthLimit { id: 1, depth: 9 }));
    }
}
