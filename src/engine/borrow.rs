//! # Pass Guard
//!
//! RAII marker for an active traversal pass.
//!
//! ## Purpose
//! While a pass runs, the stores' sorted layout must not change under the
//! code iterating them. The guard sets the context's lock flag on creation
//! and clears it on drop; while the flag is set every structural request is
//! queued instead of applied.
//!
//! ## Synchronization
//! The guard does not flush on drop. Queued commands are applied by the next
//! [`Context::begin_pass`] or an explicit [`Context::flush_deferred`].

use std::ops::{Deref, DerefMut};

use crate::engine::commands::Commands;
use crate::engine::context::Context;
use crate::engine::query::View;

/// Holds a context locked for the length of one pass.
///
/// Dereferences to the [`Context`], so the usual facade is available; its
/// structural methods queue commands while the guard lives.

pub struct PassGuard<'a> {
    context: &'a mut Context,
}

impl<'a> PassGuard<'a> {
    pub(crate) fn new(context: &'a mut Context) -> Self {
        context.lock();
        Self { context }
    }

    /// Splits the guarded context into a traversal view and the command
    /// queue, so a system can read stores and record changes at once.
    pub fn split(&mut self) -> (View<'_>, &mut Commands) {
        self.context.split_for_pass()
    }
}

impl Deref for PassGuard<'_> {
    type Target = Context;

    fn deref(&self) -> &Context {
        self.context
    }
}

impl DerefMut for PassGuard<'_> {
    fn deref_mut(&mut self) -> &mut Context {
        self.context
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.context.unlock();
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::context::Context;

    #[test]
    fn guard_locks_until_dropped() {
        let mut context = Context::new();
        {
            let guard = context.begin_pass().unwrap();
            assert!(guard.is_locked());
        }
        assert!(!context.is_locked());
    }

    #[test]
    fn split_view_and_queue() {
        let mut context = Context::new();
        let entity = context.create_entity().unwrap();
        context.add_component(entity, 1u32).unwrap();

        let mut guard = context.begin_pass().unwrap();
        let (mut view, commands) = guard.split();
        view.each::<u32>(|value| *value += 1);
        commands.remove(entity).unwrap();
        drop(guard);

        assert_eq!(context.get_component::<u32>(entity), Ok(&2));
        assert_eq!(context.flush_deferred(), Ok(1));
        assert!(!context.contains(entity));
    }
}
