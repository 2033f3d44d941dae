//! Sequential system scheduling.
//!
//! A [`Schedule`] runs its systems in registration order, one pass at a
//! time.
//!
//! ## Structural synchronization
//!
//! Deferred commands are applied **before** each pass begins. Commands
//! recorded by systems during a pass stay queued until the next pass, or
//! until the caller flushes explicitly.

use log::trace;

use crate::engine::context::Context;
use crate::engine::error::EcsResult;
use crate::engine::systems::System;

/// Ordered list of systems sharing one update context type.
pub struct Schedule<U> {
    systems: Vec<Box<dyn System<U>>>,
}

impl<U> Default for Schedule<U> {
    fn default() -> Self {
        Self { systems: Vec::new() }
    }
}

impl<U> Schedule<U> {
    /// Creates an empty schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `system` to the schedule.
    pub fn add(&mut self, system: impl System<U> + 'static) -> &mut Self {
        self.systems.push(Box::new(system));
        self
    }

    /// Number of registered systems.
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// Returns `true` if no system is registered.
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Runs one pass.
    ///
    /// ## Behavior
    /// 1. Flushes the deferred queue and locks the context.
    /// 2. Calls `before` on every system.
    /// 3. Calls `run` on every system, stopping at the first error.
    /// 4. Calls `after` on every system.
    ///
    /// The context is unlocked again when this returns, even on error.
    ///
    /// ## Errors
    /// The first error from flushing or from a system's `run`. `after` is
    /// skipped when a system fails.

    pub fn run(&mut self, context: &mut Context, update: &U) -> EcsResult<()> {
        let mut pass = context.begin_pass()?;

        for system in &mut self.systems {
            system.before(update);
        }

        {
            let (mut view, commands) = pass.split();
            for system in &mut self.systems {
                trace!("running system {}", system.name());
                system.run(&mut view, commands, update)?;
            }
        }

        for system in &mut self.systems {
            system.after(update);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::commands::Commands;
    use crate::engine::query::View;
    use crate::engine::systems::FnSystem;

    struct Counter {
        calls: Vec<&'static str>,
    }

    impl System<u32> for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn before(&mut self, _update: &u32) {
            self.calls.push("before");
        }

        fn run(&mut self, view: &mut View<'_>, _commands: &mut Commands, update: &u32) -> EcsResult<()> {
            view.each::<u32>(|value| *value += update);
            self.calls.push("run");
            Ok(())
        }

        fn after(&mut self, _update: &u32) {
            self.calls.push("after");
        }
    }

    #[test]
    fn systems_run_in_order_and_defer_structure() {
        let mut context = Context::new();
        let entity = context.create_entity().unwrap();
        context.add_component(entity, 10u32).unwrap();

        let mut schedule = Schedule::new();
        schedule.add(Counter { calls: Vec::new() });
        schedule.add(FnSystem::new("spawner", |_: &mut View<'_>, commands: &mut Commands, _: &u32| {
            commands.create_entity().map(|_| ())
        }));
        assert_eq!(schedule.len(), 2);

        schedule.run(&mut context, &5).unwrap();
        assert_eq!(context.get_component::<u32>(entity), Ok(&15));
        assert_eq!(context.commands().len(), 1);
        assert!(!context.is_locked());

        let before = context.len();
        schedule.run(&mut context, &1).unwrap();
        assert_eq!(context.len(), before + 1);
        assert_eq!(context.commands().len(), 1);
    }

    #[test]
    fn failing_system_unlocks_the_context() {
        let mut context = Context::new();
        let mut schedule: Schedule<()> = Schedule::new();
        schedule.add(FnSystem::new("self-join", |view: &mut View<'_>, _: &mut Commands, _: &()| {
            view.join::<u8, u8>(Default::default(), |_, _, _| {}).map(|_| ())
        }));
        assert!(schedule.run(&mut context, &()).is_err());
        assert!(!context.is_locked());
    }
}
