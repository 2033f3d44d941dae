//! System abstractions.
//!
//! A **system** is a unit of logic run once per pass. Systems:
//! - read and update payloads through a [`View`],
//! - request structural changes through [`Commands`], which take effect at
//!   the start of the next pass,
//! - receive a caller-defined update context `U` (a time step, a random
//!   source, ...).
//!
//! Systems never receive the context itself during `run`, so the sorted
//! store layout is stable for the whole pass.
//!
//! ## Function-backed systems
//!
//! [`FnSystem`] wraps a closure for systems that need no `before`/`after`
//! hooks and no state of their own.

use crate::engine::commands::Commands;
use crate::engine::error::EcsResult;
use crate::engine::query::View;

/// A unit of logic executed by a [`Schedule`](crate::engine::scheduler::Schedule).
///
/// ## Hooks
/// For every pass the schedule calls `before` on all systems, then `run` on
/// all systems, then `after` on all systems, each in registration order.

pub trait System<U> {
    /// Human-readable name, used in logs.
    fn name(&self) -> &str;

    /// Called at the start of a pass, before any system runs.
    fn before(&mut self, _update: &U) {}

    /// Executes the system against the locked stores.
    fn run(&mut self, view: &mut View<'_>, commands: &mut Commands, update: &U) -> EcsResult<()>;

    /// Called at the end of a pass, after every system ran.
    fn after(&mut self, _update: &U) {}
}

/// A [`System`] backed by a closure.
pub struct FnSystem<F> {
    name: &'static str,
    f: F,
}

impl<F> FnSystem<F> {
    /// Creates a new function-backed system.
    ///
    /// # Parameters
    /// - `name`: Human-readable name, useful for debugging.
    /// - `f`: The closure executed when the system runs.
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }
}

impl<U, F> System<U> for FnSystem<F>
where
    F: FnMut(&mut View<'_>, &mut Commands, &U) -> EcsResult<()>,
{
    fn name(&self) -> &str {
        self.name
    }

    fn run(&mut self, view: &mut View<'_>, commands: &mut Commands, update: &U) -> EcsResult<()> {
        (self.f)(view, commands, update)
    }
}
