#![allow(dead_code)]

use arbor_ecs::{ComponentId, Context, ContextConfig, EcsResult};

pub const AGENTS_SMALL: usize = 10_000;
pub const AGENTS_MED: usize = 100_000;

/// Members per household entity.
pub const HOUSEHOLD: usize = 8;

#[derive(Clone, Copy)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy)]
pub struct Wealth {
    pub value: f32,
}

pub fn make_context() -> Context {
    Context::with_config(ContextConfig::default().with_verify_order(false).with_initial_store_capacity(1024))
}

/// Builds households of [`HOUSEHOLD`] member entities. Every member gets a
/// `Wealth`, every other member a `Position`, and each household head a
/// `Wealth` of its own.
///
/// Returns the household roots.
pub fn populate(ctx: &mut Context, agents: usize) -> EcsResult<Vec<ComponentId>> {
    let mut roots = Vec::with_capacity(agents / HOUSEHOLD + 1);
    for household in 0..agents.div_ceil(HOUSEHOLD) {
        let root = ctx.create_entity()?;
        ctx.add_component(root, Wealth { value: 100.0 })?;
        for member in 0..HOUSEHOLD {
            let agent = ctx.create_entity()?;
            ctx.attach(root, agent)?;
            ctx.add_component(agent, Wealth { value: (household + member) as f32 })?;
            if member % 2 == 0 {
                ctx.add_component(agent, Position { x: member as f32, y: household as f32 })?;
            }
        }
        roots.push(root);
    }
    Ok(roots)
}
