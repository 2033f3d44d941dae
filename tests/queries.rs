use std::collections::HashMap;

use proptest::prelude::*;

use arbor_ecs::{ComponentId, Context, EcsError, JoinOrder};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Load(ComponentId);

#[derive(Debug, Clone, Copy, PartialEq)]
struct Limit(u64);

/// One generated entity: optional parent among earlier entities plus which
/// component types it carries.
type Plan = (prop::sample::Index, bool, bool, bool);

struct Forest {
    ctx: Context,
    parents: HashMap<ComponentId, ComponentId>,
    limits: HashMap<ComponentId, u64>,
}

impl Forest {
    fn build(plan: &[Plan]) -> Self {
        let mut ctx = Context::new();
        let mut entities = Vec::new();
        let mut depths = Vec::new();
        let mut parents = HashMap::new();
        let mut limits = HashMap::new();

        for (position, (parent, attached, has_load, has_limit)) in plan.iter().enumerate() {
            let entity = ctx.create_entity().unwrap();
            let mut depth = 0;
            if *attached && position > 0 {
                let above = parent.index(position);
                if depths[above] < 7 {
                    ctx.attach(entities[above], entity).unwrap();
                    parents.insert(entity, entities[above]);
                    depth = depths[above] + 1;
                }
            }
            entities.push(entity);
            depths.push(depth);

            if *has_load {
                ctx.add_component(entity, Load(entity)).unwrap();
            }
            if *has_limit {
                ctx.add_component(entity, Limit(entity * 10)).unwrap();
                limits.insert(entity, entity * 10);
            }
        }
        Self { ctx, parents, limits }
    }

    fn nearest_limit_above(&self, entity: ComponentId) -> Option<u64> {
        let mut current = entity;
        while let Some(&parent) = self.parents.get(&current) {
            if let Some(&limit) = self.limits.get(&parent) {
                return Some(limit);
            }
            current = parent;
        }
        None
    }

    /// Owners holding a `Load`, in store order.
    fn load_owners(&self) -> Vec<ComponentId> {
        self.ctx.store::<Load>().map_or_else(Vec::new, |store| {
            store.infos().iter().filter_map(|info| info.parent).collect()
        })
    }
}

fn plans() -> impl Strategy<Value = Vec<Plan>> {
    prop::collection::vec((any::<prop::sample::Index>(), any::<bool>(), any::<bool>(), any::<bool>()), 1..24)
}

proptest! {
    #[test]
    fn same_owner_join_matches_brute_force(plan in plans()) {
        let mut forest = Forest::build(&plan);
        let expected: Vec<ComponentId> = forest
            .load_owners()
            .into_iter()
            .filter(|owner| forest.limits.contains_key(owner))
            .collect();

        let mut forward = Vec::new();
        let pairs = forest.ctx.view().join::<Load, Limit>(JoinOrder::Forward, |info, load, limit| {
            forward.push((info.parent, load.0, limit.0));
        }).unwrap();
        prop_assert_eq!(pairs, expected.len());
        let owners: Vec<ComponentId> = forward.iter().map(|&(_, load, _)| load).collect();
        prop_assert_eq!(&owners, &expected);
        for &(parent, load, limit) in &forward {
            prop_assert_eq!(parent, Some(load));
            prop_assert_eq!(limit, load * 10);
        }

        let mut reverse = Vec::new();
        forest.ctx.view().join::<Limit, Load>(JoinOrder::Reverse, |_, _, load| reverse.push(load.0)).unwrap();
        reverse.reverse();
        prop_assert_eq!(reverse, expected);
    }

    #[test]
    fn ancestor_join_matches_parent_walk(plan in plans()) {
        let mut forest = Forest::build(&plan);
        let mut seen = Vec::new();
        forest.ctx.view().join_with_parent::<Load, Limit>(|_, load, _, above| {
            seen.push((load.0, above.map(|limit| limit.0)));
        }).unwrap();

        for (owner, above) in seen {
            prop_assert_eq!(above, forest.nearest_limit_above(owner));
        }
    }

    #[test]
    fn same_type_ancestor_matches_parent_walk(plan in plans()) {
        let mut forest = Forest::build(&plan);
        let mut seen = Vec::new();
        forest.ctx.view().each_with_parent::<Limit>(|info, _, above| {
            seen.push((info.parent, above.map(|limit| limit.0)));
        });

        prop_assert_eq!(seen.len(), forest.limits.len());
        for (owner, above) in seen {
            let owner = owner.unwrap();
            prop_assert_eq!(above, forest.nearest_limit_above(owner));
        }
    }
}

#[test]
fn each_info_visits_in_sorted_order() {
    let mut ctx = Context::new();
    let late = ctx.create_entity().unwrap();
    let early = ctx.create_entity().unwrap();
    ctx.add_component(late, Limit(1)).unwrap();
    ctx.add_component(early, Limit(2)).unwrap();
    ctx.set_priority(early, 0).unwrap();

    let mut owners = Vec::new();
    ctx.view().each_info::<Limit>(|info, limit| {
        owners.push(info.parent);
        limit.0 += 100;
    });
    assert_eq!(owners, vec![Some(early), Some(late)]);
    assert_eq!(ctx.get_component::<Limit>(late), Ok(&Limit(101)));
}

#[test]
fn entity_join_skips_entities_without_the_type() {
    let mut ctx = Context::new();
    let with = ctx.create_entity().unwrap();
    let _without = ctx.create_entity().unwrap();
    ctx.add_component(with, Load(with)).unwrap();
    ctx.create_component(Load(999)).unwrap();

    let mut seen = Vec::new();
    let visited = ctx.view().each_entity::<Load>(|entity, load| seen.push((entity.id, load.0))).unwrap();
    assert_eq!(visited, 1);
    assert_eq!(seen, vec![(with, with)]);
}

#[test]
fn joining_a_type_with_itself_is_rejected() {
    let mut ctx = Context::new();
    let result = ctx.view().join::<Load, Load>(JoinOrder::Forward, |_, _, _| {});
    assert_eq!(result, Err(EcsError::misuse("cannot join a component type with itself")));
}

#[test]
fn view_exposes_raw_slices() {
    let mut ctx = Context::new();
    for n in 0..3 {
        let entity = ctx.create_entity().unwrap();
        ctx.add_component(entity, Limit(n)).unwrap();
    }
    let mut view = ctx.view();
    let limits = view.data_mut::<Limit>().unwrap();
    limits.iter_mut().for_each(|limit| limit.0 *= 2);
    assert!(view.data_mut::<Load>().is_none());
    assert_eq!(view.store::<Limit>().unwrap().data(), &[Limit(0), Limit(2), Limit(4)]);
}
