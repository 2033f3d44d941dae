use std::hint::black_box;

use criterion::*;
use arbor_ecs::{ComponentInfo, ComponentStore};

mod common;
use common::*;

fn store_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("store");

    group.bench_function("populate_10k_agents", |b| {
        b.iter(|| {
            let mut ctx = make_context();
            populate(&mut ctx, AGENTS_SMALL).unwrap();
            black_box(ctx);
        });
    });

    group.bench_function("add_remove_detached_10k", |b| {
        b.iter(|| {
            let mut store = ComponentStore::with_capacity(AGENTS_SMALL);
            for id in 0..AGENTS_SMALL as u64 {
                store.add(ComponentInfo::new(id), id).unwrap();
            }
            for id in (0..AGENTS_SMALL as u64).step_by(2) {
                store.remove(id).unwrap();
            }
            black_box(store);
        });
    });

    group.bench_function("tree_priority_cycle_100k", |b| {
        b.iter_batched(
            || {
                let mut ctx = make_context();
                let roots = populate(&mut ctx, AGENTS_MED).unwrap();
                (ctx, roots)
            },
            |(mut ctx, roots)| {
                for (priority, &root) in roots.iter().rev().take(64).enumerate() {
                    ctx.set_priority(root, priority as u64).unwrap();
                }
                black_box(ctx);
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("reparent_20_households_100k", |b| {
        b.iter_batched(
            || {
                let mut ctx = make_context();
                let roots = populate(&mut ctx, AGENTS_MED).unwrap();
                (ctx, roots)
            },
            |(mut ctx, roots)| {
                let town = ctx.create_entity().unwrap();
                for &root in roots.iter().take(20) {
                    ctx.attach(town, root).unwrap();
                }
                black_box(ctx);
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, store_benchmark);
criterion_main!(benches);
