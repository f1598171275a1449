//! Submission-pipeline benchmarks using Criterion.
//!
//! These measure the deferred commit path in isolation:
//! - Staged adds landing in bulk
//! - Removal compaction under churn
//! - Group-to-group swaps
//! - Observer dispatch overhead

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use hive_bench::components::*;
use hive_bench::workload;
use hive_engine::ecs::{GroupId, World, entity};

const GROUP: GroupId = GroupId::new(1);
const OTHER: GroupId = GroupId::new(2);

fn bench_add_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_commit");

    for count in [100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(count as u64));

        // Single small component per entity
        group.bench_with_input(BenchmarkId::new("single_component", count), &count, |b, &n| {
            b.iter(|| {
                let mut world = World::new();
                for index in 0..n as u32 {
                    world
                        .enqueue_add(GROUP, entity::Id::new(index), Position::default())
                        .unwrap();
                }
                world.submit().unwrap();
                black_box(world.store::<Position>(GROUP).unwrap().len());
            });
        });

        // Three components per entity, including the 64-byte transform
        group.bench_with_input(BenchmarkId::new("three_components", count), &count, |b, &n| {
            b.iter(|| {
                let mut world = World::new();
                for index in 0..n as u32 {
                    let id = entity::Id::new(index);
                    world.enqueue_add(GROUP, id, Position::default()).unwrap();
                    world.enqueue_add(GROUP, id, Velocity::default()).unwrap();
                    world.enqueue_add(GROUP, id, Transform::default()).unwrap();
                }
                world.submit().unwrap();
                black_box(world.store::<Transform>(GROUP).unwrap().len());
            });
        });
    }

    group.finish();
}

fn bench_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("churn");

    for count in [1_000, 10_000] {
        group.throughput(Throughput::Elements(count as u64));

        // Remove and replace a quarter of the population each cycle
        group.bench_with_input(BenchmarkId::new("quarter", count), &count, |b, &n| {
            let mut world = World::new();
            let mut ids = workload::populate(&mut world, GROUP, n as usize);
            b.iter(|| {
                workload::churn(&mut world, GROUP, &mut ids, 0.25);
                black_box(world.store::<Position>(GROUP).unwrap().len());
            });
        });
    }

    group.finish();
}

fn bench_swap(c: &mut Criterion) {
    let mut group = c.benchmark_group("swap");

    for count in [1_000, 10_000] {
        group.throughput(Throughput::Elements(count as u64));

        // Bounce every entity between two groups, one direction per iteration
        group.bench_with_input(BenchmarkId::new("per_entity", count), &count, |b, &n| {
            let mut world = World::new();
            let ids = workload::populate(&mut world, GROUP, n as usize);
            let mut source = GROUP;
            let mut destination = OTHER;
            b.iter(|| {
                for &id in &ids {
                    world.enqueue_swap_entity(source, destination, id).unwrap();
                }
                world.submit().unwrap();
                std::mem::swap(&mut source, &mut destination);
                black_box(world.store::<Position>(source).unwrap().len());
            });
        });

        // Whole-group swap of the same population
        group.bench_with_input(BenchmarkId::new("whole_group", count), &count, |b, &n| {
            let mut world = World::new();
            workload::populate(&mut world, GROUP, n as usize);
            let mut source = GROUP;
            let mut destination = OTHER;
            b.iter(|| {
                world.enqueue_swap_group(source, destination).unwrap();
                world.submit().unwrap();
                std::mem::swap(&mut source, &mut destination);
                black_box(world.store::<Position>(source).unwrap().len());
            });
        });
    }

    group.finish();
}

fn bench_observers(c: &mut Criterion) {
    let mut group = c.benchmark_group("observers");

    for count in [1_000, 10_000] {
        group.throughput(Throughput::Elements(count as u64));

        // Precise add observer invoked once per entity
        group.bench_with_input(BenchmarkId::new("precise_add", count), &count, |b, &n| {
            b.iter(|| {
                let mut world = World::new();
                world.on_added::<Position, _>(|_, egid, value| {
                    black_box((egid, value.x));
                });
                for index in 0..n as u32 {
                    world
                        .enqueue_add(GROUP, entity::Id::new(index), Position::default())
                        .unwrap();
                }
                world.submit().unwrap();
            });
        });

        // Fast add observer invoked once per batch range
        group.bench_with_input(BenchmarkId::new("fast_add", count), &count, |b, &n| {
            b.iter(|| {
                let mut world = World::new();
                world.on_added_range::<Position, _>(|_, _, store, range| {
                    black_box(store.values_in(range).len());
                });
                for index in 0..n as u32 {
                    world
                        .enqueue_add(GROUP, entity::Id::new(index), Position::default())
                        .unwrap();
                }
                world.submit().unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_add_commit,
    bench_churn,
    bench_swap,
    bench_observers
);
criterion_main!(benches);
