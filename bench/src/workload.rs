//! Seeded, reproducible world population and churn helpers.

use hive_engine::ecs::{GroupId, World, entity};
use rand::{Rng, SeedableRng, seq::SliceRandom};
use rand_chacha::ChaCha8Rng;

use crate::components::{Lifetime, Position, Velocity};

/// Fixed seed so every benchmark run sees the same entity layout.
pub const SEED: u64 = 0x5eed_cafe;

/// Build a deterministic RNG for a benchmark.
pub fn rng() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(SEED)
}

/// Populate one group with `count` entities holding position and velocity.
///
/// Returns the ids in spawn order for follow-up churn.
pub fn populate(world: &mut World, group: GroupId, count: usize) -> Vec<entity::Id> {
    let mut rng = rng();
    let mut ids = Vec::with_capacity(count);
    for _ in 0..count {
        let id = world.next_id();
        world
            .enqueue_add(
                group,
                id,
                Position {
                    x: rng.gen_range(-100.0..100.0),
                    y: rng.gen_range(-100.0..100.0),
                    z: 0.0,
                },
            )
            .unwrap();
        world.enqueue_add(group, id, Velocity { x: 1.0, y: 0.0, z: 0.0 }).unwrap();
        world
            .enqueue_add(group, id, Lifetime { seconds: rng.gen_range(0.5..5.0) })
            .unwrap();
        ids.push(id);
    }
    world.submit().unwrap();
    ids
}

/// One churn cycle: remove a shuffled fraction of the entities and spawn the
/// same number of replacements, then commit.
pub fn churn(world: &mut World, group: GroupId, ids: &mut Vec<entity::Id>, fraction: f64) {
    let mut rng = rng();
    let victims = ((ids.len() as f64) * fraction) as usize;
    ids.shuffle(&mut rng);
    for id in ids.drain(..victims) {
        world.enqueue_remove_entity(group, id).unwrap();
    }
    for _ in 0..victims {
        let id = world.next_id();
        world.enqueue_add(group, id, Position::default()).unwrap();
        world.enqueue_add(group, id, Velocity::default()).unwrap();
        world.enqueue_add(group, id, Lifetime { seconds: 1.0 }).unwrap();
        ids.push(id);
    }
    world.submit().unwrap();
}
