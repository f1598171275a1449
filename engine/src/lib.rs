//! Archetype-style entity-component storage with deferred structural mutation.
//!
//! Entities live as component values in dense per-(group, type) stores. Reads
//! and value mutation are immediate; structural changes (adds, removals, moves
//! between groups) are queued and land atomically when
//! [`World::submit`](ecs::World::submit) runs, in a fixed removal/swap/add
//! order with structural-change observers fired along the way. Entities keep a
//! stable generational [`Reference`](ecs::Reference) that survives compaction
//! and group moves.

// Lets the derive macro expand to `::hive_engine::...` paths inside this crate
// as well as in downstream crates.
extern crate self as hive_engine;

pub mod ecs;
