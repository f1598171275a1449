//! Entity identity for the ECS.
//!
//! This module provides the identifier types that name an entity and the allocator
//! that hands those identifiers out. An entity in this engine is not an object: it
//! is a plain numeric [`Id`] plus the [`GroupId`] of the group it currently lives
//! in. That pair, the [`Egid`], is the full address of an entity at a point in time.
//!
//! # Architecture
//!
//! - **[`Id`]**: A unique numeric identifier for an entity. Ids are allocated by the
//!   [`Allocator`] and recycled through a dead pool when entities are removed.
//!
//! - **[`Egid`]**: The (group, id) pair addressing an entity. The group half changes
//!   when the entity is swapped between groups; the id half is retained for the
//!   entity's whole lifetime.
//!
//! - **[`Reference`]**: A generational stable handle that survives group swaps and
//!   index compaction. Resolved through the [`Locator`].
//!
//! # Id Recycling
//!
//! Removed entity ids return to a dead pool and are reused by later allocations.
//! Staleness detection is *not* the id's job: a recycled id is a brand-new entity as
//! far as the stores are concerned. Stale detection belongs to [`Reference`], whose
//! generation is bumped when the handle is released.

mod locator;
pub mod reference;

use std::sync::atomic::{AtomicU32, Ordering};

use crossbeam::queue::SegQueue;

pub use locator::Locator;
pub use reference::{Generation, Reference};

use crate::ecs::storage::GroupId;

/// An entity identifier. Unique among live entities; recycled after removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(u32);

impl Id {
    /// Construct an entity Id from a raw u32 value.
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the index of this id if it were to live in indexable storage (e.g. Vec)
    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for Id {
    #[inline]
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

/// The full address of an entity at a point in time: the group it lives in plus its id.
///
/// The group half goes stale when the entity is swapped; always re-resolve through a
/// [`Reference`] across commits if the entity may have moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Egid {
    /// The group the entity currently lives in.
    group: GroupId,

    /// The entity's id, stable across swaps.
    id: Id,
}

impl Egid {
    /// Construct an entity address from a group and id.
    #[inline]
    pub const fn new(group: GroupId, id: Id) -> Self {
        Self { group, id }
    }

    /// Get the group half of the address.
    #[inline]
    pub fn group(&self) -> GroupId {
        self.group
    }

    /// Get the id half of the address.
    #[inline]
    pub fn id(&self) -> Id {
        self.id
    }

    /// The same entity addressed in a different group.
    #[inline]
    pub fn in_group(&self, group: GroupId) -> Self {
        Self::new(group, self.id)
    }
}

/// A lock-free allocator for entity ids.
///
/// Hands out unique ids and recycles freed ones through a dead pool to keep the id
/// space compact. All operations take `&self`, so ids can be reserved from observer
/// callbacks that only hold a shared borrow of the allocator.
#[derive(Default, Debug)]
pub struct Allocator {
    /// Pool of ids available for reuse.
    dead_pool: SegQueue<Id>,

    /// Next fresh id to allocate.
    next_id: AtomicU32,
}

impl Allocator {
    /// Construct a new entity id allocator starting from id 0.
    #[inline]
    pub const fn new() -> Self {
        Self {
            dead_pool: SegQueue::new(),
            next_id: AtomicU32::new(0),
        }
    }

    /// Allocate a new id, either by reusing a freed id from the dead pool
    /// or by taking a fresh sequential one.
    pub fn alloc(&self) -> Id {
        if let Some(id) = self.dead_pool.pop() {
            return id;
        }
        Id(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Return an id to the pool for reuse (lock-free).
    pub fn free(&self, id: Id) {
        self.dead_pool.push(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocator_uniqueness() {
        // Given
        let allocator = Allocator::default();

        // When
        let mut ids = Vec::new();
        for _ in 0..200 {
            ids.push(allocator.alloc());
        }

        // Then - No dupes generated
        let pre_len = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(pre_len, ids.len());
    }

    #[test]
    fn allocator_reuses_freed_ids() {
        // Given
        let allocator = Allocator::default();
        let ids: Vec<Id> = (0..10).map(|_| allocator.alloc()).collect();

        // When
        for id in &ids {
            allocator.free(*id);
        }
        let mut reused: Vec<Id> = (0..10).map(|_| allocator.alloc()).collect();

        // Then - Every freed id came back before any fresh one was minted
        reused.sort();
        assert_eq!(reused, {
            let mut sorted = ids.clone();
            sorted.sort();
            sorted
        });
        assert_eq!(allocator.alloc(), Id::new(10));
    }

    #[test]
    fn egid_in_group_retains_id() {
        // Given
        let egid = Egid::new(GroupId::new(1), Id::new(42));

        // When
        let moved = egid.in_group(GroupId::new(7));

        // Then
        assert_eq!(moved.id(), egid.id());
        assert_eq!(moved.group(), GroupId::new(7));
    }
}
