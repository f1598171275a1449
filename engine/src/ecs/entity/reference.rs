//! Stable generational handles to entities.
//!
//! A [`Reference`] names an entity without pinning down where it lives. The handle
//! stays valid across group swaps and index compaction; it only dies when the entity
//! it names is removed. Staleness is detected with a generation counter: releasing a
//! handle slot bumps its generation, so any outstanding copies of the old handle no
//! longer match and resolve to nothing.
//!
//! The [`Allocator`] is fully lock-free. Slots come from an atomic counter or a
//! dead pool, and generations live in a growable array of atomics, so handles can be
//! minted from observer callbacks that only hold a shared borrow.

use std::sync::{
    RwLock,
    atomic::{AtomicU32, Ordering},
};

use crossbeam::queue::SegQueue;

/// The generation of a handle slot. Incremented each time the slot is released,
/// invalidating all handles minted for the previous occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u32);

impl Generation {
    /// The first generation of a slot.
    pub(crate) const FIRST: Self = Self(0);

    /// Get the next generation from the current.
    #[inline]
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

/// A stable handle to an entity.
///
/// Copyable and cheap; holding one does not keep the entity alive. Resolve it
/// through the locator to get the entity's current address, or `None` if the
/// entity has since been removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reference {
    /// The slot in the locator's handle table.
    slot: u32,

    /// The generation the slot had when this handle was minted.
    generation: Generation,
}

impl Reference {
    /// Construct a handle for a slot at a known generation.
    #[inline]
    pub(crate) const fn new(slot: u32, generation: Generation) -> Self {
        Self { slot, generation }
    }

    /// Get the slot index for use in indexable storage.
    #[inline]
    pub fn index(&self) -> usize {
        self.slot as usize
    }

    /// Get the generation this handle was minted at.
    #[inline]
    pub fn generation(&self) -> Generation {
        self.generation
    }
}

const CHUNK_SIZE: usize = 4096;

/// Growable array of atomic generations, one per handle slot.
#[derive(Default, Debug)]
struct Generations {
    chunks: RwLock<Vec<Box<[AtomicU32; CHUNK_SIZE]>>>,
}

impl Generations {
    const fn new() -> Self {
        Self {
            chunks: RwLock::new(Vec::new()),
        }
    }

    fn get(&self, slot: u32) -> Generation {
        let chunk_idx = slot as usize / CHUNK_SIZE;
        let slot_idx = slot as usize % CHUNK_SIZE;

        let chunks = self.chunks.read().unwrap();
        Generation(if chunk_idx < chunks.len() {
            chunks[chunk_idx][slot_idx].load(Ordering::Acquire)
        } else {
            0 // Fresh slot, generation 0
        })
    }

    fn increment(&self, slot: u32) {
        self.ensure_capacity(slot);
        let chunk_idx = slot as usize / CHUNK_SIZE;
        let slot_idx = slot as usize % CHUNK_SIZE;

        let chunks = self.chunks.read().unwrap();
        chunks[chunk_idx][slot_idx].fetch_add(1, Ordering::Release);
    }

    fn ensure_capacity(&self, slot: u32) {
        let chunk_idx = slot as usize / CHUNK_SIZE;
        let chunks_len = self.chunks.read().unwrap().len();

        if chunk_idx >= chunks_len {
            let mut chunks = self.chunks.write().unwrap();
            while chunks.len() <= chunk_idx {
                chunks.push(Box::new(std::array::from_fn(|_| AtomicU32::new(0))));
            }
        }
    }
}

/// A lock-free allocator for handle slots.
///
/// Released slots are recycled through a dead pool after their generation has been
/// bumped, so stale handles to the old occupant can never match the new one.
#[derive(Default, Debug)]
pub struct Allocator {
    /// Generation counter for each slot.
    generations: Generations,

    /// Pool of slots available for reuse.
    dead_pool: SegQueue<u32>,

    /// Next fresh slot to allocate.
    next_slot: AtomicU32,
}

impl Allocator {
    /// Construct a new handle allocator starting from slot 0.
    #[inline]
    pub const fn new() -> Self {
        Self {
            generations: Generations::new(),
            dead_pool: SegQueue::new(),
            next_slot: AtomicU32::new(0),
        }
    }

    /// Mint a handle, either by reusing a released slot from the dead pool
    /// or by taking a fresh sequential one.
    pub fn alloc(&self) -> Reference {
        if let Some(slot) = self.dead_pool.pop() {
            return Reference::new(slot, self.generations.get(slot));
        }

        let slot = self.next_slot.fetch_add(1, Ordering::Relaxed);
        self.generations.ensure_capacity(slot);
        Reference::new(slot, Generation::FIRST)
    }

    /// Release a handle's slot for reuse (lock-free).
    ///
    /// Bumps the slot's generation so outstanding copies of the handle go stale.
    pub fn free(&self, reference: Reference) {
        let slot = reference.slot;
        self.generations.increment(slot);
        self.dead_pool.push(slot);
    }

    /// Check whether a handle matches its slot's current generation.
    #[inline]
    pub fn is_current(&self, reference: Reference) -> bool {
        self.generations.get(reference.slot) == reference.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_mints_sequential_slots() {
        // Given
        let allocator = Allocator::new();

        // When
        let a = allocator.alloc();
        let b = allocator.alloc();

        // Then
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(a.generation(), Generation::FIRST);
    }

    #[test]
    fn free_bumps_generation_and_recycles_slot() {
        // Given
        let allocator = Allocator::new();
        let original = allocator.alloc();

        // When
        allocator.free(original);
        let recycled = allocator.alloc();

        // Then - Same slot, next generation; the original handle is stale
        assert_eq!(recycled.index(), original.index());
        assert_eq!(recycled.generation(), original.generation().next());
        assert!(!allocator.is_current(original));
        assert!(allocator.is_current(recycled));
    }

    #[test]
    fn slots_past_first_chunk_grow_on_demand() {
        // Given
        let allocator = Allocator::new();

        // When - Burn through more slots than one chunk holds
        let mut last = allocator.alloc();
        for _ in 0..CHUNK_SIZE {
            last = allocator.alloc();
        }
        allocator.free(last);
        let recycled = allocator.alloc();

        // Then
        assert_eq!(recycled.index(), last.index());
        assert_eq!(recycled.generation(), Generation(1));
    }
}
