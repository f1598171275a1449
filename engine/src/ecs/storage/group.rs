//! Entity groups.
//!
//! A [`Group`] is a named partition of the world: one [`DenseStore`] per component
//! type that any of its entities carry. An entity lives in exactly one group at a
//! time, and every bulk operation (removal, swap, notification range) is scoped to
//! a single (group, component) pair.

use fixedbitset::FixedBitSet;

use crate::ecs::{component, storage::AnyStore};

/// A group identifier. Groups are named by the caller, not allocated by the engine.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(u32);

impl GroupId {
    /// Construct a group Id from a raw u32 value.
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the index of this group if it were to live in indexable storage (e.g. Vec)
    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for GroupId {
    #[inline]
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

/// One partition of the world: a set of type-erased component stores.
///
/// Stores are kept in a small vector and located by linear scan on the dense
/// component tag; groups rarely hold more than a handful of component types.
/// A bitset mirrors which tags are present for O(1) membership checks.
#[derive(Default)]
pub struct Group {
    /// The component stores, one per component type present in this group.
    stores: Vec<Box<dyn AnyStore>>,

    /// Which component tags have a store here, indexed by `component::Id`.
    present: FixedBitSet,
}

impl Group {
    /// Create an empty group.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether this group has a store for a component tag.
    #[inline]
    pub fn has(&self, tag: component::Id) -> bool {
        self.present.contains(tag.index())
    }

    /// Get the store for a component tag.
    pub fn store(&self, tag: component::Id) -> Option<&dyn AnyStore> {
        self.stores
            .iter()
            .find(|store| store.tag() == tag)
            .map(|store| store.as_ref())
    }

    /// Get the store for a component tag, mutably.
    pub(crate) fn store_mut(&mut self, tag: component::Id) -> Option<&mut dyn AnyStore> {
        // The unsizing coercion has to happen at the annotated return, not
        // inside a closure, because `&mut` is invariant in its pointee.
        let store = self.stores.iter_mut().find(|store| store.tag() == tag)?;
        Some(store.as_mut())
    }

    /// Insert a store. The caller guarantees no store for the same tag exists.
    pub(crate) fn insert(&mut self, store: Box<dyn AnyStore>) {
        let tag = store.tag();
        debug_assert!(!self.has(tag), "group already has a store for {tag:?}");
        self.present.grow(tag.index() + 1);
        self.present.insert(tag.index());
        self.stores.push(store);
    }

    /// Check a store out of the group by tag.
    ///
    /// Used during swaps so source and destination stores can be borrowed
    /// independently; the caller puts the store back when done.
    pub(crate) fn take(&mut self, tag: component::Id) -> Option<Box<dyn AnyStore>> {
        let position = self.stores.iter().position(|store| store.tag() == tag)?;
        self.present.set(tag.index(), false);
        Some(self.stores.swap_remove(position))
    }

    /// Iterate over the component tags present in this group.
    pub fn tags(&self) -> impl Iterator<Item = component::Id> + '_ {
        self.stores.iter().map(|store| store.tag())
    }

    /// Iterate over the stores in this group, mutably.
    pub(crate) fn stores_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn AnyStore>> {
        self.stores.iter_mut()
    }

    /// The number of component types stored in this group.
    #[inline]
    pub fn store_count(&self) -> usize {
        self.stores.len()
    }

    /// Check whether every store in this group is empty of live entities.
    pub fn is_empty(&self) -> bool {
        self.stores.iter().all(|store| store.is_empty())
    }
}
