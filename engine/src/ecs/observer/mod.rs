//! Structural-change observers.
//!
//! Observers are callbacks fired during commit when entities are added, removed, or
//! swapped between groups. They come in two flavors per operation:
//!
//! - **Precise** observers fire once per entity and receive the component value.
//!   For removals and swaps they fire *before* the physical move, so the value is
//!   still addressable at its old position.
//! - **Fast** observers fire once per (group, type) batch and receive the store
//!   plus a contiguous index range covering the whole batch. For removals the
//!   range points into the tombstone window just past the live prefix.
//!
//! Group-level variants fire once per (group, type) when a whole group is removed
//! or swapped.
//!
//! Every callback receives a [`Commands`] context through which it may enqueue
//! further structural operations; those land in the buffers for a later drain,
//! never in the batch currently being delivered.

use std::{any::Any, collections::HashMap, ops::Range};

use crate::ecs::{
    component::{self, Component},
    entity::Egid,
    storage::{DenseStore, GroupId},
    world::Commands,
};

/// Per-entity add observer. Receives the entity's address and its new value.
pub(crate) type AddedFn<T> = Box<dyn FnMut(&mut Commands<'_>, Egid, &T) + Send + Sync>;

/// Per-batch add observer. The range covers the newly appended live suffix.
pub(crate) type AddedRangeFn<T> =
    Box<dyn FnMut(&mut Commands<'_>, GroupId, &DenseStore<T>, Range<usize>) + Send + Sync>;

/// Per-entity remove observer. Fires before removal; the value is still live.
pub(crate) type RemovedFn<T> = Box<dyn FnMut(&mut Commands<'_>, Egid, &T) + Send + Sync>;

/// Per-batch remove observer. The range covers the tombstone window.
pub(crate) type RemovedRangeFn<T> =
    Box<dyn FnMut(&mut Commands<'_>, GroupId, &DenseStore<T>, Range<usize>) + Send + Sync>;

/// Per-entity swap observer. Receives old and new addresses and the value,
/// before the physical move.
pub(crate) type SwappedFn<T> = Box<dyn FnMut(&mut Commands<'_>, Egid, Egid, &T) + Send + Sync>;

/// Per-batch swap observer. Receives source and destination groups, the
/// destination store, and the appended range within it.
pub(crate) type SwappedRangeFn<T> = Box<
    dyn FnMut(&mut Commands<'_>, GroupId, GroupId, &DenseStore<T>, Range<usize>) + Send + Sync,
>;

/// Whole-group remove observer. Fires once per (group, type) with the store
/// still populated.
pub(crate) type GroupRemovedFn<T> =
    Box<dyn FnMut(&mut Commands<'_>, GroupId, &DenseStore<T>) + Send + Sync>;

/// Whole-group swap observer. Fires once per (group, type) with the source
/// store still populated.
pub(crate) type GroupSwappedFn<T> =
    Box<dyn FnMut(&mut Commands<'_>, GroupId, GroupId, &DenseStore<T>) + Send + Sync>;

/// All observers registered for one component type.
pub(crate) struct Observers<T: Component> {
    pub(crate) added: Vec<AddedFn<T>>,
    pub(crate) added_range: Vec<AddedRangeFn<T>>,
    pub(crate) removed: Vec<RemovedFn<T>>,
    pub(crate) removed_range: Vec<RemovedRangeFn<T>>,
    pub(crate) swapped: Vec<SwappedFn<T>>,
    pub(crate) swapped_range: Vec<SwappedRangeFn<T>>,
    pub(crate) group_removed: Vec<GroupRemovedFn<T>>,
    pub(crate) group_swapped: Vec<GroupSwappedFn<T>>,
}

impl<T: Component> Default for Observers<T> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            added_range: Vec::new(),
            removed: Vec::new(),
            removed_range: Vec::new(),
            swapped: Vec::new(),
            swapped_range: Vec::new(),
            group_removed: Vec::new(),
            group_swapped: Vec::new(),
        }
    }
}

/// Observer registration, keyed by dense component tag.
///
/// The typed [`Observers`] lists live behind `dyn Any`; stores downcast them back
/// to their own component type during commit, mirroring how the stores themselves
/// are erased.
#[derive(Default)]
pub struct Registry {
    observers: HashMap<component::Id, Box<dyn Any + Send + Sync>>,
}

impl Registry {
    /// Create an empty observer registry.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the observer list for a component type, if any were registered.
    pub(crate) fn get_mut<T: Component>(
        &mut self,
        tag: component::Id,
    ) -> Option<&mut Observers<T>> {
        self.observers.get_mut(&tag)?.downcast_mut::<Observers<T>>()
    }

    /// Get or create the observer list for a component type.
    pub(crate) fn entry<T: Component>(&mut self, tag: component::Id) -> &mut Observers<T> {
        self.observers
            .entry(tag)
            .or_insert_with(|| Box::new(Observers::<T>::default()))
            .downcast_mut::<Observers<T>>()
            .expect("observer list type matches component tag")
    }

    /// The number of component types with at least one registered observer list.
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Check whether no observers are registered.
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}
