//! Type-erased store operations.
//!
//! Groups hold their stores as `Box<dyn AnyStore>`, so every structural operation
//! the submission pipeline performs must be expressible without naming `T`. The
//! [`AnyStore`] trait is that surface: each method re-enters typed code by
//! downcasting the observer list (and, for swaps, the destination store) back to
//! the concrete component type.

use std::{any::Any, ops::Range};

use crate::ecs::{
    component::{self, Component},
    entity::{self, Egid},
    error::{Error, Result},
    observer,
    storage::{DenseStore, GroupId},
    world::Commands,
};

/// The type-erased capability surface of a [`DenseStore`].
pub trait AnyStore: Send + Sync {
    /// The dense component tag stored here.
    fn tag(&self) -> component::Id;

    /// The component type name, for diagnostics.
    fn component_name(&self) -> &'static str;

    /// The group this store belongs to.
    fn group(&self) -> GroupId;

    /// The number of live entities.
    fn len(&self) -> usize;

    /// Check whether the store holds no live entities.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check whether an entity is live in this store.
    fn contains(&self, id: entity::Id) -> bool;

    /// The entity id at a physical index.
    fn id_at(&self, index: usize) -> entity::Id;

    /// Reserve room for `additional` more entities.
    fn reserve(&mut self, additional: usize);

    /// Create an empty store of the same component type for another group.
    fn new_same_kind(&self, group: GroupId) -> Box<dyn AnyStore>;

    /// Remove a batch of entities, firing precise observers before the physical
    /// removal and fast observers after, over the returned tombstone range.
    fn commit_removals(
        &mut self,
        ids: &[entity::Id],
        observers: &mut observer::Registry,
        commands: &mut Commands<'_>,
    ) -> Result<Range<usize>>;

    /// Move a batch of entities into `destination`, firing precise observers
    /// before the move and fast observers after, over the appended range in the
    /// destination.
    fn commit_swaps(
        &mut self,
        destination: &mut dyn AnyStore,
        ids: &[entity::Id],
        observers: &mut observer::Registry,
        commands: &mut Commands<'_>,
    ) -> Result<Range<usize>>;

    /// Clear the whole store, firing group-level remove observers first.
    fn commit_group_removal(
        &mut self,
        observers: &mut observer::Registry,
        commands: &mut Commands<'_>,
    );

    /// Move every entity into `destination`, firing group-level swap observers
    /// before the move.
    fn commit_group_swap(
        &mut self,
        destination: &mut dyn AnyStore,
        observers: &mut observer::Registry,
        commands: &mut Commands<'_>,
    ) -> Result<()>;

    /// Fire fast add observers over a freshly appended range.
    fn notify_added(
        &self,
        range: Range<usize>,
        observers: &mut observer::Registry,
        commands: &mut Commands<'_>,
    );

    /// Fire precise add observers for every entity in a freshly appended range.
    fn notify_added_precise(
        &self,
        range: Range<usize>,
        observers: &mut observer::Registry,
        commands: &mut Commands<'_>,
    );

    /// Downcast support.
    fn as_any(&self) -> &dyn Any;

    /// Downcast support, mutable.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> AnyStore for DenseStore<T> {
    fn tag(&self) -> component::Id {
        DenseStore::tag(self)
    }

    fn component_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn group(&self) -> GroupId {
        DenseStore::group(self)
    }

    fn len(&self) -> usize {
        DenseStore::len(self)
    }

    fn contains(&self, id: entity::Id) -> bool {
        DenseStore::contains(self, id)
    }

    fn id_at(&self, index: usize) -> entity::Id {
        DenseStore::id_at(self, index)
    }

    fn reserve(&mut self, additional: usize) {
        DenseStore::reserve(self, additional);
    }

    fn new_same_kind(&self, group: GroupId) -> Box<dyn AnyStore> {
        Box::new(DenseStore::<T>::new(group, DenseStore::tag(self)))
    }

    fn commit_removals(
        &mut self,
        ids: &[entity::Id],
        observers: &mut observer::Registry,
        commands: &mut Commands<'_>,
    ) -> Result<Range<usize>> {
        let group = DenseStore::group(self);
        let tag = DenseStore::tag(self);

        // A queued id that is no longer live means the queues and stores have
        // diverged; that is unrecoverable.
        for &id in ids {
            if !DenseStore::contains(self, id) {
                return Err(Error::EntityNotFound { group, id });
            }
        }

        // Precise pass, before anything moves: values are still addressable.
        if let Some(observers) = observers.get_mut::<T>(tag) {
            for &id in ids {
                let value = self.get(id)?;
                for callback in observers.removed.iter_mut() {
                    callback(commands, Egid::new(group, id), value);
                }
            }
        }

        // Physical pass: swap-remove each victim, leaving their values parked
        // in the tombstone window.
        for &id in ids {
            self.remove(id);
        }
        let live = DenseStore::len(self);
        let range = live..live + ids.len();

        // Fast pass over the tombstone window.
        if let Some(observers) = observers.get_mut::<T>(tag) {
            for callback in observers.removed_range.iter_mut() {
                callback(commands, group, self, range.clone());
            }
        }

        Ok(range)
    }

    fn commit_swaps(
        &mut self,
        destination: &mut dyn AnyStore,
        ids: &[entity::Id],
        observers: &mut observer::Registry,
        commands: &mut Commands<'_>,
    ) -> Result<Range<usize>> {
        let destination = destination
            .as_any_mut()
            .downcast_mut::<DenseStore<T>>()
            .expect("destination store type matches source");
        let from = DenseStore::group(self);
        let to = DenseStore::group(destination);
        let tag = DenseStore::tag(self);

        for &id in ids {
            if !DenseStore::contains(self, id) {
                return Err(Error::EntityNotFound { group: from, id });
            }
        }

        destination.reserve(ids.len());

        // Precise pass, before the move: the value still lives in the source.
        if let Some(observers) = observers.get_mut::<T>(tag) {
            for &id in ids {
                let value = self.get(id)?;
                for callback in observers.swapped.iter_mut() {
                    callback(commands, Egid::new(from, id), Egid::new(to, id), value);
                }
            }
        }

        // Physical pass: compact the source, append to the destination.
        let start = DenseStore::len(destination);
        for &id in ids {
            self.swap_into(destination, id)?;
        }
        let range = start..start + ids.len();

        // Fast pass over the appended suffix of the destination.
        if let Some(observers) = observers.get_mut::<T>(tag) {
            for callback in observers.swapped_range.iter_mut() {
                callback(commands, from, to, destination, range.clone());
            }
        }

        Ok(range)
    }

    fn commit_group_removal(
        &mut self,
        observers: &mut observer::Registry,
        commands: &mut Commands<'_>,
    ) {
        let group = DenseStore::group(self);
        let tag = DenseStore::tag(self);

        // Observers see the store fully populated, then everything goes at once.
        if let Some(observers) = observers.get_mut::<T>(tag) {
            for callback in observers.group_removed.iter_mut() {
                callback(commands, group, self);
            }
        }
        self.clear();
    }

    fn commit_group_swap(
        &mut self,
        destination: &mut dyn AnyStore,
        observers: &mut observer::Registry,
        commands: &mut Commands<'_>,
    ) -> Result<()> {
        let destination = destination
            .as_any_mut()
            .downcast_mut::<DenseStore<T>>()
            .expect("destination store type matches source");
        let from = DenseStore::group(self);
        let to = DenseStore::group(destination);
        let tag = DenseStore::tag(self);

        // Observers see the source fully populated, then everything moves at once.
        if let Some(observers) = observers.get_mut::<T>(tag) {
            for callback in observers.group_swapped.iter_mut() {
                callback(commands, from, to, self);
            }
        }
        self.drain_into(destination)
    }

    fn notify_added(
        &self,
        range: Range<usize>,
        observers: &mut observer::Registry,
        commands: &mut Commands<'_>,
    ) {
        let group = DenseStore::group(self);
        if let Some(observers) = observers.get_mut::<T>(DenseStore::tag(self)) {
            for callback in observers.added_range.iter_mut() {
                callback(commands, group, self, range.clone());
            }
        }
    }

    fn notify_added_precise(
        &self,
        range: Range<usize>,
        observers: &mut observer::Registry,
        commands: &mut Commands<'_>,
    ) {
        let group = DenseStore::group(self);
        if let Some(observers) = observers.get_mut::<T>(DenseStore::tag(self)) {
            for index in range {
                let id = DenseStore::id_at(self, index);
                let value = &self.values()[index];
                for callback in observers.added.iter_mut() {
                    callback(commands, Egid::new(group, id), value);
                }
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
