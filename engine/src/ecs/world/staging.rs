//! Double-buffered staging area for entity adds.
//!
//! Adds are deferred like removals and swaps, but their payloads (the component
//! values) have to live somewhere until commit. That somewhere is the
//! [`Staging`] area: two [`AddBuffer`]s that swap roles each commit.
//!
//! # Double-Buffer Model
//!
//! Producers stage into the **active** buffer. At the start of the add phase the
//! buffers flip: the previously active buffer is drained into the stores, while
//! observer callbacks that enqueue new adds write into the fresh active buffer and
//! are picked up by the *next* commit. The drained buffer is cleared only after
//! all add callbacks have fired, so precise observers can still be handed borrows
//! into it, and its allocations are retained for reuse.
//!
//! Within one buffer, staged values are batched per (group, component type); each
//! batch drains into its store as one contiguous append.

use std::{any::Any, collections::HashMap, ops::Range};

use crate::ecs::{
    component::{self, Component},
    entity::{self, Reference},
    error::{Error, Result},
    storage::{AnyStore, DenseStore, GroupId},
};

/// A staged batch of `T` values bound for one group.
struct StagedBatch<T: Component> {
    /// The dense component tag for `T`.
    tag: component::Id,

    /// Staged (id, value) pairs in enqueue order.
    items: Vec<(entity::Id, T)>,
}

impl<T: Component> StagedBatch<T> {
    fn new(tag: component::Id) -> Self {
        Self {
            tag,
            items: Vec::new(),
        }
    }
}

/// The type-erased surface of a [`StagedBatch`], mirroring how stores are erased.
pub(crate) trait AnyStaged: Send + Sync {
    /// The dense component tag staged here.
    fn tag(&self) -> component::Id;

    /// The number of staged entities.
    fn len(&self) -> usize;

    /// Check whether nothing is staged.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check whether an id is already staged in this batch.
    fn contains(&self, id: entity::Id) -> bool;

    /// Drop all staged values, retaining capacity.
    fn clear(&mut self);

    /// Create an empty store of the staged component type for a group.
    fn new_store(&self, group: GroupId) -> Box<dyn AnyStore>;

    /// Drain every staged value into a store, returning the appended range.
    fn commit_into(&mut self, store: &mut dyn AnyStore) -> Result<Range<usize>>;

    /// Downcast support, mutable.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> AnyStaged for StagedBatch<T> {
    fn tag(&self) -> component::Id {
        self.tag
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn contains(&self, id: entity::Id) -> bool {
        self.items.iter().any(|(staged, _)| *staged == id)
    }

    fn clear(&mut self) {
        self.items.clear();
    }

    fn new_store(&self, group: GroupId) -> Box<dyn AnyStore> {
        Box::new(DenseStore::<T>::new(group, self.tag))
    }

    fn commit_into(&mut self, store: &mut dyn AnyStore) -> Result<Range<usize>> {
        let store = store
            .as_any_mut()
            .downcast_mut::<DenseStore<T>>()
            .expect("staged batch type matches store");
        store.reserve(self.items.len());

        let start = store.len();
        let count = self.items.len();
        for (id, value) in self.items.drain(..) {
            store.add(id, value)?;
        }
        Ok(start..start + count)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// One buffer of staged adds: batches per (group, component type) plus the
/// handle minted for each staged entity.
#[derive(Default)]
pub(crate) struct AddBuffer {
    /// Staged batches: group, then component tag.
    pub(crate) batches: HashMap<GroupId, HashMap<component::Id, Box<dyn AnyStaged>>>,

    /// The stable handle minted for each staged (group, id). One entry per
    /// entity regardless of how many component types it stages.
    pub(crate) references: HashMap<(GroupId, entity::Id), Reference>,
}

impl AddBuffer {
    /// Stage one component value for an entity.
    ///
    /// Rejects an id already staged for the same (group, type): that is a
    /// duplicate add the commit would only discover later.
    pub(crate) fn stage<T: Component>(
        &mut self,
        tag: component::Id,
        group: GroupId,
        id: entity::Id,
        value: T,
    ) -> Result<()> {
        let batch = self
            .batches
            .entry(group)
            .or_default()
            .entry(tag)
            .or_insert_with(|| Box::new(StagedBatch::<T>::new(tag)));
        let batch = batch
            .as_any_mut()
            .downcast_mut::<StagedBatch<T>>()
            .expect("staged batch type matches component tag");

        if batch.contains(id) {
            return Err(Error::DuplicateEntity { group, id });
        }
        batch.items.push((id, value));
        Ok(())
    }

    /// Check whether an id is staged for a group under any component type.
    pub(crate) fn is_staged(&self, group: GroupId, id: entity::Id) -> bool {
        self.references.contains_key(&(group, id))
    }

    /// Check whether nothing is staged.
    pub(crate) fn is_empty(&self) -> bool {
        self.references.is_empty()
            && self
                .batches
                .values()
                .all(|per_tag| per_tag.values().all(|batch| batch.is_empty()))
    }

    /// Drop all staged values and handles, retaining batch allocations.
    pub(crate) fn clear(&mut self) {
        for per_tag in self.batches.values_mut() {
            for batch in per_tag.values_mut() {
                batch.clear();
            }
        }
        self.references.clear();
    }
}

/// The double-buffered staging area.
pub(crate) struct Staging {
    /// Index of the currently active (accepting) buffer: 0 or 1
    active_index: usize,

    /// The two buffers - one accepting, one draining or idle
    buffers: [AddBuffer; 2],
}

impl Default for Staging {
    fn default() -> Self {
        Self {
            active_index: 0,
            buffers: [AddBuffer::default(), AddBuffer::default()],
        }
    }
}

impl Staging {
    /// The buffer currently accepting staged adds.
    #[inline]
    pub(crate) fn active(&self) -> &AddBuffer {
        &self.buffers[self.active_index]
    }

    /// The buffer currently accepting staged adds, mutably.
    #[inline]
    pub(crate) fn active_mut(&mut self) -> &mut AddBuffer {
        &mut self.buffers[self.active_index]
    }

    /// Flip the buffers: the active buffer becomes the drain target and the
    /// other (cleared last cycle) starts accepting.
    pub(crate) fn flip(&mut self) {
        self.active_index = 1 - self.active_index;
    }

    /// Take the inactive buffer out for draining. Put it back with
    /// [`restore_inactive`](Self::restore_inactive) after clearing so its
    /// allocations survive into the next cycle.
    pub(crate) fn take_inactive(&mut self) -> AddBuffer {
        std::mem::take(&mut self.buffers[1 - self.active_index])
    }

    /// Return a drained buffer taken with [`take_inactive`](Self::take_inactive).
    pub(crate) fn restore_inactive(&mut self, buffer: AddBuffer) {
        self.buffers[1 - self.active_index] = buffer;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::entity::reference;

    #[derive(Debug, PartialEq)]
    struct Health(u32);
    impl Component for Health {}

    fn tag() -> component::Id {
        component::Id::new(0)
    }

    fn id(value: u32) -> entity::Id {
        entity::Id::new(value)
    }

    #[test]
    fn stage_batches_per_group_and_tag() {
        // Given
        let mut buffer = AddBuffer::default();

        // When
        buffer.stage(tag(), GroupId::new(1), id(5), Health(1)).unwrap();
        buffer.stage(tag(), GroupId::new(1), id(6), Health(2)).unwrap();
        buffer.stage(tag(), GroupId::new(2), id(7), Health(3)).unwrap();

        // Then
        assert_eq!(buffer.batches[&GroupId::new(1)][&tag()].len(), 2);
        assert_eq!(buffer.batches[&GroupId::new(2)][&tag()].len(), 1);
    }

    #[test]
    fn staging_same_id_twice_is_rejected() {
        // Given
        let mut buffer = AddBuffer::default();
        buffer.stage(tag(), GroupId::new(1), id(5), Health(1)).unwrap();

        // When
        let result = buffer.stage(tag(), GroupId::new(1), id(5), Health(2));

        // Then
        assert_eq!(
            result,
            Err(Error::DuplicateEntity {
                group: GroupId::new(1),
                id: id(5),
            })
        );
    }

    #[test]
    fn commit_into_appends_and_drains() {
        // Given
        let mut buffer = AddBuffer::default();
        buffer.stage(tag(), GroupId::new(1), id(5), Health(1)).unwrap();
        buffer.stage(tag(), GroupId::new(1), id(6), Health(2)).unwrap();
        let mut store = DenseStore::<Health>::new(GroupId::new(1), tag());
        store.add(id(4), Health(0)).unwrap();

        // When
        let batch = buffer
            .batches
            .get_mut(&GroupId::new(1))
            .unwrap()
            .get_mut(&tag())
            .unwrap();
        let range = batch.commit_into(&mut store).unwrap();

        // Then - Appended after the existing entity, batch left empty
        assert_eq!(range, 1..3);
        assert_eq!(store.len(), 3);
        assert_eq!(store.get(id(6)).unwrap(), &Health(2));
        assert!(batch.is_empty());
    }

    #[test]
    fn flip_swaps_roles_and_keeps_buffers() {
        // Given
        let handles = reference::Allocator::new();
        let mut staging = Staging::default();
        staging
            .active_mut()
            .stage(tag(), GroupId::new(1), id(5), Health(1))
            .unwrap();
        staging
            .active_mut()
            .references
            .insert((GroupId::new(1), id(5)), handles.alloc());

        // When
        staging.flip();

        // Then - New active buffer is empty, old one is the drain target
        assert!(staging.active().is_empty());
        let drained = staging.take_inactive();
        assert!(!drained.is_empty());
        assert!(drained.is_staged(GroupId::new(1), id(5)));

        // And - Restoring after clear keeps the structure around
        let mut drained = drained;
        drained.clear();
        staging.restore_inactive(drained);
        assert!(staging.active().is_empty());
    }
}
