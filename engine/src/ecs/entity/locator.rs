//! Handle-to-entity resolution.
//!
//! The [`Locator`] is the table behind stable handles. It maps each live
//! [`Reference`] slot to the entity's current [`Egid`] and keeps a reverse map per
//! group so whole-group operations can find every handle they touch. The locator
//! itself allocates nothing at resolve time; it is updated only during commits,
//! when entities actually move.
//!
//! Staleness is checked here: a slot remembers the generation it was tracked at,
//! and resolution fails for handles minted at any other generation.

use std::collections::HashMap;

use crate::ecs::{
    entity::{self, Egid, Generation, Reference},
    storage::GroupId,
};

/// The occupant of a handle slot.
#[derive(Debug, Clone, Copy)]
struct Slot {
    /// Generation the slot was tracked at.
    generation: Generation,

    /// Where the entity currently lives.
    egid: Egid,
}

/// Maps stable handles to current entity addresses.
#[derive(Default, Debug)]
pub struct Locator {
    /// Slot table indexed by `Reference::index()`. `None` means the slot is
    /// released or was never tracked.
    slots: Vec<Option<Slot>>,

    /// Reverse map: which handle tracks each entity, per group. Whole-group
    /// removals and swaps walk this instead of scanning the slot table.
    by_group: HashMap<GroupId, HashMap<entity::Id, Reference>>,
}

impl Locator {
    /// Create an empty locator.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a handle to the entity's current address.
    ///
    /// Returns `None` if the handle is stale or was never tracked.
    pub fn resolve(&self, reference: Reference) -> Option<Egid> {
        self.slots
            .get(reference.index())
            .and_then(|slot| slot.as_ref())
            .filter(|slot| slot.generation == reference.generation())
            .map(|slot| slot.egid)
    }

    /// Get the handle currently tracking an entity, if any.
    pub fn reference_of(&self, egid: Egid) -> Option<Reference> {
        self.by_group
            .get(&egid.group())
            .and_then(|group| group.get(&egid.id()))
            .copied()
    }

    /// Start tracking an entity under a handle.
    ///
    /// Called when a staged add lands in its group. Tracking the same (group, id)
    /// twice with the same handle is harmless.
    pub(crate) fn track(&mut self, reference: Reference, egid: Egid) {
        let index = reference.index();
        if index >= self.slots.len() {
            self.slots.resize(index + 1, None);
        }
        self.slots[index] = Some(Slot {
            generation: reference.generation(),
            egid,
        });
        self.by_group
            .entry(egid.group())
            .or_default()
            .insert(egid.id(), reference);
    }

    /// Re-point an entity's handle at a new group.
    ///
    /// Returns `false` if no handle tracks the source address.
    pub(crate) fn relocate(&mut self, from: Egid, to: Egid) -> bool {
        let Some(reference) = self
            .by_group
            .get_mut(&from.group())
            .and_then(|group| group.remove(&from.id()))
        else {
            return false;
        };

        if let Some(Some(slot)) = self.slots.get_mut(reference.index()) {
            slot.egid = to;
        }
        self.by_group
            .entry(to.group())
            .or_default()
            .insert(to.id(), reference);
        true
    }

    /// Stop tracking an entity, returning the handle that tracked it.
    ///
    /// Returns `None` if the entity has no handle, which happens when a
    /// multi-component removal already released it for an earlier store.
    pub(crate) fn release(&mut self, egid: Egid) -> Option<Reference> {
        let reference = self
            .by_group
            .get_mut(&egid.group())
            .and_then(|group| group.remove(&egid.id()))?;

        if let Some(slot) = self.slots.get_mut(reference.index()) {
            *slot = None;
        }
        Some(reference)
    }

    /// Stop tracking every entity in a group, returning all released pairs.
    pub(crate) fn release_group(&mut self, group: GroupId) -> Vec<(entity::Id, Reference)> {
        let Some(tracked) = self.by_group.remove(&group) else {
            return Vec::new();
        };

        let released: Vec<(entity::Id, Reference)> = tracked.into_iter().collect();
        for (_, reference) in &released {
            if let Some(slot) = self.slots.get_mut(reference.index()) {
                *slot = None;
            }
        }
        released
    }

    /// Re-point every handle in a group at a destination group.
    ///
    /// Entities already tracked in the destination stay tracked; the source
    /// group's entries are merged in.
    pub(crate) fn relocate_group(&mut self, from: GroupId, to: GroupId) {
        let Some(tracked) = self.by_group.remove(&from) else {
            return;
        };

        let destination = self.by_group.entry(to).or_default();
        destination.reserve(tracked.len());
        for (id, reference) in tracked {
            destination.insert(id, reference);
            if let Some(Some(slot)) = self.slots.get_mut(reference.index()) {
                slot.egid = Egid::new(to, id);
            }
        }
    }

    /// The number of live tracked handles.
    pub fn len(&self) -> usize {
        self.by_group.values().map(|group| group.len()).sum()
    }

    /// Check whether no handles are tracked.
    pub fn is_empty(&self) -> bool {
        self.by_group.values().all(|group| group.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::entity::reference;

    fn egid(group: u32, id: u32) -> Egid {
        Egid::new(GroupId::new(group), entity::Id::new(id))
    }

    #[test]
    fn track_then_resolve() {
        // Given
        let handles = reference::Allocator::new();
        let mut locator = Locator::new();
        let reference = handles.alloc();

        // When
        locator.track(reference, egid(1, 7));

        // Then
        assert_eq!(locator.resolve(reference), Some(egid(1, 7)));
        assert_eq!(locator.reference_of(egid(1, 7)), Some(reference));
        assert_eq!(locator.len(), 1);
    }

    #[test]
    fn release_makes_handle_dead() {
        // Given
        let handles = reference::Allocator::new();
        let mut locator = Locator::new();
        let reference = handles.alloc();
        locator.track(reference, egid(1, 7));

        // When
        let released = locator.release(egid(1, 7));

        // Then
        assert_eq!(released, Some(reference));
        assert_eq!(locator.resolve(reference), None);
        assert!(locator.is_empty());

        // And - A second release for the same entity is a no-op
        assert_eq!(locator.release(egid(1, 7)), None);
    }

    #[test]
    fn stale_generation_does_not_resolve() {
        // Given
        let handles = reference::Allocator::new();
        let mut locator = Locator::new();
        let original = handles.alloc();
        locator.track(original, egid(1, 7));
        locator.release(egid(1, 7));
        handles.free(original);

        // When - The slot is recycled for a different entity
        let recycled = handles.alloc();
        locator.track(recycled, egid(2, 9));

        // Then - Only the new handle resolves
        assert_eq!(locator.resolve(original), None);
        assert_eq!(locator.resolve(recycled), Some(egid(2, 9)));
    }

    #[test]
    fn relocate_follows_a_swap() {
        // Given
        let handles = reference::Allocator::new();
        let mut locator = Locator::new();
        let reference = handles.alloc();
        locator.track(reference, egid(1, 7));

        // When
        assert!(locator.relocate(egid(1, 7), egid(3, 7)));

        // Then
        assert_eq!(locator.resolve(reference), Some(egid(3, 7)));
        assert_eq!(locator.reference_of(egid(1, 7)), None);
        assert_eq!(locator.reference_of(egid(3, 7)), Some(reference));
    }

    #[test]
    fn relocate_unknown_entity_reports_false() {
        // Given
        let mut locator = Locator::new();

        // When / Then
        assert!(!locator.relocate(egid(1, 7), egid(3, 7)));
    }

    #[test]
    fn release_group_returns_every_handle() {
        // Given
        let handles = reference::Allocator::new();
        let mut locator = Locator::new();
        let a = handles.alloc();
        let b = handles.alloc();
        let other = handles.alloc();
        locator.track(a, egid(1, 10));
        locator.track(b, egid(1, 11));
        locator.track(other, egid(2, 12));

        // When
        let mut released = locator.release_group(GroupId::new(1));

        // Then - Both group-1 handles released, group 2 untouched
        released.sort_by_key(|(id, _)| *id);
        assert_eq!(released.len(), 2);
        assert_eq!(released[0].0, entity::Id::new(10));
        assert_eq!(released[1].0, entity::Id::new(11));
        assert_eq!(locator.resolve(a), None);
        assert_eq!(locator.resolve(b), None);
        assert_eq!(locator.resolve(other), Some(egid(2, 12)));
    }

    #[test]
    fn relocate_group_merges_into_destination() {
        // Given
        let handles = reference::Allocator::new();
        let mut locator = Locator::new();
        let moving = handles.alloc();
        let resident = handles.alloc();
        locator.track(moving, egid(1, 10));
        locator.track(resident, egid(2, 20));

        // When
        locator.relocate_group(GroupId::new(1), GroupId::new(2));

        // Then
        assert_eq!(locator.resolve(moving), Some(egid(2, 10)));
        assert_eq!(locator.resolve(resident), Some(egid(2, 20)));
        assert_eq!(locator.len(), 2);
    }
}
