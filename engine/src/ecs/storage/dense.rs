//! Dense typed component storage.
//!
//! A [`DenseStore`] holds every `T` component in one group as two parallel vectors
//! (entity ids and values) plus a hash index from id to position. Live entities
//! occupy the contiguous prefix `[0, len)`, so bulk consumers can walk plain slices
//! with no indirection.
//!
//! # Removal and the tombstone window
//!
//! Removal compacts by swapping the victim to the end of the live prefix and
//! shrinking `len` by one. The swapped-out value is *not* dropped immediately: it
//! stays physically present just past the live prefix until the slot is next
//! overwritten. During a commit this gives bulk removal observers a contiguous
//! window `[len, len + removed)` over the values that were just removed, without
//! any copying.

use std::{collections::HashMap, ops::Range};

use crate::ecs::{
    component::{self, Component},
    entity,
    error::{Error, Result},
    storage::GroupId,
};

/// Dense storage for all `T` components in a single group.
pub struct DenseStore<T: Component> {
    /// The group this store belongs to. Used for addressing and diagnostics.
    group: GroupId,

    /// The dense component tag for `T`.
    tag: component::Id,

    /// Entity ids, parallel to `values`. Only `[0, len)` is live.
    ids: Vec<entity::Id>,

    /// Component values, parallel to `ids`. Only `[0, len)` is live; slots past
    /// `len` may hold recently removed values (the tombstone window).
    values: Vec<T>,

    /// Map from entity id to its position in the live prefix.
    index: HashMap<entity::Id, usize>,

    /// Number of live entities. Always `<= ids.len() == values.len()`.
    len: usize,
}

impl<T: Component> DenseStore<T> {
    /// Create an empty store for a group.
    pub(crate) fn new(group: GroupId, tag: component::Id) -> Self {
        Self {
            group,
            tag,
            ids: Vec::new(),
            values: Vec::new(),
            index: HashMap::new(),
            len: 0,
        }
    }

    /// The group this store belongs to.
    #[inline]
    pub fn group(&self) -> GroupId {
        self.group
    }

    /// The dense component tag stored here.
    #[inline]
    pub fn tag(&self) -> component::Id {
        self.tag
    }

    /// The number of live entities.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check whether the store holds no live entities.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check whether an entity is live in this store.
    #[inline]
    pub fn contains(&self, id: entity::Id) -> bool {
        self.index.contains_key(&id)
    }

    /// Get the live position of an entity, if present.
    #[inline]
    pub fn index_of(&self, id: entity::Id) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// Get a component value by entity id.
    pub fn get(&self, id: entity::Id) -> Result<&T> {
        let &position = self.index.get(&id).ok_or(Error::EntityNotFound {
            group: self.group,
            id,
        })?;
        Ok(&self.values[position])
    }

    /// Get a mutable component value by entity id.
    pub fn get_mut(&mut self, id: entity::Id) -> Result<&mut T> {
        let &position = self.index.get(&id).ok_or(Error::EntityNotFound {
            group: self.group,
            id,
        })?;
        Ok(&mut self.values[position])
    }

    /// The live entity ids as a slice.
    #[inline]
    pub fn ids(&self) -> &[entity::Id] {
        &self.ids[..self.len]
    }

    /// The live component values as a slice.
    #[inline]
    pub fn values(&self) -> &[T] {
        &self.values[..self.len]
    }

    /// The live component values as a mutable slice.
    #[inline]
    pub fn values_mut(&mut self) -> &mut [T] {
        &mut self.values[..self.len]
    }

    /// Iterate over live (id, value) pairs in dense order.
    pub fn iter(&self) -> impl Iterator<Item = (entity::Id, &T)> {
        self.ids[..self.len]
            .iter()
            .copied()
            .zip(self.values[..self.len].iter())
    }

    /// Iterate over live (id, value) pairs with mutable values.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (entity::Id, &mut T)> {
        self.ids[..self.len]
            .iter()
            .copied()
            .zip(self.values[..self.len].iter_mut())
    }

    /// Values by physical index range.
    ///
    /// Unlike [`values`](Self::values) this may reach past the live prefix into
    /// the tombstone window, which is exactly what bulk removal observers need.
    #[inline]
    pub fn values_in(&self, range: Range<usize>) -> &[T] {
        &self.values[range]
    }

    /// Entity ids by physical index range. May reach into the tombstone window.
    #[inline]
    pub fn ids_in(&self, range: Range<usize>) -> &[entity::Id] {
        &self.ids[range]
    }

    /// The entity id at a physical index.
    #[inline]
    pub(crate) fn id_at(&self, index: usize) -> entity::Id {
        self.ids[index]
    }

    /// Reserve room for `additional` more entities.
    pub(crate) fn reserve(&mut self, additional: usize) {
        self.ids.reserve(additional);
        self.values.reserve(additional);
        self.index.reserve(additional);
    }

    /// Append an entity at the end of the live prefix.
    ///
    /// Overwrites a tombstone slot when one is available, otherwise grows the
    /// backing vectors.
    pub(crate) fn add(&mut self, id: entity::Id, value: T) -> Result<()> {
        if self.index.contains_key(&id) {
            return Err(Error::DuplicateEntity {
                group: self.group,
                id,
            });
        }

        if self.len < self.values.len() {
            // Reuse a tombstone slot; the stale value is dropped here.
            self.values[self.len] = value;
            self.ids[self.len] = id;
        } else {
            self.values.push(value);
            self.ids.push(id);
        }
        self.index.insert(id, self.len);
        self.len += 1;

        #[cfg(debug_assertions)]
        self.verify_invariants();

        Ok(())
    }

    /// Remove an entity using swap-remove compaction.
    ///
    /// The last live entity is swapped into the vacated position; its id is
    /// returned so callers that track positions can fix them up. Returns `None`
    /// if the victim was the last live entity, or if `id` is absent (no-op).
    ///
    /// The removed value stays physically present at index `len` (the new live
    /// count) until the slot is next overwritten.
    pub(crate) fn remove(&mut self, id: entity::Id) -> Option<entity::Id> {
        let position = self.index.remove(&id)?;
        let last = self.len - 1;

        self.ids.swap(position, last);
        self.values.swap(position, last);
        self.len = last;

        let displaced = if position == last {
            None
        } else {
            let displaced = self.ids[position];
            self.index.insert(displaced, position);
            Some(displaced)
        };

        #[cfg(debug_assertions)]
        self.verify_invariants();

        displaced
    }

    /// Move one entity's value into another store of the same type.
    ///
    /// Compacts this store exactly like [`remove`](Self::remove) and appends the
    /// value to `destination` under the same id.
    pub(crate) fn swap_into(&mut self, destination: &mut DenseStore<T>, id: entity::Id) -> Result<()> {
        let position = self.index.remove(&id).ok_or(Error::EntityNotFound {
            group: self.group,
            id,
        })?;
        let last = self.len - 1;

        self.ids.swap(position, last);
        self.values.swap(position, last);
        self.len = last;
        if position != last {
            let displaced = self.ids[position];
            self.index.insert(displaced, position);
        }

        // Physically extract the moved-out value. swap_remove only disturbs the
        // physical tail, never the live prefix.
        self.ids.swap_remove(last);
        let value = self.values.swap_remove(last);

        #[cfg(debug_assertions)]
        self.verify_invariants();

        destination.add(id, value)
    }

    /// Move every live entity into another store of the same type, in dense order.
    ///
    /// Leaves this store empty (tombstones included).
    pub(crate) fn drain_into(&mut self, destination: &mut DenseStore<T>) -> Result<()> {
        destination.reserve(self.len);

        let live = self.len;
        self.len = 0;
        self.index.clear();

        let ids = self.ids.drain(..);
        let values = self.values.drain(..);
        for (id, value) in ids.zip(values).take(live) {
            destination.add(id, value)?;
        }
        Ok(())
    }

    /// Drop every entity and tombstone, keeping allocated capacity.
    pub(crate) fn clear(&mut self) {
        self.index.clear();
        self.ids.clear();
        self.values.clear();
        self.len = 0;
    }

    /// Verify that parallel vectors and the id index agree.
    ///
    /// # Panics
    /// Panics if the live prefix and index are out of sync.
    #[cfg(debug_assertions)]
    pub(crate) fn verify_invariants(&self) {
        assert_eq!(
            self.ids.len(),
            self.values.len(),
            "id and value vectors must stay parallel"
        );
        assert!(
            self.len <= self.ids.len(),
            "live count {} exceeds physical length {}",
            self.len,
            self.ids.len()
        );
        assert_eq!(
            self.index.len(),
            self.len,
            "id index size doesn't match live count"
        );
        for (position, id) in self.ids[..self.len].iter().enumerate() {
            assert_eq!(
                self.index.get(id),
                Some(&position),
                "id index disagrees with dense position for {id:?}"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Health(u32);
    impl Component for Health {}

    fn store(group: u32) -> DenseStore<Health> {
        DenseStore::new(GroupId::new(group), component::Id::new(0))
    }

    fn id(value: u32) -> entity::Id {
        entity::Id::new(value)
    }

    #[test]
    fn add_then_get() {
        // Given
        let mut store = store(1);

        // When
        store.add(id(10), Health(5)).unwrap();
        store.add(id(11), Health(6)).unwrap();

        // Then
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(id(10)).unwrap(), &Health(5));
        assert_eq!(store.get(id(11)).unwrap(), &Health(6));
        assert_eq!(store.ids(), &[id(10), id(11)]);
    }

    #[test]
    fn add_duplicate_is_rejected() {
        // Given
        let mut store = store(1);
        store.add(id(10), Health(5)).unwrap();

        // When
        let result = store.add(id(10), Health(9));

        // Then
        assert_eq!(
            result,
            Err(Error::DuplicateEntity {
                group: GroupId::new(1),
                id: id(10),
            })
        );
        assert_eq!(store.get(id(10)).unwrap(), &Health(5));
    }

    #[test]
    fn remove_middle_compacts_and_reports_displaced() {
        // Given
        let mut store = store(1);
        for n in 0..4 {
            store.add(id(n), Health(n)).unwrap();
        }

        // When - Remove from the middle
        let displaced = store.remove(id(1));

        // Then - Last entity moved into the hole
        assert_eq!(displaced, Some(id(3)));
        assert_eq!(store.len(), 3);
        assert_eq!(store.index_of(id(3)), Some(1));
        assert_eq!(store.get(id(3)).unwrap(), &Health(3));
        assert!(!store.contains(id(1)));
    }

    #[test]
    fn remove_last_displaces_nothing() {
        // Given
        let mut store = store(1);
        store.add(id(10), Health(1)).unwrap();
        store.add(id(11), Health(2)).unwrap();

        // When
        let displaced = store.remove(id(11));

        // Then
        assert_eq!(displaced, None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn remove_absent_is_a_noop() {
        // Given
        let mut store = store(1);
        store.add(id(10), Health(1)).unwrap();

        // When
        let displaced = store.remove(id(99));

        // Then
        assert_eq!(displaced, None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn removed_values_stay_in_tombstone_window() {
        // Given - Five entities
        let mut store = store(1);
        for n in 0..5 {
            store.add(id(n), Health(n)).unwrap();
        }

        // When - Remove two
        store.remove(id(1));
        store.remove(id(2));

        // Then - The window [len, len + 2) still holds the removed values
        assert_eq!(store.len(), 3);
        let window = store.values_in(3..5);
        assert!(window.contains(&Health(1)));
        assert!(window.contains(&Health(2)));
        let ids = store.ids_in(3..5);
        assert!(ids.contains(&id(1)));
        assert!(ids.contains(&id(2)));
    }

    #[test]
    fn add_after_remove_overwrites_tombstone() {
        // Given
        let mut store = store(1);
        store.add(id(0), Health(0)).unwrap();
        store.add(id(1), Health(1)).unwrap();
        store.remove(id(1));

        // When - Physical length must not grow
        let physical_before = store.values.len();
        store.add(id(2), Health(2)).unwrap();

        // Then
        assert_eq!(store.values.len(), physical_before);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(id(2)).unwrap(), &Health(2));
    }

    #[test]
    fn swap_into_moves_value_and_keeps_id() {
        // Given
        let mut source = store(1);
        let mut destination = store(2);
        for n in 0..3 {
            source.add(id(n), Health(n)).unwrap();
        }

        // When
        source.swap_into(&mut destination, id(0)).unwrap();

        // Then
        assert_eq!(source.len(), 2);
        assert!(!source.contains(id(0)));
        assert_eq!(destination.len(), 1);
        assert_eq!(destination.get(id(0)).unwrap(), &Health(0));
    }

    #[test]
    fn swap_into_missing_entity_errors() {
        // Given
        let mut source = store(1);
        let mut destination = store(2);
        source.add(id(0), Health(0)).unwrap();

        // When
        let result = source.swap_into(&mut destination, id(9));

        // Then
        assert_eq!(
            result,
            Err(Error::EntityNotFound {
                group: GroupId::new(1),
                id: id(9),
            })
        );
    }

    #[test]
    fn drain_into_preserves_dense_order() {
        // Given
        let mut source = store(1);
        let mut destination = store(2);
        for n in 0..4 {
            source.add(id(n), Health(n)).unwrap();
        }
        source.remove(id(1)); // leave a tombstone behind

        // When
        source.drain_into(&mut destination).unwrap();

        // Then - Only live entities moved, in source dense order. After removing
        // id 1 from [0,1,2,3], id 3 was swapped into its place.
        assert!(source.is_empty());
        assert_eq!(source.values.len(), 0);
        assert_eq!(destination.len(), 3);
        assert_eq!(destination.ids(), &[id(0), id(3), id(2)]);
    }

    #[test]
    fn compaction_survives_arbitrary_removal_order() {
        // Given
        let mut store = store(1);
        for n in 0..16 {
            store.add(id(n), Health(n)).unwrap();
        }

        // When - Remove in a scattered order
        for n in [7, 0, 15, 3, 8, 11] {
            store.remove(id(n));
        }

        // Then - Every survivor is reachable and the prefix is dense
        assert_eq!(store.len(), 10);
        for n in 0..16 {
            let expect_live = ![7, 0, 15, 3, 8, 11].contains(&n);
            assert_eq!(store.contains(id(n)), expect_live, "id {n}");
            if expect_live {
                assert_eq!(store.get(id(n)).unwrap(), &Health(n));
            }
        }
    }
}
