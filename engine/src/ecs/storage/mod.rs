//! Storage: groups, dense stores, and the group table.
//!
//! The storage layer is organized in three levels:
//!
//! - [`DenseStore`]: typed, dense component storage for one (group, type) pair
//! - [`Group`]: a named partition holding one type-erased store per component type
//! - [`Groups`]: the table of all groups plus a reverse index from component tag
//!   to the groups that store it
//!
//! Groups and stores are created lazily, the first time an entity of a given type
//! lands in a given group, and are destroyed only when their group is torn down.
//! Clearing a group keeps its stores around so their capacity is reused.

mod any;
mod dense;
mod group;

use std::collections::HashMap;

pub use any::AnyStore;
pub use dense::DenseStore;
pub use group::{Group, GroupId};

use crate::ecs::{
    component,
    error::{Error, Result},
};

/// The table of all groups, with a reverse index by component tag.
#[derive(Default)]
pub struct Groups {
    /// All groups, keyed by caller-assigned id.
    groups: HashMap<GroupId, Group>,

    /// Reverse index: which groups have a store for each component tag.
    by_tag: HashMap<component::Id, Vec<GroupId>>,
}

impl Groups {
    /// Create an empty group table.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a group by id.
    #[inline]
    pub fn get(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(&id)
    }

    /// Get a group by id, mutably.
    #[inline]
    pub(crate) fn get_mut(&mut self, id: GroupId) -> Option<&mut Group> {
        self.groups.get_mut(&id)
    }

    /// Check whether a group exists.
    #[inline]
    pub fn has(&self, id: GroupId) -> bool {
        self.groups.contains_key(&id)
    }

    /// Get the store for a (group, tag) pair.
    pub fn store(&self, group: GroupId, tag: component::Id) -> Option<&dyn AnyStore> {
        self.groups.get(&group)?.store(tag)
    }

    /// Get or create a group.
    pub(crate) fn ensure_group(&mut self, id: GroupId) -> &mut Group {
        self.groups.entry(id).or_insert_with(|| {
            log::debug!("creating group {id:?}");
            Group::new()
        })
    }

    /// Get or create the store for a (group, tag) pair, building a missing store
    /// with `make`.
    pub(crate) fn ensure_store_with(
        &mut self,
        group: GroupId,
        tag: component::Id,
        make: impl FnOnce() -> Box<dyn AnyStore>,
    ) -> &mut dyn AnyStore {
        let created = {
            let entry = self.ensure_group(group);
            if entry.has(tag) {
                false
            } else {
                entry.insert(make());
                true
            }
        };
        if created {
            let listed = self.by_tag.entry(tag).or_default();
            if !listed.contains(&group) {
                listed.push(group);
            }
            log::debug!("created store for {tag:?} in group {group:?}");
        }
        self.groups
            .get_mut(&group)
            .and_then(|entry| entry.store_mut(tag))
            .expect("store just ensured")
    }

    /// Check a store out of its group for the duration of a swap.
    pub(crate) fn take_store(
        &mut self,
        group: GroupId,
        tag: component::Id,
    ) -> Result<Box<dyn AnyStore>> {
        let entry = self
            .groups
            .get_mut(&group)
            .ok_or(Error::GroupNotFound(group))?;
        entry.take(tag).ok_or(Error::StoreNotFound {
            group,
            component: tag,
        })
    }

    /// Put a checked-out store back into its group.
    pub(crate) fn put_store(&mut self, group: GroupId, store: Box<dyn AnyStore>) {
        self.groups
            .get_mut(&group)
            .expect("group exists while its store is checked out")
            .insert(store);
    }

    /// The groups that have a store for a component tag.
    pub fn groups_holding(&self, tag: component::Id) -> &[GroupId] {
        self.by_tag.get(&tag).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The number of groups.
    #[inline]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Check whether no groups exist.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::Component;

    #[derive(Debug, PartialEq)]
    struct Health(#[allow(dead_code)] u32);
    impl Component for Health {}

    fn make_store(group: GroupId, tag: component::Id) -> Box<dyn AnyStore> {
        Box::new(DenseStore::<Health>::new(group, tag))
    }

    #[test]
    fn ensure_group_is_lazy_and_idempotent() {
        // Given
        let mut groups = Groups::new();
        assert!(!groups.has(GroupId::new(1)));

        // When
        groups.ensure_group(GroupId::new(1));
        groups.ensure_group(GroupId::new(1));

        // Then
        assert!(groups.has(GroupId::new(1)));
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn ensure_store_updates_reverse_index_once() {
        // Given
        let mut groups = Groups::new();
        let tag = component::Id::new(0);

        // When - Ensure the same store twice
        groups.ensure_store_with(GroupId::new(1), tag, || make_store(GroupId::new(1), tag));
        groups.ensure_store_with(GroupId::new(1), tag, || make_store(GroupId::new(1), tag));
        groups.ensure_store_with(GroupId::new(2), tag, || make_store(GroupId::new(2), tag));

        // Then
        assert_eq!(
            groups.groups_holding(tag),
            &[GroupId::new(1), GroupId::new(2)]
        );
        assert!(groups.store(GroupId::new(1), tag).is_some());
    }

    #[test]
    fn take_and_put_round_trip() {
        // Given
        let mut groups = Groups::new();
        let tag = component::Id::new(0);
        groups.ensure_store_with(GroupId::new(1), tag, || make_store(GroupId::new(1), tag));

        // When
        let store = groups.take_store(GroupId::new(1), tag).unwrap();

        // Then - Checked out
        assert!(groups.store(GroupId::new(1), tag).is_none());

        // When - Returned
        groups.put_store(GroupId::new(1), store);

        // Then
        assert!(groups.store(GroupId::new(1), tag).is_some());
    }

    #[test]
    fn take_store_reports_missing_group_and_store() {
        // Given
        let mut groups = Groups::new();
        let tag = component::Id::new(0);

        // When / Then - Missing group
        let missing_group = groups.take_store(GroupId::new(9), tag).err();
        assert_eq!(missing_group, Some(Error::GroupNotFound(GroupId::new(9))));

        // When / Then - Group exists, store doesn't
        groups.ensure_group(GroupId::new(9));
        let missing_store = groups.take_store(GroupId::new(9), tag).err();
        assert_eq!(
            missing_store,
            Some(Error::StoreNotFound {
                group: GroupId::new(9),
                component: tag,
            })
        );
    }
}
