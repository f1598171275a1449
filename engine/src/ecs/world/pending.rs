//! Queued removal and swap requests.
//!
//! Removals and swaps are deferred: producers enqueue them here and the world
//! drains them during [`submit`](crate::ecs::world::World::submit). The queues are
//! double-buffered at the world level (the accepting set and the draining set are
//! swapped at the start of each commit), so observer callbacks can enqueue more
//! work mid-commit without disturbing the batch being processed.

use std::collections::HashMap;

use crate::ecs::{component, entity, storage::GroupId};

/// All structural removal/swap requests accepted since the last drain.
#[derive(Default)]
pub(crate) struct PendingOps {
    /// Per-entity removals: group, then component tag, then the queued ids.
    pub(crate) removals: HashMap<GroupId, HashMap<component::Id, Vec<entity::Id>>>,

    /// Per-entity swaps: source group, then component tag, then destination
    /// group, then the queued ids.
    pub(crate) swaps: HashMap<GroupId, HashMap<component::Id, HashMap<GroupId, Vec<entity::Id>>>>,

    /// Whole-group removals, in request order.
    pub(crate) group_removals: Vec<GroupId>,

    /// Whole-group swaps, in request order.
    pub(crate) group_swaps: Vec<(GroupId, GroupId)>,
}

impl PendingOps {
    /// Queue a per-entity removal. Returns `false` if the same removal was
    /// already queued.
    pub(crate) fn queue_removal(
        &mut self,
        group: GroupId,
        tag: component::Id,
        id: entity::Id,
    ) -> bool {
        let queued = self
            .removals
            .entry(group)
            .or_default()
            .entry(tag)
            .or_default();
        if queued.contains(&id) {
            return false;
        }
        queued.push(id);
        true
    }

    /// Queue a per-entity swap. Returns `false` if the same swap was already
    /// queued.
    pub(crate) fn queue_swap(
        &mut self,
        from: GroupId,
        to: GroupId,
        tag: component::Id,
        id: entity::Id,
    ) -> bool {
        let queued = self
            .swaps
            .entry(from)
            .or_default()
            .entry(tag)
            .or_default()
            .entry(to)
            .or_default();
        if queued.contains(&id) {
            return false;
        }
        queued.push(id);
        true
    }

    /// Queue a whole-group removal. Returns `false` if already queued.
    pub(crate) fn queue_group_removal(&mut self, group: GroupId) -> bool {
        if self.group_removals.contains(&group) {
            return false;
        }
        self.group_removals.push(group);
        true
    }

    /// Queue a whole-group swap. Returns `false` if already queued.
    pub(crate) fn queue_group_swap(&mut self, from: GroupId, to: GroupId) -> bool {
        if self.group_swaps.contains(&(from, to)) {
            return false;
        }
        self.group_swaps.push((from, to));
        true
    }

    /// Check whether anything is queued.
    pub(crate) fn any_queued(&self) -> bool {
        !self.group_removals.is_empty()
            || !self.group_swaps.is_empty()
            || self
                .removals
                .values()
                .any(|per_tag| per_tag.values().any(|ids| !ids.is_empty()))
            || self.swaps.values().any(|per_tag| {
                per_tag
                    .values()
                    .any(|per_dest| per_dest.values().any(|ids| !ids.is_empty()))
            })
    }

    /// Clear all queues, retaining allocated capacity for the next cycle.
    pub(crate) fn clear(&mut self) {
        for per_tag in self.removals.values_mut() {
            for ids in per_tag.values_mut() {
                ids.clear();
            }
        }
        for per_tag in self.swaps.values_mut() {
            for per_dest in per_tag.values_mut() {
                for ids in per_dest.values_mut() {
                    ids.clear();
                }
            }
        }
        self.group_removals.clear();
        self.group_swaps.clear();
    }
}
