//! The world: entity storage plus the deferred submission pipeline.
//!
//! A [`World`] owns the group table, the stable-handle locator, the observer
//! registry, and the queues of deferred structural work. Producers never mutate
//! structure directly: adds are staged, removals and swaps are queued, and
//! everything lands atomically when [`submit`](World::submit) runs.
//!
//! # Commit protocol
//!
//! `submit` drains the queued work in three phases, in a fixed order:
//!
//! 1. **Removals** - whole-group removals first, then per-entity removals.
//!    Handles are released before anything moves, precise observers fire while
//!    the values are still live, then stores compact, then fast observers fire
//!    over the tombstone windows.
//! 2. **Swaps** - whole-group swaps first, then per-entity swaps. Handles are
//!    re-pointed, precise observers fire before the move, values move, fast
//!    observers fire over the appended destination ranges.
//! 3. **Adds** - the staging buffers flip, the drained buffer appends batch by
//!    batch, handles start tracking, then fast and precise observers fire over
//!    the recorded ranges. The drained buffer is cleared only after the last
//!    callback.
//!
//! Observer callbacks receive a [`Commands`] context and may enqueue more work;
//! it lands in the freshly accepting queues and is processed by the next commit
//! (or, for removals/swaps staged from phase 1/2 add-enqueues, the current
//! commit's add phase).
//!
//! A submit with nothing queued mutates nothing and fires nothing.
//!
//! # Failure semantics
//!
//! Enqueue methods on [`World`] validate eagerly and reject bad requests without
//! queueing anything. Once a commit is underway, an inconsistency (a queued id
//! that no longer exists, a vanished group) aborts the commit with an error and
//! no rollback: the queues and stores may be left partially applied, and the
//! caller decides whether to halt.

mod pending;
mod staging;

use std::{collections::HashSet, ops::Range};

use crate::ecs::{
    component::{self, Component},
    entity::{self, Egid, Locator, Reference, reference},
    error::{Error, Result},
    observer,
    storage::{DenseStore, GroupId, Groups},
};

pub(crate) use pending::PendingOps;
pub(crate) use staging::{AddBuffer, Staging};

/// The deferred-operation surface handed to observer callbacks.
///
/// A `Commands` only touches the accepting queues and the lock-free allocators,
/// never the stores, so it can be used while a commit is mid-flight. Requests
/// made through it are *not* validated against live structure; a bad request
/// surfaces as an error from the commit that drains it.
pub struct Commands<'w> {
    staging: &'w mut Staging,
    pending: &'w mut PendingOps,
    handles: &'w reference::Allocator,
    entity_ids: &'w entity::Allocator,
    types: &'w component::Registry,
}

impl Commands<'_> {
    /// Reserve a fresh entity id.
    pub fn next_id(&self) -> entity::Id {
        self.entity_ids.alloc()
    }

    /// Stage a component value for an entity, minting (or reusing) its stable
    /// handle.
    ///
    /// Staging the same (group, type, id) twice in one cycle is rejected;
    /// staging further component types for the same entity reuses its handle.
    pub fn enqueue_add<T: Component>(
        &mut self,
        group: GroupId,
        id: entity::Id,
        value: T,
    ) -> Result<Reference> {
        let tag = self.types.register::<T>();
        let handles = self.handles;
        let buffer = self.staging.active_mut();
        buffer.stage(tag, group, id, value)?;
        let reference = *buffer
            .references
            .entry((group, id))
            .or_insert_with(|| handles.alloc());
        Ok(reference)
    }

    /// Queue removal of one component of an entity.
    pub fn enqueue_remove<T: Component>(&mut self, group: GroupId, id: entity::Id) -> Result<()> {
        let tag = self
            .types
            .get::<T>()
            .ok_or(Error::UnregisteredComponent(std::any::type_name::<T>()))?;
        self.pending.queue_removal(group, tag, id);
        Ok(())
    }

    /// Queue a move of one component of an entity to another group.
    pub fn enqueue_swap<T: Component>(
        &mut self,
        from: GroupId,
        to: GroupId,
        id: entity::Id,
    ) -> Result<()> {
        if from == to {
            return Err(Error::SameGroupSwap(from));
        }
        let tag = self
            .types
            .get::<T>()
            .ok_or(Error::UnregisteredComponent(std::any::type_name::<T>()))?;
        self.pending.queue_swap(from, to, tag, id);
        Ok(())
    }

    /// Queue removal of an entire group.
    pub fn enqueue_remove_group(&mut self, group: GroupId) {
        self.pending.queue_group_removal(group);
    }

    /// Queue a move of an entire group's contents into another group.
    pub fn enqueue_swap_group(&mut self, from: GroupId, to: GroupId) -> Result<()> {
        if from == to {
            return Err(Error::SameGroupSwap(from));
        }
        self.pending.queue_group_swap(from, to);
        Ok(())
    }
}

/// The entity world: groups of dense stores with deferred structural mutation.
#[derive(Default)]
pub struct World {
    /// Component type registration.
    types: component::Registry,

    /// The group table and its reverse index.
    groups: Groups,

    /// Stable-handle resolution.
    locator: Locator,

    /// Stable-handle slot allocator.
    handles: reference::Allocator,

    /// Entity id allocator.
    entity_ids: entity::Allocator,

    /// Structural-change observers.
    observers: observer::Registry,

    /// Queues accepting removal/swap requests.
    pending: PendingOps,

    /// The other half of the queue double-buffer; drained during submit.
    drained: PendingOps,

    /// Double-buffered add staging.
    staging: Staging,

    /// Scratch for the add phase's notification ranges, reused across commits.
    ranges: Vec<(GroupId, component::Id, Range<usize>)>,
}

impl World {
    /// Create an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Registration and lookup ====================

    /// Register a component type, returning its dense tag.
    ///
    /// Registration also happens implicitly on first use; this is for callers
    /// that want the tag up front.
    pub fn register<T: Component>(&self) -> component::Id {
        self.types.register::<T>()
    }

    /// The component registry.
    pub fn types(&self) -> &component::Registry {
        &self.types
    }

    /// The group table.
    pub fn groups(&self) -> &Groups {
        &self.groups
    }

    /// Reserve a fresh entity id.
    pub fn next_id(&self) -> entity::Id {
        self.entity_ids.alloc()
    }

    /// Resolve a stable handle to the entity's current address.
    pub fn resolve(&self, reference: Reference) -> Option<Egid> {
        self.locator.resolve(reference)
    }

    /// Get the handle currently tracking an entity, if any.
    pub fn reference_of(&self, egid: Egid) -> Option<Reference> {
        self.locator.reference_of(egid)
    }

    /// Forget a handle without touching the entity it tracks.
    ///
    /// The handle (and every copy of it) stops resolving; the entity stays in
    /// its store until removed normally.
    pub fn invalidate(&mut self, reference: Reference) {
        if let Some(egid) = self.locator.resolve(reference) {
            self.locator.release(egid);
            self.handles.free(reference);
        }
    }

    /// Get the typed store for a (group, component type) pair.
    pub fn store<T: Component>(&self, group: GroupId) -> Result<&DenseStore<T>> {
        let tag = self
            .types
            .get::<T>()
            .ok_or(Error::UnregisteredComponent(std::any::type_name::<T>()))?;
        let store = self.groups.store(group, tag).ok_or_else(|| {
            if self.groups.has(group) {
                Error::StoreNotFound {
                    group,
                    component: tag,
                }
            } else {
                Error::GroupNotFound(group)
            }
        })?;
        Ok(store
            .as_any()
            .downcast_ref::<DenseStore<T>>()
            .expect("store type matches component tag"))
    }

    /// Get the typed store for a (group, component type) pair, mutably.
    ///
    /// Value mutation through the store is immediate and allowed between
    /// commits; only *structural* mutation is deferred.
    pub fn store_mut<T: Component>(&mut self, group: GroupId) -> Result<&mut DenseStore<T>> {
        let tag = self
            .types
            .get::<T>()
            .ok_or(Error::UnregisteredComponent(std::any::type_name::<T>()))?;
        if !self.groups.has(group) {
            return Err(Error::GroupNotFound(group));
        }
        let store = self
            .groups
            .get_mut(group)
            .and_then(|entry| entry.store_mut(tag))
            .ok_or(Error::StoreNotFound {
                group,
                component: tag,
            })?;
        Ok(store
            .as_any_mut()
            .downcast_mut::<DenseStore<T>>()
            .expect("store type matches component tag"))
    }

    /// The groups that hold a store for a component type.
    pub fn groups_holding<T: Component>(&self) -> &[GroupId] {
        match self.types.get::<T>() {
            Some(tag) => self.groups.groups_holding(tag),
            None => &[],
        }
    }

    /// Borrow the deferred-operation surface directly.
    ///
    /// Useful for producers that want the unvalidated, allocation-only enqueue
    /// path that observers get.
    pub fn commands(&mut self) -> Commands<'_> {
        Commands {
            staging: &mut self.staging,
            pending: &mut self.pending,
            handles: &self.handles,
            entity_ids: &self.entity_ids,
            types: &self.types,
        }
    }

    // ==================== Deferred structural requests ====================

    /// Stage a component value for an entity, to land at the next commit.
    ///
    /// Returns the entity's stable handle. Rejects an id that is already live
    /// or already staged for this (group, type). Staging a further component
    /// type for an entity the locator already tracks returns its existing
    /// handle rather than minting a second one.
    pub fn enqueue_add<T: Component>(
        &mut self,
        group: GroupId,
        id: entity::Id,
        value: T,
    ) -> Result<Reference> {
        let tag = self.types.register::<T>();
        if let Some(store) = self.groups.store(group, tag)
            && store.contains(id)
        {
            return Err(Error::DuplicateEntity { group, id });
        }
        let existing = self.locator.reference_of(Egid::new(group, id));
        let handles = &self.handles;
        let buffer = self.staging.active_mut();
        buffer.stage(tag, group, id, value)?;
        let reference = *buffer
            .references
            .entry((group, id))
            .or_insert_with(|| existing.unwrap_or_else(|| handles.alloc()));
        Ok(reference)
    }

    /// Queue removal of one component of a live entity, validated eagerly.
    pub fn enqueue_remove<T: Component>(&mut self, group: GroupId, id: entity::Id) -> Result<()> {
        let tag = self
            .types
            .get::<T>()
            .ok_or(Error::UnregisteredComponent(std::any::type_name::<T>()))?;
        self.validate_live(group, tag, id)?;
        self.pending.queue_removal(group, tag, id);
        Ok(())
    }

    /// Queue removal of a live entity from every store in its group.
    pub fn enqueue_remove_entity(&mut self, group: GroupId, id: entity::Id) -> Result<()> {
        let tags = self.tags_holding(group, id)?;
        for tag in tags {
            self.pending.queue_removal(group, tag, id);
        }
        Ok(())
    }

    /// Queue a move of one component of a live entity to another group,
    /// validated eagerly.
    pub fn enqueue_swap<T: Component>(
        &mut self,
        from: GroupId,
        to: GroupId,
        id: entity::Id,
    ) -> Result<()> {
        if from == to {
            return Err(Error::SameGroupSwap(from));
        }
        let tag = self
            .types
            .get::<T>()
            .ok_or(Error::UnregisteredComponent(std::any::type_name::<T>()))?;
        self.validate_live(from, tag, id)?;
        self.pending.queue_swap(from, to, tag, id);
        Ok(())
    }

    /// Queue a move of a live entity, in every store that holds it, to another
    /// group.
    pub fn enqueue_swap_entity(
        &mut self,
        from: GroupId,
        to: GroupId,
        id: entity::Id,
    ) -> Result<()> {
        if from == to {
            return Err(Error::SameGroupSwap(from));
        }
        let tags = self.tags_holding(from, id)?;
        for tag in tags {
            self.pending.queue_swap(from, to, tag, id);
        }
        Ok(())
    }

    /// Queue removal of an entire group's contents.
    ///
    /// The group itself survives, empty, with its stores' capacity retained.
    pub fn enqueue_remove_group(&mut self, group: GroupId) -> Result<()> {
        if !self.groups.has(group) {
            return Err(Error::GroupNotFound(group));
        }
        self.pending.queue_group_removal(group);
        Ok(())
    }

    /// Queue a move of an entire group's contents into another group.
    pub fn enqueue_swap_group(&mut self, from: GroupId, to: GroupId) -> Result<()> {
        if from == to {
            return Err(Error::SameGroupSwap(from));
        }
        if !self.groups.has(from) {
            return Err(Error::GroupNotFound(from));
        }
        self.pending.queue_group_swap(from, to);
        Ok(())
    }

    /// Every component tag under which an entity is live in a group.
    fn tags_holding(&self, group: GroupId, id: entity::Id) -> Result<Vec<component::Id>> {
        let entry = self.groups.get(group).ok_or(Error::GroupNotFound(group))?;
        let tags: Vec<component::Id> = entry
            .tags()
            .filter(|tag| entry.store(*tag).is_some_and(|store| store.contains(id)))
            .collect();
        if tags.is_empty() {
            return Err(Error::EntityNotFound { group, id });
        }
        Ok(tags)
    }

    /// Check that an entity is live in a specific store.
    fn validate_live(&self, group: GroupId, tag: component::Id, id: entity::Id) -> Result<()> {
        let entry = self.groups.get(group).ok_or(Error::GroupNotFound(group))?;
        let store = entry.store(tag).ok_or(Error::StoreNotFound {
            group,
            component: tag,
        })?;
        if !store.contains(id) {
            return Err(Error::EntityNotFound { group, id });
        }
        Ok(())
    }

    // ==================== Observer registration ====================

    /// Observe each entity whose `T` lands in a store, with its value.
    pub fn on_added<T, F>(&mut self, callback: F)
    where
        T: Component,
        F: FnMut(&mut Commands<'_>, Egid, &T) + Send + Sync + 'static,
    {
        let tag = self.types.register::<T>();
        self.observers.entry::<T>(tag).added.push(Box::new(callback));
    }

    /// Observe each batch of `T` adds as a contiguous range in the store.
    pub fn on_added_range<T, F>(&mut self, callback: F)
    where
        T: Component,
        F: FnMut(&mut Commands<'_>, GroupId, &DenseStore<T>, Range<usize>) + Send + Sync + 'static,
    {
        let tag = self.types.register::<T>();
        self.observers
            .entry::<T>(tag)
            .added_range
            .push(Box::new(callback));
    }

    /// Observe each entity whose `T` is about to be removed, with its value.
    pub fn on_removed<T, F>(&mut self, callback: F)
    where
        T: Component,
        F: FnMut(&mut Commands<'_>, Egid, &T) + Send + Sync + 'static,
    {
        let tag = self.types.register::<T>();
        self.observers
            .entry::<T>(tag)
            .removed
            .push(Box::new(callback));
    }

    /// Observe each batch of `T` removals as the tombstone range left behind.
    pub fn on_removed_range<T, F>(&mut self, callback: F)
    where
        T: Component,
        F: FnMut(&mut Commands<'_>, GroupId, &DenseStore<T>, Range<usize>) + Send + Sync + 'static,
    {
        let tag = self.types.register::<T>();
        self.observers
            .entry::<T>(tag)
            .removed_range
            .push(Box::new(callback));
    }

    /// Observe each entity whose `T` is about to move between groups.
    pub fn on_swapped<T, F>(&mut self, callback: F)
    where
        T: Component,
        F: FnMut(&mut Commands<'_>, Egid, Egid, &T) + Send + Sync + 'static,
    {
        let tag = self.types.register::<T>();
        self.observers
            .entry::<T>(tag)
            .swapped
            .push(Box::new(callback));
    }

    /// Observe each batch of `T` swaps as the appended range in the destination.
    pub fn on_swapped_range<T, F>(&mut self, callback: F)
    where
        T: Component,
        F: FnMut(&mut Commands<'_>, GroupId, GroupId, &DenseStore<T>, Range<usize>)
            + Send
            + Sync
            + 'static,
    {
        let tag = self.types.register::<T>();
        self.observers
            .entry::<T>(tag)
            .swapped_range
            .push(Box::new(callback));
    }

    /// Observe whole-group removals of stores holding `T`, before they clear.
    pub fn on_group_removed<T, F>(&mut self, callback: F)
    where
        T: Component,
        F: FnMut(&mut Commands<'_>, GroupId, &DenseStore<T>) + Send + Sync + 'static,
    {
        let tag = self.types.register::<T>();
        self.observers
            .entry::<T>(tag)
            .group_removed
            .push(Box::new(callback));
    }

    /// Observe whole-group swaps of stores holding `T`, before they move.
    pub fn on_group_swapped<T, F>(&mut self, callback: F)
    where
        T: Component,
        F: FnMut(&mut Commands<'_>, GroupId, GroupId, &DenseStore<T>) + Send + Sync + 'static,
    {
        let tag = self.types.register::<T>();
        self.observers
            .entry::<T>(tag)
            .group_swapped
            .push(Box::new(callback));
    }

    // ==================== Submission ====================

    /// Drain every queued structural operation into the stores.
    ///
    /// Runs the three-phase commit described in the module docs. Returns an
    /// error (and stops) at the first inconsistency between the queues and the
    /// live structure.
    pub fn submit(&mut self) -> Result<()> {
        let World {
            types,
            groups,
            locator,
            handles,
            entity_ids,
            observers,
            pending,
            drained,
            staging,
            ranges,
        } = self;

        // Swap the accepting queues with last cycle's (cleared) drain set, so
        // observers can keep enqueueing while we process.
        std::mem::swap(pending, drained);

        let has_structural = drained.any_queued();
        let has_adds = !staging.active().is_empty();
        if !has_structural && !has_adds {
            return Ok(());
        }
        log::trace!("submit: structural={has_structural} adds={has_adds}");

        if has_structural {
            let mut commands = Commands {
                staging: &mut *staging,
                pending: &mut *pending,
                handles,
                entity_ids,
                types,
            };

            // -------- Phase 1: removals (whole groups first) --------
            for group_id in drained.group_removals.drain(..) {
                // Per-entity records for this group are covered by the clear;
                // left in place they would dangle once it runs.
                if drained.removals.remove(&group_id).is_some() {
                    log::debug!("group {group_id:?} teardown supersedes its per-entity removals");
                }
                for (id, reference) in locator.release_group(group_id) {
                    handles.free(reference);
                    entity_ids.free(id);
                }
                let entry = groups
                    .get_mut(group_id)
                    .ok_or(Error::GroupNotFound(group_id))?;
                for store in entry.stores_mut() {
                    store.commit_group_removal(observers, &mut commands);
                }
                log::trace!("cleared group {group_id:?}");
            }

            for (&group_id, per_tag) in drained.removals.iter() {
                let entry = groups
                    .get_mut(group_id)
                    .ok_or(Error::GroupNotFound(group_id))?;
                for (&tag, ids) in per_tag.iter() {
                    if ids.is_empty() {
                        continue;
                    }
                    // Release handles before anything moves. A multi-component
                    // entity releases on its first store; later stores find
                    // nothing, which is expected.
                    for &id in ids {
                        if let Some(reference) = locator.release(Egid::new(group_id, id)) {
                            handles.free(reference);
                        }
                    }
                    let store = entry.store_mut(tag).ok_or(Error::StoreNotFound {
                        group: group_id,
                        component: tag,
                    })?;
                    let window = store.commit_removals(ids, observers, &mut commands)?;
                    log::trace!(
                        "removed {} entities of {tag:?} from {group_id:?} (window {window:?})",
                        ids.len()
                    );
                }

                // Recycle dense ids only once the entity is gone from every
                // store in the group; a partial removal leaves the id claimed
                // by the surviving component types.
                let removed: HashSet<entity::Id> = per_tag
                    .values()
                    .flat_map(|ids| ids.iter().copied())
                    .collect();
                for &id in removed.iter() {
                    let still_live = entry
                        .tags()
                        .any(|tag| entry.store(tag).is_some_and(|store| store.contains(id)));
                    if !still_live {
                        entity_ids.free(id);
                    }
                }
            }

            // -------- Phase 2: swaps (whole groups first) --------
            for (from, to) in drained.group_swaps.drain(..) {
                if from == to {
                    return Err(Error::SameGroupSwap(from));
                }
                locator.relocate_group(from, to);
                let tags: Vec<component::Id> = groups
                    .get(from)
                    .ok_or(Error::GroupNotFound(from))?
                    .tags()
                    .collect();
                for tag in tags {
                    let mut source = groups.take_store(from, tag)?;
                    let destination =
                        groups.ensure_store_with(to, tag, || source.new_same_kind(to));
                    let moved = source.commit_group_swap(destination, observers, &mut commands);
                    groups.put_store(from, source);
                    moved?;
                }
                log::trace!("moved group {from:?} into {to:?}");
            }

            for (&from, per_tag) in drained.swaps.iter() {
                for (&tag, per_dest) in per_tag.iter() {
                    for (&to, ids) in per_dest.iter() {
                        if ids.is_empty() {
                            continue;
                        }
                        if from == to {
                            return Err(Error::SameGroupSwap(from));
                        }
                        // Handles first, mirroring removal order.
                        for &id in ids {
                            if !locator.relocate(Egid::new(from, id), Egid::new(to, id)) {
                                log::warn!(
                                    "no handle tracks entity {id:?} in group {from:?} during swap"
                                );
                            }
                        }
                        let mut source = groups.take_store(from, tag)?;
                        let destination =
                            groups.ensure_store_with(to, tag, || source.new_same_kind(to));
                        let moved = source.commit_swaps(destination, ids, observers, &mut commands);
                        groups.put_store(from, source);
                        let range = moved?;
                        log::trace!(
                            "swapped {} entities of {tag:?} {from:?} -> {to:?} (range {range:?})",
                            ids.len()
                        );
                    }
                }
            }
        }

        // -------- Phase 3: adds --------
        // Flip so observer enqueues land in the fresh buffer; drain the old one.
        staging.flip();
        let mut buffer = staging.take_inactive();
        if !buffer.is_empty() {
            ranges.clear();

            // Append pass: land every batch and memorize its range.
            let AddBuffer {
                batches,
                references,
            } = &mut buffer;
            for (&group_id, per_tag) in batches.iter_mut() {
                for (&tag, batch) in per_tag.iter_mut() {
                    if batch.is_empty() {
                        continue;
                    }
                    let store = groups.ensure_store_with(group_id, tag, || batch.new_store(group_id));
                    let range = batch.commit_into(&mut *store)?;
                    for index in range.clone() {
                        let id = store.id_at(index);
                        if let Some(&reference) = references.get(&(group_id, id)) {
                            let egid = Egid::new(group_id, id);
                            // An entity the locator already tracks keeps its
                            // original handle; a duplicate minted through the
                            // raw command surface is retired unused.
                            match locator.reference_of(egid) {
                                None => locator.track(reference, egid),
                                Some(existing) if existing != reference => {
                                    log::warn!(
                                        "entity {id:?} in group {group_id:?} already has a handle, dropping the staged one"
                                    );
                                    handles.free(reference);
                                }
                                Some(_) => {}
                            }
                        }
                    }
                    log::trace!(
                        "added {} entities of {tag:?} to {group_id:?} (range {range:?})",
                        range.len()
                    );
                    ranges.push((group_id, tag, range));
                }
            }

            // Notification passes over the recorded ranges: fast, then precise.
            let mut commands = Commands {
                staging: &mut *staging,
                pending: &mut *pending,
                handles,
                entity_ids,
                types,
            };
            for (group_id, tag, range) in ranges.iter() {
                let store = groups.store(*group_id, *tag).ok_or(Error::StoreNotFound {
                    group: *group_id,
                    component: *tag,
                })?;
                store.notify_added(range.clone(), observers, &mut commands);
            }
            for (group_id, tag, range) in ranges.iter() {
                let store = groups.store(*group_id, *tag).ok_or(Error::StoreNotFound {
                    group: *group_id,
                    component: *tag,
                })?;
                store.notify_added_precise(range.clone(), observers, &mut commands);
            }
        }

        // Clear only after every callback has run, retaining capacity.
        buffer.clear();
        staging.restore_inactive(buffer);
        drained.clear();
        Ok(())
    }
}
