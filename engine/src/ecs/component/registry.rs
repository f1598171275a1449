//! Thread-safe component type registration.
//!
//! Every component type that enters a store is assigned a dense numeric [`Id`] by the
//! [`Registry`]. The dense ID is what the rest of the engine keys on: group bitsets,
//! reverse indices, and observer tables all use it instead of `std::any::TypeId`.
//!
//! # Thread Safety
//!
//! The registry uses lock-free reads via `DashMap` and minimal locking for writes,
//! so IDs can be resolved from any thread without contention.

use std::{
    any::TypeId as StdTypeId,
    sync::{
        RwLock,
        atomic::{AtomicU32, Ordering},
    },
};

use dashmap::DashMap;

use crate::ecs::component::{Component, Id};

/// Metadata about a registered component type.
#[derive(Debug, Clone, Copy)]
pub struct Info {
    /// The dense component ID.
    id: Id,

    /// The Rust TypeId for runtime type checking.
    type_id: StdTypeId,

    /// The fully-qualified type name, for diagnostics.
    name: &'static str,
}

impl Info {
    /// Construct Info for type `T`.
    fn new<T: Component>(id: Id) -> Self {
        Self {
            id,
            type_id: StdTypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Get the dense component ID.
    #[inline]
    pub fn id(&self) -> Id {
        self.id
    }

    /// Get the Rust TypeId.
    #[inline]
    pub fn type_id(&self) -> StdTypeId {
        self.type_id
    }

    /// Get the type name.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// A thread-safe registry mapping component types to dense IDs.
///
/// Registration is idempotent: registering the same type twice returns the same ID.
pub struct Registry {
    /// Map from Rust TypeId to our Id. Lock-free reads via sharded concurrent hashmap.
    type_map: DashMap<StdTypeId, Id>,

    /// List of registered component entries. Protected by RwLock for rare writes.
    infos: RwLock<Vec<Option<Info>>>,

    /// Next available component identifier.
    next_id: AtomicU32,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create a new, empty component registry.
    #[inline]
    pub fn new() -> Self {
        Self {
            type_map: DashMap::new(),
            infos: RwLock::new(Vec::new()),
            next_id: AtomicU32::new(0),
        }
    }

    /// Register a component type, returning its dense ID.
    ///
    /// If the type is already registered, returns the existing ID.
    pub fn register<T: Component>(&self) -> Id {
        let std_type_id = StdTypeId::of::<T>();

        // Fast path: check if already registered (lock-free read)
        if let Some(existing_id) = self.type_map.get(&std_type_id) {
            return *existing_id;
        }

        // Slow path: need to register
        // Use entry API to handle race conditions
        match self.type_map.entry(std_type_id) {
            dashmap::Entry::Occupied(occupied) => {
                // Another thread registered it first
                *occupied.get()
            }
            dashmap::Entry::Vacant(vacant) => {
                // We get to register it
                let id_value = self.next_id.fetch_add(1, Ordering::Relaxed);
                let id = Id::new(id_value);

                // Add entry to the infos list
                let mut infos = self.infos.write().unwrap();
                let index = id_value as usize;

                // Expand if necessary
                if index >= infos.len() {
                    infos.resize(index + 1, None);
                }

                infos[index] = Some(Info::new::<T>(id));
                vacant.insert(id);

                id
            }
        }
    }

    /// Get the ID for a component type, if registered.
    #[inline]
    pub fn get<T: Component>(&self) -> Option<Id> {
        self.type_map
            .get(&StdTypeId::of::<T>())
            .map(|entry| *entry.value())
    }

    /// Get component info by ID.
    #[inline]
    pub fn info(&self, id: Id) -> Option<Info> {
        let infos = self.infos.read().unwrap();
        infos.get(id.index()).and_then(|opt| *opt)
    }

    /// Get the type name for an ID, if registered.
    #[inline]
    pub fn name_of(&self, id: Id) -> Option<&'static str> {
        self.info(id).map(|info| info.name())
    }

    /// Get the number of registered component types.
    #[inline]
    pub fn len(&self) -> usize {
        self.next_id.load(Ordering::Relaxed) as usize
    }

    /// Check if no component types are registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
