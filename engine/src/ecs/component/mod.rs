//! Component management for the ECS.
//!
//! This module provides the infrastructure for registering and identifying component
//! types. Components are the data payloads attached to entities; every component type
//! that flows through a store is first registered here and assigned a dense [`Id`].
//!
//! ## Architecture
//!
//! - [`Component`]: The trait that all component types must implement
//! - [`Id`]: A unique dense identifier for each registered component type
//! - [`Registry`]: Thread-safe registration and lookup of component types
//! - [`Info`]: Metadata about a registered component type
//!
//! ## Thread Safety
//!
//! The [`Registry`] is designed for high-performance concurrent access:
//! - Lock-free reads for component ID lookups using `DashMap`
//! - Minimal locking for registration (only when a new type is first registered)
//! - Component registration is idempotent and thread-safe
//!
//! ## Usage
//!
//! ```ignore
//! use hive_engine::ecs::component::{Component, Registry};
//!
//! #[derive(Component)]
//! struct Position { x: f32, y: f32 }
//!
//! let registry = Registry::new();
//! let pos_id = registry.register::<Position>();
//! ```

mod registry;

pub use registry::{Info, Registry};

/// A component identifier. This is a dense unique identifier for a component type in the ECS.
///
/// Ids are assigned sequentially by the [`Registry`] so they double as indices into
/// per-type bitsets and tables.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(u32);

impl Id {
    /// Construct a new component Id from a raw u32 value.
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the index of this component if it were to live in indexable storage (e.g. Vec)
    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for Id {
    #[inline]
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<usize> for Id {
    #[inline]
    fn from(value: usize) -> Self {
        Self::new(value as u32)
    }
}

/// A trait representing a component in the ECS (Entity Component System).
///
/// At present this only sets the required trait bounds for a type to be used as a component.
pub trait Component: 'static + Sized + Send + Sync {}
