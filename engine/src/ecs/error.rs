//! Error types for storage and submission operations.

use thiserror::Error;

use crate::ecs::{component, entity, storage::GroupId};

/// Convenience result alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by enqueue validation and commit processing.
///
/// Enqueue-time errors mean the request was rejected and nothing was queued.
/// Commit-time errors mean the submission aborted mid-flight; the engine makes
/// no attempt to roll back already-applied phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// The named group does not exist.
    #[error("group {0:?} does not exist")]
    GroupNotFound(GroupId),

    /// The group exists but holds no store for the component type.
    #[error("group {group:?} has no store for component {component:?}")]
    StoreNotFound {
        group: GroupId,
        component: component::Id,
    },

    /// The entity is not present in the store it was addressed in.
    #[error("entity {id:?} not found in group {group:?}")]
    EntityNotFound { group: GroupId, id: entity::Id },

    /// The entity id is already present (live or staged) where it was being added.
    #[error("entity {id:?} already present in group {group:?}")]
    DuplicateEntity { group: GroupId, id: entity::Id },

    /// A swap named the same group as both source and destination.
    #[error("cannot swap group {0:?} into itself")]
    SameGroupSwap(GroupId),

    /// The component type was never registered.
    #[error("component type {0} is not registered")]
    UnregisteredComponent(&'static str),
}
