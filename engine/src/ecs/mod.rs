pub mod component;
pub mod entity;
pub mod error;
pub mod observer;
pub mod storage;
pub mod world;

pub use component::Component;
pub use entity::{Egid, Reference};
pub use error::{Error, Result};
pub use storage::{DenseStore, GroupId};
pub use world::{Commands, World};
