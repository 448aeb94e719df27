//! # Entity Component System
//!
//! Indexing and dispatch core of the ECS.
//!
//! ## Design Philosophy
//!
//! - Component kinds are interned per world, never recycled
//! - Archetypes are plain values; equal filters share one index entry
//! - The membership index is updated eagerly on every structural change
//! - Systems see typed component borrows, validated at registration

pub mod archetype;
mod component;
mod entity;
mod index;
mod kind;
pub mod query;
mod storage;
mod system;
mod types;
mod world;

pub use archetype::{Archetype, ArchetypeBuilder};
pub use component::{BoxedComponent, Bundle, Component, Position, Velocity};
pub use entity::{EntityId, EntityRecord};
pub use index::MembershipIndex;
pub use kind::{ComponentKind, KindIter, KindSet};
pub use query::{Access, Query, QueryItem, Slot};
pub use storage::EntityStore;
pub use system::{System, SystemId, SystemRegistry};
pub(crate) use system::SystemSlot;
pub use types::TypeRegistry;
pub use world::World;
