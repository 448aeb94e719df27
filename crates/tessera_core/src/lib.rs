//! # TESSERA Core Engine
//!
//! Archetype-indexed Entity Component System with concurrent dispatch:
//! - Per-world component type registry
//! - ALL / ANY / NONE archetype filters
//! - Membership index kept consistent on every structural mutation
//! - One tick = every system over its matched entities on a bounded pool
//!
//! ## Architecture Rules
//!
//! 1. **The index is never stale** - every mutation updates it before returning
//! 2. **Typed dispatch** - query shapes are checked once, at registration
//! 3. **Bounded fan-out** - worker count never exceeds hardware concurrency by default
//!
//! ## Example
//!
//! ```rust,ignore
//! use tessera_core::{World, Position, Velocity};
//!
//! let mut world = World::new();
//! world.add_system(Movement)?;
//! world.spawn((Position::new(5.0, 2.0), Velocity::new(0.5, 0.5)));
//! world.tick()?;
//! ```

pub mod config;
pub mod ecs;
pub mod error;
pub mod schedule;

pub use config::{FaultPolicy, SchedulerConfig, WorldConfig};
pub use ecs::{
    Archetype, ArchetypeBuilder, BoxedComponent, Bundle, Component, ComponentKind, EntityId,
    KindSet, Position, Query, QueryItem, System, SystemId, TypeRegistry, Velocity, World,
};
pub use error::{EcsError, EcsResult, ShapeViolation, SystemError};
pub use schedule::{TickFault, TickReport, TickStats};
