//! # ECS World
//!
//! The central container: type registry, entities, systems, membership
//! index and scheduler. Every structural mutation updates the index before
//! returning, so the index is never stale when a tick starts.
//!
//! `tick` takes `&mut self`, which makes structural mutation during a tick
//! impossible.

use std::any::TypeId;
use std::sync::Arc;

use parking_lot::MappedRwLockReadGuard;

use super::archetype::{Archetype, ArchetypeBuilder};
use super::component::{Bundle, Component};
use super::entity::EntityId;
use super::index::MembershipIndex;
use super::query::{self, Query};
use super::storage::EntityStore;
use super::system::{Dispatch, System, SystemId, SystemRegistry};
use super::types::TypeRegistry;
use crate::config::WorldConfig;
use crate::error::{EcsError, EcsResult};
use crate::schedule::{Scheduler, TickReport, TickStats};

/// The ECS World.
///
/// # Example
///
/// ```rust,ignore
/// let mut world = World::new();
/// let movers = world.archetype().all::<Position>().all::<Velocity>().build();
/// world.register_system(Movement, movers)?;
///
/// world.spawn((Position::new(5.0, 2.0), Velocity::new(0.5, 0.5)));
/// let report = world.tick()?;
/// ```
pub struct World {
    types: Arc<TypeRegistry>,
    entities: EntityStore,
    systems: SystemRegistry,
    index: MembershipIndex,
    scheduler: Scheduler,
}

impl World {
    /// Creates a world with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::from_parts(Scheduler::default())
    }

    /// Creates a world with `config`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if the configuration is invalid.
    pub fn with_config(config: WorldConfig) -> EcsResult<Self> {
        Ok(Self::from_parts(Scheduler::new(config.scheduler)?))
    }

    fn from_parts(scheduler: Scheduler) -> Self {
        let types = Arc::new(TypeRegistry::new());
        tracing::info!(
            registry = types.id(),
            workers = scheduler.workers(),
            fault_policy = ?scheduler.fault_policy(),
            "world created"
        );
        Self {
            types,
            entities: EntityStore::new(),
            systems: SystemRegistry::new(),
            index: MembershipIndex::new(),
            scheduler,
        }
    }

    /// The world's component type registry.
    #[inline]
    #[must_use]
    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    /// Starts building an archetype against this world's registry.
    pub fn archetype(&self) -> ArchetypeBuilder<'_> {
        Archetype::builder(&self.types)
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Creates an entity and adds it to every matching index entry.
    pub fn spawn<B: Bundle>(&mut self, bundle: B) -> EntityId {
        let types = &self.types;
        let components = bundle.into_components().into_iter().map(|component| {
            let kind = types.kind_of_type(component.type_id(), component.type_name());
            (kind, component.into_value())
        });
        let id = self.entities.create(components);

        if let Some(record) = self.entities.get(id) {
            self.index.insert_entity(id, record.kinds());
        }
        tracing::trace!(entity = %id, "spawned");
        id
    }

    /// Attaches a component. A value of the same type already on the
    /// entity is replaced and membership does not change.
    ///
    /// Returns `false` for an unknown entity.
    pub fn add_component<C: Component>(&mut self, entity: EntityId, component: C) -> bool {
        let kind = self.types.kind_of::<C>();
        match self.entities.add_component(entity, kind, Box::new(component)) {
            None => false,
            Some(added) => {
                if added {
                    self.refresh(entity);
                }
                true
            }
        }
    }

    /// Detaches a component. Returns `true` if the entity had it.
    pub fn remove_component<C: Component>(&mut self, entity: EntityId) -> bool {
        let Some(kind) = self.types.lookup::<C>() else {
            return false;
        };
        if !self.entities.remove_component(entity, kind) {
            return false;
        }
        self.refresh(entity);
        true
    }

    fn refresh(&mut self, entity: EntityId) {
        if let Some(record) = self.entities.get(entity) {
            self.index.refresh_entity(entity, record.kinds());
        }
    }

    /// Checks if a live entity has a component of type `C`.
    #[must_use]
    pub fn has_component<C: Component>(&self, entity: EntityId) -> bool {
        self.types
            .lookup::<C>()
            .is_some_and(|kind| self.entities.has_component(entity, kind))
    }

    /// Checks if the entity is live.
    #[inline]
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.entities.contains(entity)
    }

    /// Destroys an entity. Returns `false` if it was unknown or already
    /// destroyed. The id is never handed out again.
    pub fn despawn(&mut self, entity: EntityId) -> bool {
        if !self.entities.remove(entity) {
            return false;
        }
        self.index.remove_entity(entity);
        tracing::trace!(%entity, "despawned");
        true
    }

    /// Borrows a component. The guard holds the value's read lock.
    #[must_use]
    pub fn get<C: Component>(&self, entity: EntityId) -> Option<MappedRwLockReadGuard<'_, C>> {
        let kind = self.types.lookup::<C>()?;
        self.entities.get_component::<C>(entity, kind)
    }

    /// Mutably borrows a component.
    pub fn get_mut<C: Component>(&mut self, entity: EntityId) -> Option<&mut C> {
        let kind = self.types.lookup::<C>()?;
        self.entities.get_component_mut::<C>(entity, kind)
    }

    /// Number of live entities.
    #[inline]
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Live entity ids in creation order.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.ids()
    }

    // =========================================================================
    // Systems
    // =========================================================================

    /// Registers `system` with `archetype`.
    ///
    /// The first registration of a system type allocates its id and scans
    /// every live entity. Registering the same type again keeps the id and
    /// replaces the instance and archetype.
    ///
    /// # Errors
    ///
    /// - [`EcsError::ForeignArchetype`] if `archetype` came from another world
    /// - [`EcsError::QueryShape`] if the archetype cannot serve the system's query
    pub fn register_system<S: System>(&mut self, system: S, archetype: Archetype) -> EcsResult<SystemId> {
        if archetype.registry_id() != self.types.id() {
            return Err(EcsError::ForeignArchetype {
                expected: self.types.id(),
                found: archetype.registry_id(),
            });
        }

        let mut slots = Vec::new();
        <S::Query as Query>::slots(&self.types, &mut slots);
        query::validate(&slots, &archetype).map_err(|reason| EcsError::QueryShape {
            system: system.name(),
            reason,
        })?;

        let runner = Box::new(Dispatch::new(system, slots));
        Ok(self.systems.register(
            TypeId::of::<S>(),
            runner,
            archetype,
            &mut self.index,
            &self.entities,
        ))
    }

    /// Registers `system` with the archetype its query implies.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::QueryShape`] if the query names a kind twice.
    pub fn add_system<S: System>(&mut self, system: S) -> EcsResult<SystemId> {
        let archetype = Archetype::for_query::<S::Query>(&self.types);
        self.register_system(system, archetype)
    }

    /// Checks if a system type is registered.
    #[must_use]
    pub fn has_system<S: System>(&self) -> bool {
        self.systems.contains::<S>()
    }

    /// Id of a registered system type.
    #[must_use]
    pub fn system_id<S: System>(&self) -> Option<SystemId> {
        self.systems.id_of::<S>()
    }

    /// Borrows the registered instance of `S`.
    #[must_use]
    pub fn system<S: System>(&self) -> Option<&S> {
        self.systems.get::<S>()
    }

    /// Mutably borrows the registered instance of `S`.
    pub fn system_mut<S: System>(&mut self) -> Option<&mut S> {
        self.systems.get_mut::<S>()
    }

    /// Number of registered systems.
    #[inline]
    #[must_use]
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Entities matching `archetype`, in dispatch order, or `None` if no
    /// registered system uses it.
    #[must_use]
    pub fn members(&self, archetype: &Archetype) -> Option<Vec<EntityId>> {
        self.index.members_of(archetype)
    }

    /// Members of the archetype a system was registered with.
    #[must_use]
    pub fn system_members<S: System>(&self) -> Option<Vec<EntityId>> {
        let id = self.systems.id_of::<S>()?;
        self.members(self.systems.archetype(id)?)
    }

    // =========================================================================
    // Ticking
    // =========================================================================

    /// Runs every system once over its matched entities.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::SystemFault`] under the fail-fast policy.
    pub fn tick(&mut self) -> EcsResult<TickReport> {
        let Self {
            entities,
            systems,
            index,
            scheduler,
            ..
        } = self;
        scheduler.run(systems, index, entities)
    }

    /// Rolling tick statistics.
    #[inline]
    #[must_use]
    pub fn stats(&self) -> &TickStats {
        self.scheduler.stats()
    }

    /// The scheduler.
    #[inline]
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("types", &self.types)
            .field("entities", &self.entities.len())
            .field("systems", &self.systems)
            .field("index", &self.index)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{Position, QueryItem, Velocity};
    use crate::error::SystemError;

    struct Tag;

    struct Movement;

    impl System for Movement {
        type Query = (&'static mut Position, &'static Velocity);

        fn run(&mut self, _: EntityId, item: QueryItem<'_, Self::Query>) -> Result<(), SystemError> {
            let (pos, vel) = item;
            pos.x += vel.x;
            pos.y += vel.y;
            Ok(())
        }
    }

    #[test]
    fn test_spawn_and_query() {
        let mut world = World::with_config(WorldConfig::sequential()).unwrap();
        let e = world.spawn((Position::new(5.0, 2.0), Velocity::new(0.5, 0.5)));

        assert!(world.contains(e));
        assert!(world.has_component::<Position>(e));
        assert!(!world.has_component::<Tag>(e));
        assert_eq!(world.entity_count(), 1);

        world.get_mut::<Velocity>(e).unwrap().x = 1.0;
        assert_eq!(*world.get::<Velocity>(e).unwrap(), Velocity::new(1.0, 0.5));
    }

    #[test]
    fn test_add_system_and_tick() {
        let mut world = World::with_config(WorldConfig::sequential()).unwrap();
        let e = world.spawn((Position::new(5.0, 2.0), Velocity::new(0.5, 0.5)));
        let _still = world.spawn((Position::new(0.0, 0.0),));

        world.add_system(Movement).unwrap();
        assert!(world.has_system::<Movement>());
        assert_eq!(world.system_members::<Movement>(), Some(vec![e]));

        let report = world.tick().unwrap();
        assert_eq!(report.invocations, 1);
        assert_eq!(*world.get::<Position>(e).unwrap(), Position::new(5.5, 2.5));
    }

    #[test]
    fn test_membership_follows_structural_changes() {
        let mut world = World::new();
        let movers = world.archetype().all::<Position>().all::<Velocity>().none::<Tag>().build();
        world.register_system(Movement, movers.clone()).unwrap();

        let e = world.spawn((Position::default(),));
        assert_eq!(world.members(&movers), Some(vec![]));

        assert!(world.add_component(e, Velocity::default()));
        assert_eq!(world.members(&movers), Some(vec![e]));

        assert!(world.add_component(e, Tag));
        assert_eq!(world.members(&movers), Some(vec![]));

        assert!(world.remove_component::<Tag>(e));
        assert!(!world.remove_component::<Tag>(e));
        assert_eq!(world.members(&movers), Some(vec![e]));

        assert!(world.despawn(e));
        assert!(!world.despawn(e));
        assert!(!world.add_component(e, Tag));
        assert_eq!(world.members(&movers), Some(vec![]));
    }

    #[test]
    fn test_foreign_archetype_rejected() {
        let mut world = World::new();
        let other = World::new();
        let foreign = other.archetype().all::<Position>().all::<Velocity>().build();
        assert!(matches!(
            world.register_system(Movement, foreign),
            Err(EcsError::ForeignArchetype { .. })
        ));
        assert!(!world.has_system::<Movement>());
    }
}
