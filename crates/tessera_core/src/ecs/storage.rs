//! # Entity Storage
//!
//! Owns every live entity and its component values.
//!
//! - Ids come from a monotonic counter and are never recycled
//! - Records are kept in id order, which is also creation order
//! - Lookups are O(log n); unknown ids simply miss
//!
//! The store knows nothing about archetypes. The world keeps the
//! membership index in step with every structural change made here.

use std::any::Any;
use std::collections::BTreeMap;

use parking_lot::{MappedRwLockReadGuard, RwLockReadGuard};

use super::component::Component;
use super::entity::{EntityId, EntityRecord};
use super::kind::ComponentKind;

/// Entity id allocation and entity → components mapping.
#[derive(Debug, Default)]
pub struct EntityStore {
    records: BTreeMap<EntityId, EntityRecord>,
    next_id: u64,
}

impl EntityStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an entity from `(kind, value)` pairs, in order.
    ///
    /// When a kind repeats, the last value wins and keeps the position of
    /// the first occurrence.
    pub fn create<I>(&mut self, components: I) -> EntityId
    where
        I: IntoIterator<Item = (ComponentKind, Box<dyn Any + Send + Sync>)>,
    {
        let id = EntityId::new(self.next_id);
        self.next_id += 1;

        let mut record = EntityRecord::new(id);
        for (kind, value) in components {
            record.set(kind, value);
        }
        self.records.insert(id, record);
        id
    }

    /// Attaches a value to a live entity.
    ///
    /// Returns `None` for an unknown entity, `Some(true)` if the kind is new
    /// to the entity and `Some(false)` if an existing value was replaced.
    pub fn add_component(
        &mut self,
        id: EntityId,
        kind: ComponentKind,
        value: Box<dyn Any + Send + Sync>,
    ) -> Option<bool> {
        self.records.get_mut(&id).map(|record| record.set(kind, value))
    }

    /// Detaches a kind. Returns `true` if the entity is live and had it.
    pub fn remove_component(&mut self, id: EntityId, kind: ComponentKind) -> bool {
        self.records
            .get_mut(&id)
            .is_some_and(|record| record.remove(kind))
    }

    /// Checks if the entity is live and has `kind`.
    #[must_use]
    pub fn has_component(&self, id: EntityId, kind: ComponentKind) -> bool {
        self.records
            .get(&id)
            .is_some_and(|record| record.has_component(kind))
    }

    /// Checks if the entity is live.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.records.contains_key(&id)
    }

    /// Deletes an entity. Returns `false` if it was not live.
    pub fn remove(&mut self, id: EntityId) -> bool {
        self.records.remove(&id).is_some()
    }

    /// Returns a live entity's record.
    #[inline]
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&EntityRecord> {
        self.records.get(&id)
    }

    /// Borrows a component value.
    ///
    /// The returned guard holds the value's read lock.
    #[must_use]
    pub fn get_component<C: Component>(
        &self,
        id: EntityId,
        kind: ComponentKind,
    ) -> Option<MappedRwLockReadGuard<'_, C>> {
        let cell = self.records.get(&id)?.cell(kind)?;
        RwLockReadGuard::try_map(cell.read(), |value| (**value).downcast_ref::<C>()).ok()
    }

    /// Mutably borrows a component value. No lock is taken: `&mut self`
    /// already guarantees exclusive access.
    pub fn get_component_mut<C: Component>(
        &mut self,
        id: EntityId,
        kind: ComponentKind,
    ) -> Option<&mut C> {
        let value = self.records.get_mut(&id)?.cell_mut(kind)?;
        (**value).downcast_mut::<C>()
    }

    /// Number of live entities.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Checks if no entity is live.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Live ids in creation order.
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.records.keys().copied()
    }

    /// Live records in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &EntityRecord> + '_ {
        self.records.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{Position, Velocity};

    const POS: ComponentKind = ComponentKind::new(0);
    const VEL: ComponentKind = ComponentKind::new(1);

    fn boxed<C: Component>(value: C) -> Box<dyn Any + Send + Sync> {
        Box::new(value)
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut store = EntityStore::new();
        let a = store.create([(POS, boxed(Position::default()))]);
        let b = store.create(Vec::new());
        assert!(a < b);

        assert!(store.remove(a));
        assert!(!store.remove(a));
        assert!(!store.contains(a));

        let c = store.create(Vec::new());
        assert!(c > b);
        assert_eq!(store.ids().collect::<Vec<_>>(), vec![b, c]);
    }

    #[test]
    fn test_unknown_entity_is_noop() {
        let mut store = EntityStore::new();
        let ghost = EntityId::new(99);
        assert_eq!(store.add_component(ghost, POS, boxed(Position::default())), None);
        assert!(!store.remove_component(ghost, POS));
        assert!(!store.has_component(ghost, POS));
        assert!(store.get_component::<Position>(ghost, POS).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_create_duplicate_kind_last_wins() {
        let mut store = EntityStore::new();
        let id = store.create([
            (POS, boxed(Position::new(1.0, 1.0))),
            (VEL, boxed(Velocity::new(0.5, 0.5))),
            (POS, boxed(Position::new(5.0, 2.0))),
        ]);

        let record = store.get(id).unwrap();
        assert_eq!(record.len(), 2);
        assert_eq!(record.component_kinds().collect::<Vec<_>>(), vec![POS, VEL]);
        assert_eq!(
            *store.get_component::<Position>(id, POS).unwrap(),
            Position::new(5.0, 2.0)
        );
    }

    #[test]
    fn test_add_replace_remove() {
        let mut store = EntityStore::new();
        let id = store.create(Vec::new());

        assert_eq!(store.add_component(id, VEL, boxed(Velocity::new(1.0, 0.0))), Some(true));
        assert_eq!(store.add_component(id, VEL, boxed(Velocity::new(2.0, 0.0))), Some(false));
        assert!(store.has_component(id, VEL));

        store.get_component_mut::<Velocity>(id, VEL).unwrap().y = 3.0;
        assert_eq!(
            *store.get_component::<Velocity>(id, VEL).unwrap(),
            Velocity::new(2.0, 3.0)
        );
        assert!(store.get_component::<Position>(id, VEL).is_none());

        assert!(store.remove_component(id, VEL));
        assert!(!store.has_component(id, VEL));
        assert!(store.contains(id));
    }
}
