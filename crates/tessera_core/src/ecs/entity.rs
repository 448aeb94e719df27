//! # Entity Management
//!
//! Entities are opaque identifiers that own an ordered list of component
//! values, at most one per kind.
//!
//! Ids are handed out monotonically and never reused, so a stale id can
//! only ever miss; it can never alias a newer entity.

use std::any::Any;
use std::fmt;

use parking_lot::RwLock;

use super::kind::{ComponentKind, KindSet};

/// Unique identifier for an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Creates an entity id from its raw value.
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// One component value on an entity.
pub(crate) struct ComponentCell {
    pub(crate) kind: ComponentKind,
    pub(crate) value: RwLock<Box<dyn Any + Send + Sync>>,
}

/// A live entity: its id, its kind set and its component values.
///
/// The kind set mirrors the cells and is what archetypes are evaluated
/// against.
pub struct EntityRecord {
    id: EntityId,
    kinds: KindSet,
    cells: Vec<ComponentCell>,
}

impl EntityRecord {
    /// Creates an entity with no components.
    #[must_use]
    pub(crate) fn new(id: EntityId) -> Self {
        Self {
            id,
            kinds: KindSet::new(),
            cells: Vec::new(),
        }
    }

    /// The entity's id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Kinds currently attached.
    #[inline]
    #[must_use]
    pub fn kinds(&self) -> &KindSet {
        &self.kinds
    }

    /// Checks if this entity has a specific component kind.
    #[inline]
    #[must_use]
    pub fn has_component(&self, kind: ComponentKind) -> bool {
        self.kinds.contains(kind)
    }

    /// Attached kinds in insertion order.
    pub fn component_kinds(&self) -> impl Iterator<Item = ComponentKind> + '_ {
        self.cells.iter().map(|cell| cell.kind)
    }

    /// Number of attached components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Checks if no component is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Attaches a value. An existing value of the same kind is replaced in
    /// place and keeps its position.
    ///
    /// Returns `true` if the kind was not attached before.
    pub(crate) fn set(&mut self, kind: ComponentKind, value: Box<dyn Any + Send + Sync>) -> bool {
        if let Some(cell) = self.cells.iter_mut().find(|cell| cell.kind == kind) {
            *cell.value.get_mut() = value;
            return false;
        }
        self.kinds.insert(kind);
        self.cells.push(ComponentCell {
            kind,
            value: RwLock::new(value),
        });
        true
    }

    /// Detaches a kind. Returns `true` if it was attached.
    pub(crate) fn remove(&mut self, kind: ComponentKind) -> bool {
        if !self.kinds.remove(kind) {
            return false;
        }
        self.cells.retain(|cell| cell.kind != kind);
        true
    }

    pub(crate) fn cell(&self, kind: ComponentKind) -> Option<&RwLock<Box<dyn Any + Send + Sync>>> {
        self.cells
            .iter()
            .find(|cell| cell.kind == kind)
            .map(|cell| &cell.value)
    }

    pub(crate) fn cell_mut(&mut self, kind: ComponentKind) -> Option<&mut Box<dyn Any + Send + Sync>> {
        self.cells
            .iter_mut()
            .find(|cell| cell.kind == kind)
            .map(|cell| cell.value.get_mut())
    }
}

impl fmt::Debug for EntityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRecord")
            .field("id", &self.id)
            .field("kinds", &self.kinds)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(v: u32) -> Box<dyn Any + Send + Sync> {
        Box::new(v)
    }

    #[test]
    fn test_entity_id_display() {
        let id = EntityId::new(42);
        assert_eq!(id.raw(), 42);
        assert_eq!(id.to_string(), "e42");
        assert!(EntityId::new(1) < EntityId::new(2));
    }

    #[test]
    fn test_record_component_set() {
        let mut record = EntityRecord::new(EntityId::new(0));
        let a = ComponentKind::new(5);
        let b = ComponentKind::new(1);
        assert!(!record.has_component(a));

        assert!(record.set(a, boxed(1)));
        assert!(record.set(b, boxed(2)));
        assert!(record.has_component(a));
        assert_eq!(record.component_kinds().collect::<Vec<_>>(), vec![a, b]);

        assert!(record.remove(a));
        assert!(!record.remove(a));
        assert!(!record.has_component(a));
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut record = EntityRecord::new(EntityId::new(0));
        let a = ComponentKind::new(0);
        let b = ComponentKind::new(1);
        record.set(a, boxed(1));
        record.set(b, boxed(2));

        assert!(!record.set(a, boxed(10)));
        assert_eq!(record.component_kinds().collect::<Vec<_>>(), vec![a, b]);
        let value = record.cell_mut(a).and_then(|v| v.downcast_mut::<u32>()).copied();
        assert_eq!(value, Some(10));
    }
}
